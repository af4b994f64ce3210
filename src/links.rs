//! Length constraints between particles, expressed as contact generators.
//!
//! A link checks its constraint every step and, when it is violated, writes
//! a single [`ParticleContact`] that the particle resolver then corrects
//! like any collision.

use crate::math::{self, Real, Vector3};
use crate::particle::{Particle, ParticleId};
use crate::pcontact::ParticleContact;

/// Something that inspects the particles and writes contacts.
pub trait ParticleContactGenerator {
    /// Write up to `slots.len()` contacts into `slots` and return how many
    /// were written.
    fn add_contact(&self, particles: &[Particle], slots: &mut [ParticleContact]) -> usize;
}

/// Distance between two particles.
pub fn current_length(particles: &[Particle], ends: &[ParticleId; 2]) -> Real {
    (particles[ends[0].0].position - particles[ends[1].0].position).norm()
}

/// Unit vector from the first end towards the second.
fn direction(particles: &[Particle], ends: &[ParticleId; 2]) -> Vector3 {
    math::normalized(particles[ends[1].0].position - particles[ends[0].0].position)
}

/// A cable: the particles may come closer but never drift further apart
/// than `max_length`. A taut cable can bounce back with `restitution`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleCable {
    pub particles: [ParticleId; 2],
    pub max_length: Real,
    pub restitution: Real,
}

impl ParticleCable {
    pub fn new(first: ParticleId, second: ParticleId, max_length: Real) -> Self {
        Self {
            particles: [first, second],
            max_length,
            restitution: 0.0,
        }
    }

    /// Builder: bounciness of the cable when it snaps taut (0.0..=1.0).
    pub fn with_restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }
}

impl ParticleContactGenerator for ParticleCable {
    fn add_contact(&self, particles: &[Particle], slots: &mut [ParticleContact]) -> usize {
        let Some(slot) = slots.first_mut() else {
            return 0;
        };
        let length = current_length(particles, &self.particles);
        if length < self.max_length {
            return 0;
        }

        *slot = ParticleContact {
            first: self.particles[0],
            second: Some(self.particles[1]),
            restitution: self.restitution,
            normal: direction(particles, &self.particles),
            penetration: length - self.max_length,
        };
        1
    }
}

/// A rod: the particles stay exactly `length` apart. Rods never bounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleRod {
    pub particles: [ParticleId; 2],
    pub length: Real,
}

impl ParticleRod {
    pub fn new(first: ParticleId, second: ParticleId, length: Real) -> Self {
        Self {
            particles: [first, second],
            length,
        }
    }
}

impl ParticleContactGenerator for ParticleRod {
    fn add_contact(&self, particles: &[Particle], slots: &mut [ParticleContact]) -> usize {
        let Some(slot) = slots.first_mut() else {
            return 0;
        };
        let current = current_length(particles, &self.particles);
        if current == self.length {
            return 0;
        }

        let towards_second = direction(particles, &self.particles);
        // Too long: pull together. Too short: push apart.
        let (normal, penetration) = if current > self.length {
            (towards_second, current - self.length)
        } else {
            (-towards_second, self.length - current)
        };

        *slot = ParticleContact {
            first: self.particles[0],
            second: Some(self.particles[1]),
            restitution: 0.0,
            normal,
            penetration,
        };
        1
    }
}

/// The link kinds a particle world can hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleLink {
    Cable(ParticleCable),
    Rod(ParticleRod),
}

impl ParticleLink {
    pub fn particles(&self) -> [ParticleId; 2] {
        match self {
            ParticleLink::Cable(cable) => cable.particles,
            ParticleLink::Rod(rod) => rod.particles,
        }
    }

    pub fn current_length(&self, particles: &[Particle]) -> Real {
        current_length(particles, &self.particles())
    }
}

impl From<ParticleCable> for ParticleLink {
    fn from(cable: ParticleCable) -> Self {
        ParticleLink::Cable(cable)
    }
}

impl From<ParticleRod> for ParticleLink {
    fn from(rod: ParticleRod) -> Self {
        ParticleLink::Rod(rod)
    }
}

impl ParticleContactGenerator for ParticleLink {
    fn add_contact(&self, particles: &[Particle], slots: &mut [ParticleContact]) -> usize {
        match self {
            ParticleLink::Cable(cable) => cable.add_contact(particles, slots),
            ParticleLink::Rod(rod) => rod.add_contact(particles, slots),
        }
    }
}

/// Keeps every movable particle above the horizontal plane `y = height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContacts {
    pub height: Real,
    pub restitution: Real,
}

impl Default for GroundContacts {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl GroundContacts {
    pub fn new(height: Real) -> Self {
        Self {
            height,
            restitution: 0.2,
        }
    }

    /// Builder: bounciness of the ground (0.0..=1.0).
    pub fn with_restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }
}

impl ParticleContactGenerator for GroundContacts {
    fn add_contact(&self, particles: &[Particle], slots: &mut [ParticleContact]) -> usize {
        let mut written = 0;
        for (index, particle) in particles.iter().enumerate() {
            if written == slots.len() {
                break;
            }
            if !particle.has_finite_mass() || particle.position.y >= self.height {
                continue;
            }
            slots[written] = ParticleContact {
                first: ParticleId(index),
                second: None,
                restitution: self.restitution,
                normal: Vector3::new(0.0, 1.0, 0.0),
                penetration: self.height - particle.position.y,
            };
            written += 1;
        }
        written
    }
}
