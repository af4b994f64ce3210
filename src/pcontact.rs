//! Particle contacts and their resolver.
//!
//! A [`ParticleContact`] joins one or two particles; a missing second
//! particle stands for immovable scenery. Resolution applies an impulse along
//! the normal and removes interpenetration, both split by inverse mass.

use crate::math::{Real, Vector3};
use crate::particle::{Particle, ParticleId};
use crate::resolver::{self, ContactBatch, Tolerance};
use log::trace;

/// Two particles in contact (a collision, a taut cable, a rod).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleContact {
    pub first: ParticleId,
    /// `None` when the first particle touches the immovable world.
    pub second: Option<ParticleId>,
    /// Bounciness: 1.0 keeps all separating speed, 0.0 keeps none.
    pub restitution: Real,
    /// Direction the first particle is pushed in, in world space.
    pub normal: Vector3,
    /// Overlap depth, positive when interpenetrating.
    pub penetration: Real,
}

impl Default for ParticleContact {
    fn default() -> Self {
        Self {
            first: ParticleId(0),
            second: None,
            restitution: 0.0,
            normal: Vector3::zeros(),
            penetration: 0.0,
        }
    }
}

impl ParticleContact {
    /// Relative velocity of the first particle with respect to the second,
    /// projected onto the normal. Negative means closing.
    pub fn separating_velocity(&self, particles: &[Particle]) -> Real {
        let mut relative = particles[self.first.0].velocity;
        if let Some(second) = self.second {
            relative -= particles[second.0].velocity;
        }
        relative.dot(&self.normal)
    }

    fn total_inverse_mass(&self, particles: &[Particle]) -> Real {
        let mut total = particles[self.first.0].inverse_mass;
        if let Some(second) = self.second {
            total += particles[second.0].inverse_mass;
        }
        total
    }

    /// Resolve velocity, then interpenetration.
    pub fn resolve(&mut self, particles: &mut [Particle], duration: Real) {
        self.resolve_velocity(particles, duration);
        self.resolve_interpenetration(particles);
    }

    /// Apply the impulse that turns the closing velocity into
    /// `-restitution * closing velocity`. Velocity that only built up from
    /// this step's acceleration is not bounced back, so resting contacts do
    /// not gain energy.
    pub fn resolve_velocity(&mut self, particles: &mut [Particle], duration: Real) {
        let separating_velocity = self.separating_velocity(particles);
        if separating_velocity > 0.0 {
            return;
        }

        let mut new_separating_velocity = -separating_velocity * self.restitution;

        let mut acc_caused_velocity = particles[self.first.0].acceleration;
        if let Some(second) = self.second {
            acc_caused_velocity -= particles[second.0].acceleration;
        }
        let acc_caused_separating_velocity = acc_caused_velocity.dot(&self.normal) * duration;
        if acc_caused_separating_velocity < 0.0 {
            new_separating_velocity += self.restitution * acc_caused_separating_velocity;
            if new_separating_velocity < 0.0 {
                new_separating_velocity = 0.0;
            }
        }

        let delta_velocity = new_separating_velocity - separating_velocity;

        let total_inverse_mass = self.total_inverse_mass(particles);
        if total_inverse_mass <= 0.0 {
            return;
        }

        let impulse_per_inverse_mass = self.normal * (delta_velocity / total_inverse_mass);

        let first = &mut particles[self.first.0];
        first.velocity += impulse_per_inverse_mass * first.inverse_mass;
        if let Some(second) = self.second {
            let second = &mut particles[second.0];
            second.velocity -= impulse_per_inverse_mass * second.inverse_mass;
        }
    }

    /// Push the particles apart along the normal by exactly the
    /// penetration, split by inverse mass, then mark the penetration as
    /// consumed.
    pub fn resolve_interpenetration(&mut self, particles: &mut [Particle]) {
        if self.penetration <= 0.0 {
            return;
        }

        let total_inverse_mass = self.total_inverse_mass(particles);
        if total_inverse_mass <= 0.0 {
            return;
        }

        let move_per_inverse_mass = self.normal * (self.penetration / total_inverse_mass);

        let first = &mut particles[self.first.0];
        first.position += move_per_inverse_mass * first.inverse_mass;
        if let Some(second) = self.second {
            let second = &mut particles[second.0];
            second.position -= move_per_inverse_mass * second.inverse_mass;
        }

        self.penetration = 0.0;
    }
}

struct ParticleBatch<'a> {
    contacts: &'a mut [ParticleContact],
    particles: &'a mut [Particle],
}

impl ContactBatch for ParticleBatch<'_> {
    fn len(&self) -> usize {
        self.contacts.len()
    }

    fn separating_velocity(&self, index: usize) -> Real {
        self.contacts[index].separating_velocity(self.particles)
    }

    fn penetration(&self, index: usize) -> Real {
        self.contacts[index].penetration
    }

    fn resolve(&mut self, index: usize, duration: Real) {
        self.contacts[index].resolve(self.particles, duration);
    }
}

/// Resolves a batch of particle contacts worst-first. One instance can be
/// reused for the whole simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleContactResolver {
    iterations: u32,
    iterations_used: u32,
}

impl ParticleContactResolver {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            iterations_used: 0,
        }
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Iterations spent by the last [`ParticleContactResolver::resolve_contacts`].
    pub fn iterations_used(&self) -> u32 {
        self.iterations_used
    }

    /// Resolve `contacts` in place, mutating the particles they refer to.
    pub fn resolve_contacts(
        &mut self,
        contacts: &mut [ParticleContact],
        particles: &mut [Particle],
        duration: Real,
    ) {
        let mut batch = ParticleBatch {
            contacts,
            particles,
        };
        self.iterations_used =
            resolver::resolve_worst_first(&mut batch, self.iterations, &Tolerance::EXACT, duration);
        trace!(
            "particle resolver: {} contacts, {} iterations used",
            batch.len(),
            self.iterations_used
        );
    }
}
