//! Force generators and the registry that applies them.
//!
//! The set of generators is closed ([`ForceGenerator`]); what they act on is
//! open through [`ForceTarget`], implemented for both [`Particle`] and
//! [`RigidBody`]. Targets are addressed by their index in the slice passed to
//! [`ForceRegistry::update_forces`].

use crate::body::RigidBody;
use crate::math::{self, Real, Vector3};
use crate::particle::Particle;
use log::warn;

/// Anything a force generator can push on.
pub trait ForceTarget {
    fn position(&self) -> Vector3;
    fn velocity(&self) -> Vector3;
    fn inverse_mass(&self) -> Real;
    /// Accumulate a force at the center of mass for the next integration.
    fn add_force(&mut self, force: &Vector3);
}

impl ForceTarget for Particle {
    fn position(&self) -> Vector3 {
        self.position
    }

    fn velocity(&self) -> Vector3 {
        self.velocity
    }

    fn inverse_mass(&self) -> Real {
        self.inverse_mass
    }

    fn add_force(&mut self, force: &Vector3) {
        Particle::add_force(self, force);
    }
}

impl ForceTarget for RigidBody {
    fn position(&self) -> Vector3 {
        RigidBody::position(self)
    }

    fn velocity(&self) -> Vector3 {
        self.velocity
    }

    fn inverse_mass(&self) -> Real {
        RigidBody::inverse_mass(self)
    }

    fn add_force(&mut self, force: &Vector3) {
        RigidBody::add_force(self, force);
    }
}

/// A source of force, evaluated once per step before integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceGenerator {
    /// Constant acceleration scaled by the target's mass (`F = m * g`).
    Gravity { gravity: Vector3 },
    /// Drag opposing the velocity: `|F| = k1 * |v| + k2 * |v|²`.
    Drag { k1: Real, k2: Real },
    /// Hooke spring towards another target of the same slice.
    Spring {
        other: usize,
        spring_constant: Real,
        rest_length: Real,
    },
    /// Hooke spring towards a fixed point in space.
    AnchoredSpring {
        anchor: Vector3,
        spring_constant: Real,
        rest_length: Real,
    },
}

impl ForceGenerator {
    /// Compute and accumulate this generator's force on `target`.
    ///
    /// `other_position` is the position of the spring's other end for
    /// [`ForceGenerator::Spring`] and ignored otherwise.
    pub fn update_force<T: ForceTarget>(
        &self,
        target: &mut T,
        other_position: Option<Vector3>,
        _duration: Real,
    ) {
        let inverse_mass = target.inverse_mass();
        match *self {
            ForceGenerator::Gravity { gravity } => {
                if inverse_mass <= 0.0 {
                    return;
                }
                target.add_force(&(gravity / inverse_mass));
            }
            ForceGenerator::Drag { k1, k2 } => {
                if inverse_mass <= 0.0 {
                    return;
                }
                let velocity = target.velocity();
                let speed = velocity.norm();
                let drag = k1 * speed + k2 * speed * speed;
                target.add_force(&(math::normalized(velocity) * -drag));
            }
            ForceGenerator::Spring {
                spring_constant,
                rest_length,
                ..
            } => {
                if let Some(other) = other_position {
                    let force = spring_force(target.position(), other, spring_constant, rest_length);
                    target.add_force(&force);
                }
            }
            ForceGenerator::AnchoredSpring {
                anchor,
                spring_constant,
                rest_length,
            } => {
                let force = spring_force(target.position(), anchor, spring_constant, rest_length);
                target.add_force(&force);
            }
        }
    }
}

/// Hooke's law: pulls `position` towards `anchor` when stretched past
/// `rest_length`, pushes it away when compressed.
fn spring_force(position: Vector3, anchor: Vector3, spring_constant: Real, rest_length: Real) -> Vector3 {
    let offset = position - anchor;
    let length = offset.norm();
    let magnitude = (length - rest_length) * spring_constant;
    math::normalized(offset) * -magnitude
}

/// One generator bound to one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceRegistration {
    pub target: usize,
    pub generator: ForceGenerator,
}

/// Fixed-capacity list of (target, generator) pairs.
#[derive(Debug, Clone)]
pub struct ForceRegistry<const N: usize> {
    registrations: heapless::Vec<ForceRegistration, N>,
}

impl<const N: usize> Default for ForceRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ForceRegistry<N> {
    pub fn new() -> Self {
        Self {
            registrations: heapless::Vec::new(),
        }
    }

    /// Register `generator` to act on the target at index `target`.
    ///
    /// Returns `false` if the registry is full.
    pub fn add(&mut self, target: usize, generator: ForceGenerator) -> bool {
        if self
            .registrations
            .push(ForceRegistration { target, generator })
            .is_err()
        {
            warn!("ForceRegistry: capacity exceeded (max {}), registration dropped", N);
            return false;
        }
        true
    }

    /// Remove every registration matching the pair. Returns `true` if any
    /// was removed.
    pub fn remove(&mut self, target: usize, generator: &ForceGenerator) -> bool {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| !(r.target == target && r.generator == *generator));
        self.registrations.len() != before
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForceRegistration> {
        self.registrations.iter()
    }

    /// Let every registered generator add its force to its target.
    /// Registrations whose target (or spring partner) is out of bounds are
    /// skipped.
    pub fn update_forces<T: ForceTarget>(&self, targets: &mut [T], duration: Real) {
        for registration in &self.registrations {
            let other_position = match registration.generator {
                ForceGenerator::Spring { other, .. } => match targets.get(other) {
                    Some(t) => Some(t.position()),
                    None => continue,
                },
                _ => None,
            };
            if let Some(target) = targets.get_mut(registration.target) {
                registration
                    .generator
                    .update_force(target, other_position, duration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vector3, b: &Vector3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn test_gravity_scales_with_mass() {
        let mut p = Particle::new(3.0);
        ForceGenerator::Gravity {
            gravity: Vector3::new(0.0, -10.0, 0.0),
        }
        .update_force(&mut p, None, 0.01);
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::new(0.0, -30.0, 0.0)));
    }

    #[test]
    fn test_gravity_skips_immovable() {
        let mut p = Particle::new_immovable();
        ForceGenerator::Gravity {
            gravity: Vector3::new(0.0, -10.0, 0.0),
        }
        .update_force(&mut p, None, 0.01);
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::zeros()));
    }

    #[test]
    fn test_drag_opposes_velocity() {
        let mut p = Particle::new(1.0).with_velocity(Vector3::new(2.0, 0.0, 0.0));
        ForceGenerator::Drag { k1: 0.5, k2: 0.25 }.update_force(&mut p, None, 0.01);
        // 0.5 * 2 + 0.25 * 4 = 2
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::new(-2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_drag_at_rest_is_zero() {
        let mut p = Particle::new(1.0);
        ForceGenerator::Drag { k1: 1.0, k2: 1.0 }.update_force(&mut p, None, 0.01);
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::zeros()));
    }

    #[test]
    fn test_anchored_spring_pulls_back() {
        let mut p = Particle::new(1.0).with_position(Vector3::new(0.0, -3.0, 0.0));
        ForceGenerator::AnchoredSpring {
            anchor: Vector3::zeros(),
            spring_constant: 2.0,
            rest_length: 1.0,
        }
        .update_force(&mut p, None, 0.01);
        // Stretched by 2, k = 2: 4 N towards the anchor.
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::new(0.0, 4.0, 0.0)));
    }

    #[test]
    fn test_compressed_spring_pushes_away() {
        let mut p = Particle::new(1.0).with_position(Vector3::new(0.5, 0.0, 0.0));
        ForceGenerator::AnchoredSpring {
            anchor: Vector3::zeros(),
            spring_constant: 10.0,
            rest_length: 1.0,
        }
        .update_force(&mut p, None, 0.01);
        assert!(approx_vec_eq(&p.accumulated_force(), &Vector3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn test_registry_spring_between_particles() {
        let mut particles = [
            Particle::new(1.0),
            Particle::new(1.0).with_position(Vector3::new(3.0, 0.0, 0.0)),
        ];
        let mut registry = ForceRegistry::<4>::new();
        let spring = |other| ForceGenerator::Spring {
            other,
            spring_constant: 1.0,
            rest_length: 2.0,
        };
        assert!(registry.add(0, spring(1)));
        assert!(registry.add(1, spring(0)));

        registry.update_forces(&mut particles, 0.01);

        assert!(approx_vec_eq(&particles[0].accumulated_force(), &Vector3::new(1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&particles[1].accumulated_force(), &Vector3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_registry_capacity_and_removal() {
        let gravity = ForceGenerator::Gravity {
            gravity: Vector3::new(0.0, -9.81, 0.0),
        };
        let mut registry = ForceRegistry::<2>::new();
        assert!(registry.add(0, gravity));
        assert!(registry.add(1, gravity));
        assert!(!registry.add(2, gravity));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(0, &gravity));
        assert!(!registry.remove(0, &gravity));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_drives_rigid_bodies() {
        let mut bodies = [RigidBody::new(2.0), RigidBody::new_static()];
        let mut registry = ForceRegistry::<4>::new();
        let gravity = ForceGenerator::Gravity {
            gravity: Vector3::new(0.0, -10.0, 0.0),
        };
        registry.add(0, gravity);
        registry.add(1, gravity);
        registry.add(7, gravity);

        registry.update_forces(&mut bodies, 0.01);

        assert!(approx_vec_eq(&bodies[0].accumulated_force(), &Vector3::new(0.0, -20.0, 0.0)));
        assert!(approx_vec_eq(&bodies[1].accumulated_force(), &Vector3::zeros()));
    }
}
