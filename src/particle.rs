//! Point masses.
//!
//! A [`Particle`] has a position and velocity but no orientation. It is
//! advanced with semi-implicit Euler and damped by `damping^dt`, which keeps
//! the decay independent of the step size.

use crate::math::{Real, Vector3};

// ComplexField provides powf() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Index of a particle inside the slice handed to contacts, links and
/// resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId(pub usize);

/// A point mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector3,
    pub velocity: Vector3,
    /// Constant acceleration (typically gravity) applied every step on top of
    /// the accumulated forces.
    pub acceleration: Vector3,
    /// Fraction of velocity kept per second (0.0 = stops at once, 1.0 = no
    /// damping). Applied as `velocity *= damping^dt`.
    pub damping: Real,
    /// Inverse mass. `0.0` means infinite mass: the particle never moves.
    pub inverse_mass: Real,
    force_accumulator: Vector3,
}

impl Default for Particle {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Particle {
    /// Create a particle with the given mass at the origin.
    ///
    /// # Panics
    /// Panics if `mass` is not positive and finite; use
    /// [`Particle::new_immovable`] for an immovable particle.
    pub fn new(mass: Real) -> Self {
        assert!(mass > 0.0 && mass.is_finite(), "mass must be positive and finite");
        Self::from_inverse_mass(1.0 / mass)
    }

    /// Create a particle with infinite mass.
    pub fn new_immovable() -> Self {
        Self::from_inverse_mass(0.0)
    }

    fn from_inverse_mass(inverse_mass: Real) -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            damping: 0.995,
            inverse_mass,
            force_accumulator: Vector3::zeros(),
        }
    }

    /// Builder: set initial position.
    pub fn with_position(mut self, position: Vector3) -> Self {
        self.position = position;
        self
    }

    /// Builder: set initial velocity.
    pub fn with_velocity(mut self, velocity: Vector3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder: set constant acceleration.
    pub fn with_acceleration(mut self, acceleration: Vector3) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Builder: set damping (0.0..=1.0).
    pub fn with_damping(mut self, damping: Real) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Set the mass. Any non-positive mass is treated as infinite.
    pub fn set_mass(&mut self, mass: Real) {
        self.inverse_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
    }

    /// Returns the mass, [`Real::MAX`] for immovable particles.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            Real::MAX
        } else {
            1.0 / self.inverse_mass
        }
    }

    #[inline]
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Accumulate a force for the next [`Particle::integrate`] call.
    #[inline]
    pub fn add_force(&mut self, force: &Vector3) {
        self.force_accumulator += force;
    }

    /// Forces accumulated since the last integration.
    #[inline]
    pub fn accumulated_force(&self) -> Vector3 {
        self.force_accumulator
    }

    #[inline]
    pub fn clear_accumulator(&mut self) {
        self.force_accumulator = Vector3::zeros();
    }

    /// Kinetic energy `0.5 * m * v²`; zero for immovable particles.
    pub fn kinetic_energy(&self) -> Real {
        if self.inverse_mass > 0.0 {
            0.5 * self.velocity.norm_squared() / self.inverse_mass
        } else {
            0.0
        }
    }

    /// Advance the particle by `duration` seconds.
    ///
    /// Position moves with the velocity from before this step; the velocity
    /// is then updated from the constant acceleration plus accumulated
    /// forces and damped. Immovable particles only drop their accumulated
    /// forces; non-positive durations are left untouched.
    pub fn integrate(&mut self, duration: Real) {
        if duration <= 0.0 {
            return;
        }
        if self.inverse_mass <= 0.0 {
            self.clear_accumulator();
            return;
        }

        self.position += self.velocity * duration;

        let acceleration = self.acceleration + self.force_accumulator * self.inverse_mass;
        self.velocity += acceleration * duration;
        self.velocity *= self.damping.powf(duration);

        self.clear_accumulator();
    }
}
