//! Rigid-body contacts and their resolver.
//!
//! Contacts are produced by the detectors in [`crate::collide`] and consumed
//! in the same step by [`ContactResolver`]. Each contact is resolved with an
//! impulse along its normal (including the angular response of both
//! bodies), a Coulomb-clamped friction impulse in the contact plane and a
//! linear push out of interpenetration.

use crate::body::{BodyId, RigidBody};
use crate::math::{Matrix3, Real, Vector3};
use crate::resolver::{self, ContactBatch, Tolerance};
use log::trace;

// ComplexField provides sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// A contact between a rigid body and another body or the immovable world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub first: BodyId,
    /// `None` when the first body touches scenery (a plane).
    pub second: Option<BodyId>,
    /// World-space point of contact.
    pub contact_point: Vector3,
    /// Direction the first body is pushed in, in world space.
    pub normal: Vector3,
    /// Overlap depth, positive when interpenetrating.
    pub penetration: Real,
    pub restitution: Real,
    /// Coulomb friction coefficient; 0.0 disables friction.
    pub friction: Real,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            first: BodyId(0),
            second: None,
            contact_point: Vector3::zeros(),
            normal: Vector3::zeros(),
            penetration: 0.0,
            restitution: 0.0,
            friction: 0.0,
        }
    }
}

/// Per-contact quantities derived from the current body state, computed by
/// [`Contact::prepare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactFrame {
    /// Orthonormal basis with the contact normal as its first column and two
    /// tangents spanning the contact plane.
    pub contact_to_world: Matrix3,
    /// Contact point relative to each body's position. The second entry is
    /// zero for world contacts.
    pub relative_positions: [Vector3; 2],
    /// Separating velocity produced by last step's accelerations alone.
    pub acceleration_velocity: Real,
}

impl ContactFrame {
    #[inline]
    pub fn normal(&self) -> Vector3 {
        self.contact_to_world.column(0).into_owned()
    }

    /// The two unit tangents of the contact plane.
    #[inline]
    pub fn tangents(&self) -> [Vector3; 2] {
        [
            self.contact_to_world.column(1).into_owned(),
            self.contact_to_world.column(2).into_owned(),
        ]
    }
}

/// Orthonormal basis whose first column is `normal` (assumed unit length).
///
/// The first tangent is built perpendicular to the world axis the normal is
/// least aligned with, which keeps the cross product well conditioned.
pub fn contact_basis(normal: &Vector3) -> Matrix3 {
    let tangent = if normal.x.abs() > normal.y.abs() {
        let s = 1.0 / (normal.z * normal.z + normal.x * normal.x).sqrt();
        Vector3::new(normal.z * s, 0.0, -normal.x * s)
    } else {
        let s = 1.0 / (normal.z * normal.z + normal.y * normal.y).sqrt();
        Vector3::new(0.0, -normal.z * s, normal.y * s)
    };
    let bitangent = normal.cross(&tangent);
    Matrix3::from_columns(&[*normal, tangent, bitangent])
}

/// Inverse of the effective mass a body shows along `direction` when pushed
/// at `relative_position`: `1/m + ((I⁻¹ (r × d)) × r) · d`.
fn inverse_effective_mass(body: &RigidBody, relative_position: &Vector3, direction: &Vector3) -> Real {
    let torque_per_unit = relative_position.cross(direction);
    let rotation_per_unit = body.inverse_inertia_tensor_world() * torque_per_unit;
    let velocity_per_unit = rotation_per_unit.cross(relative_position);
    body.inverse_mass() + velocity_per_unit.dot(direction)
}

impl Contact {
    /// Velocity of the contact point on the first body relative to the
    /// second, in world space.
    pub fn relative_velocity(&self, bodies: &[RigidBody]) -> Vector3 {
        let first = &bodies[self.first.0];
        let mut velocity = first.velocity_at(&(self.contact_point - first.position()));
        if let Some(second) = self.second {
            let second = &bodies[second.0];
            velocity -= second.velocity_at(&(self.contact_point - second.position()));
        }
        velocity
    }

    /// Relative velocity along the normal. Negative means closing.
    pub fn separating_velocity(&self, bodies: &[RigidBody]) -> Real {
        self.relative_velocity(bodies).dot(&self.normal)
    }

    /// Compute the contact basis, the relative contact positions and the
    /// velocity caused by last step's accelerations.
    pub fn prepare(&self, bodies: &[RigidBody], duration: Real) -> ContactFrame {
        let first = &bodies[self.first.0];
        let mut relative_positions = [self.contact_point - first.position(), Vector3::zeros()];
        let mut acceleration = first.last_frame_acceleration();
        if let Some(second) = self.second {
            let second = &bodies[second.0];
            relative_positions[1] = self.contact_point - second.position();
            acceleration -= second.last_frame_acceleration();
        }

        ContactFrame {
            contact_to_world: contact_basis(&self.normal),
            relative_positions,
            acceleration_velocity: acceleration.dot(&self.normal) * duration,
        }
    }

    fn total_inverse_effective_mass(&self, frame: &ContactFrame, bodies: &[RigidBody], direction: &Vector3) -> Real {
        let mut total = inverse_effective_mass(&bodies[self.first.0], &frame.relative_positions[0], direction);
        if let Some(second) = self.second {
            total += inverse_effective_mass(&bodies[second.0], &frame.relative_positions[1], direction);
        }
        total
    }

    fn apply_impulse(&self, frame: &ContactFrame, bodies: &mut [RigidBody], impulse: &Vector3) {
        bodies[self.first.0].apply_impulse_at(impulse, &frame.relative_positions[0]);
        if let Some(second) = self.second {
            bodies[second.0].apply_impulse_at(&-impulse, &frame.relative_positions[1]);
        }
    }

    /// Resolve velocity, then interpenetration. Returns the linear moves
    /// applied to the bodies, see [`Contact::resolve_interpenetration`].
    pub fn resolve(&mut self, bodies: &mut [RigidBody], duration: Real) -> [Option<(BodyId, Vector3)>; 2] {
        let frame = self.prepare(bodies, duration);
        self.resolve_velocity(&frame, bodies);
        self.resolve_interpenetration(bodies)
    }

    /// Apply the normal impulse that turns the closing velocity into
    /// `-restitution * closing velocity`, then a friction impulse opposing
    /// the sliding velocity, at most `friction` times the normal impulse.
    pub fn resolve_velocity(&mut self, frame: &ContactFrame, bodies: &mut [RigidBody]) {
        let separating_velocity = self.separating_velocity(bodies);
        if separating_velocity > 0.0 {
            return;
        }

        let mut new_separating_velocity = -separating_velocity * self.restitution;
        if frame.acceleration_velocity < 0.0 {
            new_separating_velocity += self.restitution * frame.acceleration_velocity;
            if new_separating_velocity < 0.0 {
                new_separating_velocity = 0.0;
            }
        }
        let delta_velocity = new_separating_velocity - separating_velocity;

        let normal = frame.normal();
        let inverse_mass = self.total_inverse_effective_mass(frame, bodies, &normal);
        if inverse_mass <= 0.0 {
            return;
        }
        let normal_impulse = delta_velocity / inverse_mass;
        self.apply_impulse(frame, bodies, &(normal * normal_impulse));

        if self.friction <= 0.0 {
            return;
        }

        let relative_velocity = self.relative_velocity(bodies);
        let [t1, t2] = frame.tangents();
        let sliding = t1 * relative_velocity.dot(&t1) + t2 * relative_velocity.dot(&t2);
        let sliding_speed = sliding.norm();
        if sliding_speed <= 1e-6 {
            return;
        }

        let tangent = sliding / sliding_speed;
        let inverse_mass_t = self.total_inverse_effective_mass(frame, bodies, &tangent);
        if inverse_mass_t <= 0.0 {
            return;
        }
        // Coulomb cone: |jt| <= mu * |jn|
        let friction_impulse = (sliding_speed / inverse_mass_t).min(self.friction * normal_impulse);
        self.apply_impulse(frame, bodies, &(tangent * -friction_impulse));
    }

    /// Move the bodies apart along the normal by exactly the penetration,
    /// split by inverse mass, and zero the penetration.
    ///
    /// Returns the linear move applied to each body, so that other contacts
    /// involving the same bodies can be updated.
    pub fn resolve_interpenetration(&mut self, bodies: &mut [RigidBody]) -> [Option<(BodyId, Vector3)>; 2] {
        let mut moves = [None, None];
        if self.penetration <= 0.0 {
            return moves;
        }

        let mut total_inverse_mass = bodies[self.first.0].inverse_mass();
        if let Some(second) = self.second {
            total_inverse_mass += bodies[second.0].inverse_mass();
        }
        if total_inverse_mass <= 0.0 {
            return moves;
        }

        let move_per_inverse_mass = self.normal * (self.penetration / total_inverse_mass);

        let first = &mut bodies[self.first.0];
        let delta = move_per_inverse_mass * first.inverse_mass();
        first.translate(&delta);
        moves[0] = Some((self.first, delta));

        if let Some(second) = self.second {
            let body = &mut bodies[second.0];
            let delta = move_per_inverse_mass * -body.inverse_mass();
            body.translate(&delta);
            moves[1] = Some((second, delta));
        }

        self.penetration = 0.0;
        moves
    }
}

struct RigidBatch<'a> {
    contacts: &'a mut [Contact],
    bodies: &'a mut [RigidBody],
}

impl ContactBatch for RigidBatch<'_> {
    fn len(&self) -> usize {
        self.contacts.len()
    }

    fn separating_velocity(&self, index: usize) -> Real {
        self.contacts[index].separating_velocity(self.bodies)
    }

    fn penetration(&self, index: usize) -> Real {
        self.contacts[index].penetration
    }

    fn resolve(&mut self, index: usize, duration: Real) {
        let moves = self.contacts[index].resolve(self.bodies, duration);

        // Moving a body changes the depth of every other contact it is in.
        for (body, delta) in moves.into_iter().flatten() {
            for (other_index, other) in self.contacts.iter_mut().enumerate() {
                if other_index == index {
                    continue;
                }
                if other.first == body {
                    other.penetration -= delta.dot(&other.normal);
                }
                if other.second == Some(body) {
                    other.penetration += delta.dot(&other.normal);
                }
            }
        }
    }
}

/// Resolves a batch of rigid-body contacts worst-first.
///
/// Contacts closing slower than the velocity epsilon or penetrating less
/// than the position epsilon are considered resolved, which keeps resting
/// stacks from jittering.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactResolver {
    iterations: u32,
    tolerance: Tolerance,
    iterations_used: u32,
}

impl ContactResolver {
    pub const DEFAULT_VELOCITY_EPSILON: Real = 0.01;
    pub const DEFAULT_POSITION_EPSILON: Real = 0.01;

    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            tolerance: Tolerance {
                velocity: Self::DEFAULT_VELOCITY_EPSILON,
                position: Self::DEFAULT_POSITION_EPSILON,
            },
            iterations_used: 0,
        }
    }

    /// Builder: set the velocity and position epsilons.
    pub fn with_epsilons(mut self, velocity: Real, position: Real) -> Self {
        self.set_epsilons(velocity, position);
        self
    }

    pub fn set_epsilons(&mut self, velocity: Real, position: Real) {
        self.tolerance = Tolerance {
            velocity: velocity.max(0.0),
            position: position.max(0.0),
        };
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Iterations spent by the last [`ContactResolver::resolve_contacts`].
    pub fn iterations_used(&self) -> u32 {
        self.iterations_used
    }

    /// Resolve `contacts` in place, mutating the bodies they refer to.
    pub fn resolve_contacts(&mut self, contacts: &mut [Contact], bodies: &mut [RigidBody], duration: Real) {
        let mut batch = RigidBatch { contacts, bodies };
        self.iterations_used = resolver::resolve_worst_first(&mut batch, self.iterations, &self.tolerance, duration);
        trace!(
            "rigid resolver: {} contacts, {} iterations used",
            batch.len(),
            self.iterations_used
        );
    }
}
