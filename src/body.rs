//! Rigid bodies.
//!
//! A [`RigidBody`] tracks linear and angular state. Orientation is a unit
//! quaternion; the cached [`Transform`] and the world-space inverse inertia
//! tensor are derived from it and from the position, and are rebuilt by
//! [`RigidBody::calculate_derived_data`] whenever either changes.

use crate::math::{self, Matrix3, Quaternion, QuaternionExt, Real, Transform, Vector3};

// ComplexField provides powf() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Index of a rigid body inside the slice handed to collision primitives,
/// contacts and the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub usize);

/// A rigid body with linear and angular dynamics.
///
/// Bodies always store the *inverse* inertia tensor, in body space, plus a
/// world-space copy that follows the orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    // -- Linear state --
    inverse_mass: Real,
    position: Vector3,
    pub velocity: Vector3,

    /// Constant acceleration (typically gravity) applied every step.
    pub acceleration: Vector3,

    /// Fraction of linear velocity kept per second, applied as
    /// `velocity *= linear_damping^dt`.
    pub linear_damping: Real,

    /// Accumulated forces applied this frame. Cleared after each `integrate()`.
    force_accumulator: Vector3,

    // -- Angular state --
    orientation: Quaternion,

    /// Angular velocity in world space (radians per second).
    pub angular_velocity: Vector3,

    /// Fraction of angular velocity kept per second.
    pub angular_damping: Real,

    /// Inverse inertia tensor in body space. Zero for immovable bodies.
    inverse_inertia_tensor: Matrix3,

    /// Accumulated torques applied this frame. Cleared after each `integrate()`.
    torque_accumulator: Vector3,

    // -- Derived data --
    inverse_inertia_tensor_world: Matrix3,
    transform: Transform,
    /// Total linear acceleration of the last integration step.
    last_frame_acceleration: Vector3,
}

impl RigidBody {
    /// Create a new dynamic rigid body with the given mass (in kg).
    ///
    /// The body starts with a unit-sphere inertia tensor
    /// (`I = 2/5 * m * 1²`). Use [`RigidBody::with_inertia_sphere`] or
    /// [`RigidBody::with_inertia_box`] for the actual shape.
    ///
    /// # Panics
    /// Panics if `mass` is not positive and finite.
    pub fn new(mass: Real) -> Self {
        assert!(mass > 0.0 && mass.is_finite(), "mass must be positive and finite");
        let mut inverse_inertia = math::sphere_inertia_tensor(1.0, mass);
        math::invert(&mut inverse_inertia);
        let mut body = Self {
            inverse_mass: 1.0 / mass,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            linear_damping: 0.99,
            force_accumulator: Vector3::zeros(),
            orientation: Quaternion::identity(),
            angular_velocity: Vector3::zeros(),
            angular_damping: 0.8,
            inverse_inertia_tensor: inverse_inertia,
            torque_accumulator: Vector3::zeros(),
            inverse_inertia_tensor_world: Matrix3::zeros(),
            transform: Transform::identity(),
            last_frame_acceleration: Vector3::zeros(),
        };
        body.calculate_derived_data();
        body
    }

    /// Create an immovable body (infinite mass and inertia).
    pub fn new_static() -> Self {
        let mut body = Self {
            inverse_mass: 0.0,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            linear_damping: 1.0,
            force_accumulator: Vector3::zeros(),
            orientation: Quaternion::identity(),
            angular_velocity: Vector3::zeros(),
            angular_damping: 1.0,
            inverse_inertia_tensor: Matrix3::zeros(),
            torque_accumulator: Vector3::zeros(),
            inverse_inertia_tensor_world: Matrix3::zeros(),
            transform: Transform::identity(),
            last_frame_acceleration: Vector3::zeros(),
        };
        body.calculate_derived_data();
        body
    }

    /// Builder: set initial position.
    pub fn with_position(mut self, position: Vector3) -> Self {
        self.set_position(position);
        self
    }

    /// Builder: set initial orientation (normalized on assignment).
    pub fn with_orientation(mut self, orientation: Quaternion) -> Self {
        self.set_orientation(orientation);
        self
    }

    /// Builder: set initial velocity.
    pub fn with_velocity(mut self, velocity: Vector3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder: set initial angular velocity (in radians per second).
    pub fn with_angular_velocity(mut self, angular_velocity: Vector3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Builder: set constant acceleration.
    pub fn with_acceleration(mut self, acceleration: Vector3) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Builder: set linear and angular damping (0.0..=1.0 each).
    pub fn with_damping(mut self, linear_damping: Real, angular_damping: Real) -> Self {
        self.set_damping(linear_damping, angular_damping);
        self
    }

    /// Builder: set the inertia tensor for a solid sphere of given radius.
    pub fn with_inertia_sphere(mut self, radius: Real) -> Self {
        if self.has_finite_mass() {
            self.set_inertia_tensor(&math::sphere_inertia_tensor(radius, self.mass()));
        }
        self
    }

    /// Builder: set the inertia tensor for a solid box with given half-extents.
    pub fn with_inertia_box(mut self, half_extents: Vector3) -> Self {
        if self.has_finite_mass() {
            self.set_inertia_tensor(&math::cuboid_inertia_tensor(&half_extents, self.mass()));
        }
        self
    }

    /// Builder: set an arbitrary (non-inverted) inertia tensor.
    pub fn with_inertia_tensor(mut self, inertia_tensor: Matrix3) -> Self {
        self.set_inertia_tensor(&inertia_tensor);
        self
    }

    // -- Mass properties --

    /// Set the mass.
    ///
    /// # Panics
    /// Panics if `mass` is not positive; use [`RigidBody::set_inverse_mass`]
    /// with `0.0` for an immovable body.
    pub fn set_mass(&mut self, mass: Real) {
        assert!(mass > 0.0, "mass must be positive");
        self.inverse_mass = 1.0 / mass;
    }

    /// Returns the mass, [`Real::MAX`] for immovable bodies.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            Real::MAX
        } else {
            1.0 / self.inverse_mass
        }
    }

    pub fn set_inverse_mass(&mut self, inverse_mass: Real) {
        self.inverse_mass = inverse_mass;
    }

    #[inline]
    pub fn inverse_mass(&self) -> Real {
        self.inverse_mass
    }

    #[inline]
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Set the body-space inertia tensor. The tensor is inverted before it is
    /// stored; a singular tensor leaves the previous inverse in place.
    pub fn set_inertia_tensor(&mut self, inertia_tensor: &Matrix3) {
        let mut inverse = *inertia_tensor;
        if math::invert(&mut inverse) {
            self.inverse_inertia_tensor = inverse;
            self.calculate_derived_data();
        }
    }

    /// Set the body-space inverse inertia tensor directly.
    pub fn set_inverse_inertia_tensor(&mut self, inverse_inertia_tensor: Matrix3) {
        self.inverse_inertia_tensor = inverse_inertia_tensor;
        self.calculate_derived_data();
    }

    /// Inverse inertia tensor in body space.
    #[inline]
    pub fn inverse_inertia_tensor(&self) -> &Matrix3 {
        &self.inverse_inertia_tensor
    }

    /// Inverse inertia tensor in world space: `R * I⁻¹ * Rᵀ`.
    #[inline]
    pub fn inverse_inertia_tensor_world(&self) -> &Matrix3 {
        &self.inverse_inertia_tensor_world
    }

    /// Inertia tensor in body space, `None` when the stored inverse is
    /// singular (immovable bodies).
    pub fn inertia_tensor(&self) -> Option<Matrix3> {
        let mut tensor = self.inverse_inertia_tensor;
        math::invert(&mut tensor).then_some(tensor)
    }

    /// Inertia tensor in world space, `None` when the stored inverse is
    /// singular.
    pub fn inertia_tensor_world(&self) -> Option<Matrix3> {
        let mut tensor = self.inverse_inertia_tensor_world;
        math::invert(&mut tensor).then_some(tensor)
    }

    pub fn set_damping(&mut self, linear_damping: Real, angular_damping: Real) {
        self.linear_damping = linear_damping.clamp(0.0, 1.0);
        self.angular_damping = angular_damping.clamp(0.0, 1.0);
    }

    // -- Pose --

    #[inline]
    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
        self.calculate_derived_data();
    }

    /// Move the body by `delta` and refresh the derived data.
    pub fn translate(&mut self, delta: &Vector3) {
        self.position += delta;
        self.calculate_derived_data();
    }

    #[inline]
    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }

    /// Set the orientation. It is normalized on assignment.
    pub fn set_orientation(&mut self, orientation: Quaternion) {
        self.orientation = orientation;
        self.calculate_derived_data();
    }

    /// Body-to-world transform.
    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The rotation block of the transform.
    #[inline]
    pub fn orientation_matrix(&self) -> Matrix3 {
        self.transform.rotation()
    }

    /// Total linear acceleration applied during the last integration step.
    #[inline]
    pub fn last_frame_acceleration(&self) -> Vector3 {
        self.last_frame_acceleration
    }

    pub fn add_velocity(&mut self, delta_velocity: &Vector3) {
        self.velocity += delta_velocity;
    }

    pub fn add_rotation(&mut self, delta_rotation: &Vector3) {
        self.angular_velocity += delta_rotation;
    }

    /// Returns the current speed (magnitude of velocity).
    #[inline]
    pub fn speed(&self) -> Real {
        self.velocity.norm()
    }

    /// Linear kinetic energy `0.5 * m * v²`; zero for immovable bodies.
    pub fn kinetic_energy(&self) -> Real {
        if self.has_finite_mass() {
            0.5 * self.velocity.norm_squared() / self.inverse_mass
        } else {
            0.0
        }
    }

    // -- Space conversion --

    pub fn point_in_world_space(&self, point: &Vector3) -> Vector3 {
        self.transform.transform(point)
    }

    pub fn point_in_local_space(&self, point: &Vector3) -> Vector3 {
        self.transform.transform_inverse(point)
    }

    pub fn direction_in_world_space(&self, direction: &Vector3) -> Vector3 {
        self.transform.transform_direction(direction)
    }

    pub fn direction_in_local_space(&self, direction: &Vector3) -> Vector3 {
        self.transform.transform_inverse_direction(direction)
    }

    // -- Forces --

    /// Apply a force at the center of mass. Forces accumulate until the
    /// next `integrate()`.
    #[inline]
    pub fn add_force(&mut self, force: &Vector3) {
        self.force_accumulator += force;
    }

    /// Apply a force at a world-space point; the lever arm produces torque.
    pub fn add_force_at_point(&mut self, force: &Vector3, point: &Vector3) {
        let arm = point - self.position;
        self.force_accumulator += force;
        self.torque_accumulator += arm.cross(force);
    }

    /// Apply a force at a point given in body space.
    pub fn add_force_at_body_point(&mut self, force: &Vector3, point: &Vector3) {
        let world_point = self.point_in_world_space(point);
        self.add_force_at_point(force, &world_point);
    }

    /// Apply a torque (in N·m). Torques accumulate until the next `integrate()`.
    #[inline]
    pub fn add_torque(&mut self, torque: &Vector3) {
        self.torque_accumulator += torque;
    }

    #[inline]
    pub fn accumulated_force(&self) -> Vector3 {
        self.force_accumulator
    }

    #[inline]
    pub fn accumulated_torque(&self) -> Vector3 {
        self.torque_accumulator
    }

    pub fn clear_accumulators(&mut self) {
        self.force_accumulator = Vector3::zeros();
        self.torque_accumulator = Vector3::zeros();
    }

    /// Apply an instantaneous impulse at `relative_point`, the contact point
    /// minus the body's position. Changes both linear and angular velocity:
    /// `Δv = J / m`, `Δω = I⁻¹ (r × J)`.
    pub fn apply_impulse_at(&mut self, impulse: &Vector3, relative_point: &Vector3) {
        if !self.has_finite_mass() {
            return;
        }
        self.velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia_tensor_world * relative_point.cross(impulse);
    }

    /// Velocity of a point attached to the body, given relative to its
    /// position: `v + ω × r`.
    #[inline]
    pub fn velocity_at(&self, relative_point: &Vector3) -> Vector3 {
        self.velocity + self.angular_velocity.cross(relative_point)
    }

    // -- Integration --

    /// Rebuild the derived data from position and orientation: normalizes
    /// the orientation, rebuilds the transform and the world-space inverse
    /// inertia tensor.
    pub fn calculate_derived_data(&mut self) {
        self.orientation.normalize_or_identity();
        self.transform
            .set_orientation_and_pos(&self.orientation, &self.position);

        let rotation = self.transform.rotation();
        self.inverse_inertia_tensor_world =
            rotation * self.inverse_inertia_tensor * rotation.transpose();
    }

    /// Integrate this body forward by `duration` seconds.
    ///
    /// Velocity is updated before position (semi-implicit Euler). Immovable
    /// bodies only drop their accumulated forces; non-positive durations are
    /// left untouched.
    pub fn integrate(&mut self, duration: Real) {
        if duration <= 0.0 {
            return;
        }
        if self.inverse_mass <= 0.0 {
            self.clear_accumulators();
            return;
        }

        // --- Linear ---
        self.last_frame_acceleration =
            self.acceleration + self.force_accumulator * self.inverse_mass;
        self.velocity += self.last_frame_acceleration * duration;
        self.velocity *= self.linear_damping.powf(duration);
        self.position += self.velocity * duration;

        // --- Angular ---
        let angular_acceleration = self.inverse_inertia_tensor_world * self.torque_accumulator;
        self.angular_velocity += angular_acceleration * duration;
        self.angular_velocity *= self.angular_damping.powf(duration);
        self.orientation
            .add_scaled_vector(&self.angular_velocity, duration);

        self.calculate_derived_data();
        self.clear_accumulators();
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
    fn test_body_creation() {
        let body = RigidBody::new(5.0);
        assert!(approx_eq(body.inverse_mass(), 0.2));
        assert!(approx_eq(body.mass(), 5.0));
        assert!(body.has_finite_mass());
        assert!(approx_vec_eq(&body.position(), &Vector3::zeros()));
        assert_eq!(body.orientation(), Quaternion::identity());
    }

    #[test]
    fn test_static_body() {
        let body = RigidBody::new_static();
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.mass(), Real::MAX);
        assert!(!body.has_finite_mass());
    }

    #[test]
    #[should_panic]
    fn test_body_zero_mass_panics() {
        RigidBody::new(0.0);
    }

    #[test]
    #[should_panic]
    fn test_body_negative_mass_panics() {
        RigidBody::new(-1.0);
    }

    #[test]
    fn test_static_body_ignores_forces() {
        let mut body = RigidBody::new_static().with_position(Vector3::new(0.0, 1.0, 0.0));
        for _ in 0..10 {
            body.add_force(&Vector3::new(0.0, 100.0, 0.0));
            body.add_torque(&Vector3::new(5.0, 0.0, 0.0));
            body.integrate(0.1);
        }
        assert!(approx_vec_eq(&body.position(), &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_vec_eq(&body.velocity, &Vector3::zeros()));
        assert_eq!(body.orientation(), Quaternion::identity());
        assert!(approx_vec_eq(&body.accumulated_force(), &Vector3::zeros()));
        assert!(approx_vec_eq(&body.accumulated_torque(), &Vector3::zeros()));
    }

    #[test]
    fn test_inertia_tensor_accessors() {
        let body = RigidBody::new(2.0)
            .with_inertia_box(Vector3::new(1.0, 2.0, 3.0))
            .with_orientation(*nalgebra::UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.7).quaternion());
        let expected = math::cuboid_inertia_tensor(&Vector3::new(1.0, 2.0, 3.0), 2.0);
        let inertia = body.inertia_tensor().unwrap();
        for (a, b) in inertia.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-3);
        }

        // World tensor times its inverse is the identity.
        let product = body.inertia_tensor_world().unwrap() * body.inverse_inertia_tensor_world();
        for (a, b) in product.iter().zip(Matrix3::identity().iter()) {
            assert!(approx_eq(*a, *b));
        }

        assert!(RigidBody::new_static().inertia_tensor().is_none());
    }

    #[test]
    fn test_gravity_freefall() {
        let mut body = RigidBody::new(1.0)
            .with_position(Vector3::new(0.0, 100.0, 0.0))
            .with_acceleration(Vector3::new(0.0, -10.0, 0.0))
            .with_damping(1.0, 1.0);

        body.integrate(1.0);

        // Semi-implicit: velocity updated first, then position.
        assert!(approx_eq(body.velocity.y, -10.0));
        assert!(approx_eq(body.position().y, 90.0));
        assert!(approx_vec_eq(
            &body.last_frame_acceleration(),
            &Vector3::new(0.0, -10.0, 0.0)
        ));
    }

    #[test]
    fn test_force_accumulation_and_clearing() {
        let mut body = RigidBody::new(2.0).with_damping(1.0, 1.0);
        body.add_force(&Vector3::new(10.0, 0.0, 0.0));
        body.add_force(&Vector3::new(0.0, 4.0, 0.0));
        assert!(approx_vec_eq(&body.accumulated_force(), &Vector3::new(10.0, 4.0, 0.0)));

        body.integrate(1.0);
        assert!(approx_vec_eq(&body.velocity, &Vector3::new(5.0, 2.0, 0.0)));
        assert!(approx_vec_eq(&body.accumulated_force(), &Vector3::zeros()));

        body.integrate(1.0);
        assert!(approx_vec_eq(&body.velocity, &Vector3::new(5.0, 2.0, 0.0)));
    }

    #[test]
    fn test_force_at_point_generates_torque() {
        let mut body = RigidBody::new(1.0).with_position(Vector3::new(1.0, 0.0, 0.0));
        body.add_force_at_point(&Vector3::new(0.0, 0.0, 10.0), &Vector3::new(1.0, 1.0, 0.0));
        assert!(approx_vec_eq(&body.accumulated_force(), &Vector3::new(0.0, 0.0, 10.0)));
        // (0,1,0) x (0,0,10) = (10,0,0)
        assert!(approx_vec_eq(&body.accumulated_torque(), &Vector3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_force_at_body_point_uses_transform() {
        let quarter_turn = *nalgebra::UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            core::f32::consts::FRAC_PI_2,
        )
        .quaternion();
        let mut body = RigidBody::new(1.0).with_orientation(quarter_turn);
        // Local +X is world +Y after the rotation.
        body.add_force_at_body_point(&Vector3::new(0.0, 0.0, 1.0), &Vector3::new(1.0, 0.0, 0.0));
        assert!(approx_vec_eq(&body.accumulated_torque(), &Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_orientation_stays_normalized() {
        let mut body = RigidBody::new(2.0)
            .with_inertia_box(Vector3::new(0.5, 0.25, 1.0))
            .with_angular_velocity(Vector3::new(3.0, -7.0, 11.0));
        for i in 0..1000 {
            body.add_torque(&Vector3::new(0.1 * i as f32, 0.0, -0.2));
            body.integrate(0.01);
            assert!(approx_eq(body.orientation().norm_squared(), 1.0));
        }
    }

    #[test]
    fn test_set_orientation_normalizes() {
        let body = RigidBody::new(1.0).with_orientation(Quaternion::new(2.0, 0.0, 0.0, 0.0));
        assert!(approx_eq(body.orientation().norm_squared(), 1.0));
    }

    #[test]
    fn test_world_inertia_follows_orientation() {
        let quarter_turn = *nalgebra::UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            core::f32::consts::FRAC_PI_2,
        )
        .quaternion();
        let body = RigidBody::new(1.0)
            .with_inverse_inertia_diagonal(Vector3::new(1.0, 2.0, 3.0))
            .with_orientation(quarter_turn);
        let world = body.inverse_inertia_tensor_world();
        // X and Y swap under a quarter turn about Z.
        assert!(approx_eq(world[(0, 0)], 2.0));
        assert!(approx_eq(world[(1, 1)], 1.0));
        assert!(approx_eq(world[(2, 2)], 3.0));
    }

    #[test]
    fn test_point_round_trip() {
        let orientation = *nalgebra::UnitQuaternion::from_euler_angles(0.7, -0.3, 1.9).quaternion();
        let body = RigidBody::new(3.0)
            .with_position(Vector3::new(4.0, -2.0, 9.0))
            .with_orientation(orientation);
        let p = Vector3::new(-1.5, 2.25, 0.75);
        assert!(approx_vec_eq(&body.point_in_world_space(&body.point_in_local_space(&p)), &p));
        assert!(approx_vec_eq(
            &body.direction_in_world_space(&body.direction_in_local_space(&p)),
            &p
        ));
    }

    #[test]
    fn test_apply_impulse_at_center() {
        let mut body = RigidBody::new(2.0);
        body.apply_impulse_at(&Vector3::new(10.0, 0.0, 0.0), &Vector3::zeros());
        assert!(approx_vec_eq(&body.velocity, &Vector3::new(5.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&body.angular_velocity, &Vector3::zeros()));
    }

    #[test]
    fn test_impulse_on_static_body_ignored() {
        let mut body = RigidBody::new_static();
        body.apply_impulse_at(&Vector3::new(100.0, 0.0, 0.0), &Vector3::new(0.0, 1.0, 0.0));
        assert!(approx_vec_eq(&body.velocity, &Vector3::zeros()));
        assert!(approx_vec_eq(&body.angular_velocity, &Vector3::zeros()));
    }

    #[test]
    fn test_singular_inertia_tensor_is_ignored() {
        let mut body = RigidBody::new(1.0);
        let before = *body.inverse_inertia_tensor();
        body.set_inertia_tensor(&Matrix3::zeros());
        assert_eq!(*body.inverse_inertia_tensor(), before);
    }

    #[test]
    fn test_kinetic_energy() {
        let body = RigidBody::new(2.0).with_velocity(Vector3::new(3.0, 0.0, 0.0));
        assert!(approx_eq(body.kinetic_energy(), 9.0));
        assert!(approx_eq(body.speed(), 3.0));
    }

    impl RigidBody {
        fn with_inverse_inertia_diagonal(mut self, diagonal: Vector3) -> Self {
            self.set_inverse_inertia_tensor(Matrix3::from_diagonal(&diagonal));
            self
        }
    }
}
