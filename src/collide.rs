//! Narrow-phase collision detection.
//!
//! Shapes are [`CollisionPrimitive`]s attached to rigid bodies through a
//! fixed offset, plus world-static [`CollisionPlane`]s. Every test works on
//! the primitive's cached world transform, so call
//! [`CollisionPrimitive::calculate_internals`] once per step after
//! integration.
//!
//! Detectors write at most one contact into a [`CollisionData`] sink and
//! return how many they wrote. The contact normal always points the way the
//! *first* participant has to move to separate; a plane or a point is
//! never a participant. The [`intersection`] module has boolean versions of
//! the same tests for early-outs.
//!
//! # Supported pairs
//! - sphere vs half-space, sphere vs two-sided plane
//! - sphere vs sphere
//! - box vs half-space
//! - box vs box (separating-axis test over 15 axes)
//! - box vs sphere, box vs point

use crate::body::{BodyId, RigidBody};
use crate::contact::Contact;
use crate::math::{REAL_MAX, Real, Transform, Vector3};
use log::debug;

// ComplexField provides sqrt() and abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Geometry of a collision primitive, in the primitive's own frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: Real },
    /// Oriented box given by its half-extents along the local axes.
    Box { half_size: Vector3 },
}

/// A shape attached to a rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPrimitive {
    pub body: BodyId,
    /// Placement of the shape relative to the body.
    pub offset: Transform,
    pub shape: Shape,
    transform: Transform,
}

impl CollisionPrimitive {
    pub fn new(body: BodyId, shape: Shape) -> Self {
        Self {
            body,
            offset: Transform::identity(),
            shape,
            transform: Transform::identity(),
        }
    }

    pub fn sphere(body: BodyId, radius: Real) -> Self {
        Self::new(body, Shape::Sphere { radius })
    }

    pub fn cuboid(body: BodyId, half_size: Vector3) -> Self {
        Self::new(body, Shape::Box { half_size })
    }

    /// Builder: place the shape relative to its body.
    pub fn with_offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    /// Recompute the world transform from the owning body. Does nothing if
    /// the body index is out of bounds.
    pub fn calculate_internals(&mut self, bodies: &[RigidBody]) {
        if let Some(body) = bodies.get(self.body.0) {
            self.transform = body.transform().compose(&self.offset);
        }
    }

    /// World transform as of the last [`CollisionPrimitive::calculate_internals`].
    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Column `index` of the world transform; 3 is the world position.
    #[inline]
    pub fn axis(&self, index: usize) -> Vector3 {
        self.transform.axis(index)
    }

    #[inline]
    pub fn position(&self) -> Vector3 {
        self.transform.translation()
    }

    pub fn radius(&self) -> Option<Real> {
        match self.shape {
            Shape::Sphere { radius } => Some(radius),
            Shape::Box { .. } => None,
        }
    }

    pub fn half_size(&self) -> Option<Vector3> {
        match self.shape {
            Shape::Box { half_size } => Some(half_size),
            Shape::Sphere { .. } => None,
        }
    }
}

/// An immovable plane `normal · p = offset`. Used either as a half-space
/// (everything behind the plane is solid) or as a two-sided plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPlane {
    /// Unit normal.
    pub normal: Vector3,
    /// Distance of the plane from the origin along the normal.
    pub offset: Real,
}

impl CollisionPlane {
    pub fn new(normal: Vector3, offset: Real) -> Self {
        Self { normal, offset }
    }

    /// The ground plane `y = 0` facing up.
    pub fn ground() -> Self {
        Self::new(Vector3::new(0.0, 1.0, 0.0), 0.0)
    }
}

/// Friction stamped on contacts by a fresh [`CollisionData`].
pub const DEFAULT_FRICTION: Real = 0.9;
/// Restitution stamped on contacts by a fresh [`CollisionData`].
pub const DEFAULT_RESTITUTION: Real = 0.1;

/// Bounded contact sink the detectors write into.
///
/// Once `N` contacts are stored every further write is refused. Contacts are
/// stamped with the sink's `friction` and `restitution`.
#[derive(Debug, Clone)]
pub struct CollisionData<const N: usize> {
    contacts: heapless::Vec<Contact, N>,
    pub friction: Real,
    pub restitution: Real,
}

impl<const N: usize> Default for CollisionData<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CollisionData<N> {
    pub fn new() -> Self {
        Self {
            contacts: heapless::Vec::new(),
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
        }
    }

    /// Builder: friction stamped on new contacts.
    pub fn with_friction(mut self, friction: Real) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Builder: restitution stamped on new contacts (0.0..=1.0).
    pub fn with_restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Drop all stored contacts.
    pub fn reset(&mut self) {
        self.contacts.clear();
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn contacts_left(&self) -> usize {
        N - self.contacts.len()
    }

    #[inline]
    pub fn has_more_contacts(&self) -> bool {
        self.contacts.len() < N
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut [Contact] {
        &mut self.contacts
    }

    fn has_room(&self) -> bool {
        if self.has_more_contacts() {
            return true;
        }
        debug!("CollisionData: sink full (max {}), contact dropped", N);
        false
    }

    fn add(
        &mut self,
        first: BodyId,
        second: Option<BodyId>,
        contact_point: Vector3,
        normal: Vector3,
        penetration: Real,
    ) -> usize {
        let contact = Contact {
            first,
            second,
            contact_point,
            normal,
            penetration,
            restitution: self.restitution,
            friction: self.friction,
        };
        if self.contacts.push(contact).is_err() {
            debug!("CollisionData: sink full (max {}), contact dropped", N);
            return 0;
        }
        1
    }
}

/// Half-length of the box's projection onto `axis`.
fn transform_to_axis(transform: &Transform, half_size: &Vector3, axis: &Vector3) -> Real {
    half_size.x * transform.axis(0).dot(axis).abs()
        + half_size.y * transform.axis(1).dot(axis).abs()
        + half_size.z * transform.axis(2).dot(axis).abs()
}

/// Separating-axis test between two boxes. Returns the smallest overlap and
/// the index of the axis it was found on, or `None` if any axis separates
/// them.
///
/// Axes 0..3 are the first box's faces, 3..6 the second box's faces and
/// 6..15 the cross products `one.axis((i - 6) / 3) × two.axis((i - 6) % 3)`.
/// Near-parallel edge pairs produce near-zero cross products and are
/// skipped.
fn box_box_overlap(
    one: &Transform,
    one_half: &Vector3,
    two: &Transform,
    two_half: &Vector3,
) -> Option<(Real, usize)> {
    let to_centre = two.translation() - one.translation();

    let mut smallest = REAL_MAX;
    let mut best = None;
    for index in 0..15 {
        let mut axis = match index {
            0..=2 => one.axis(index),
            3..=5 => two.axis(index - 3),
            _ => one.axis((index - 6) / 3).cross(&two.axis((index - 6) % 3)),
        };
        if axis.norm_squared() < 1e-4 {
            continue;
        }
        axis.normalize_mut();

        let overlap = transform_to_axis(one, one_half, &axis) + transform_to_axis(two, two_half, &axis)
            - to_centre.dot(&axis).abs();
        if overlap < 0.0 {
            return None;
        }
        if overlap < smallest {
            smallest = overlap;
            best = Some(index);
        }
    }
    best.map(|index| (smallest, index))
}

/// Boolean overlap tests without contact generation.
pub mod intersection {
    use super::{CollisionPlane, CollisionPrimitive, box_box_overlap, transform_to_axis};

    pub fn sphere_and_half_space(sphere: &CollisionPrimitive, plane: &CollisionPlane) -> bool {
        let Some(radius) = sphere.radius() else {
            return false;
        };
        plane.normal.dot(&sphere.position()) - radius <= plane.offset
    }

    pub fn sphere_and_sphere(one: &CollisionPrimitive, two: &CollisionPrimitive) -> bool {
        let (Some(r1), Some(r2)) = (one.radius(), two.radius()) else {
            return false;
        };
        let midline = one.position() - two.position();
        midline.norm_squared() < (r1 + r2) * (r1 + r2)
    }

    pub fn box_and_half_space(cuboid: &CollisionPrimitive, plane: &CollisionPlane) -> bool {
        let Some(half_size) = cuboid.half_size() else {
            return false;
        };
        let projected_radius = transform_to_axis(cuboid.transform(), &half_size, &plane.normal);
        plane.normal.dot(&cuboid.position()) - projected_radius <= plane.offset
    }

    pub fn box_and_box(one: &CollisionPrimitive, two: &CollisionPrimitive) -> bool {
        let (Some(one_half), Some(two_half)) = (one.half_size(), two.half_size()) else {
            return false;
        };
        box_box_overlap(one.transform(), &one_half, two.transform(), &two_half).is_some()
    }
}

/// Sphere against the solid half-space behind `plane`.
pub fn sphere_and_half_space<const N: usize>(
    sphere: &CollisionPrimitive,
    plane: &CollisionPlane,
    data: &mut CollisionData<N>,
) -> usize {
    let Some(radius) = sphere.radius() else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let position = sphere.position();
    let distance = plane.normal.dot(&position) - plane.offset;
    if distance > radius {
        return 0;
    }

    // Halfway between the deepest point of the sphere and the plane.
    let contact_point = position - plane.normal * ((distance + radius) * 0.5);
    data.add(sphere.body, None, contact_point, plane.normal, radius - distance)
}

/// Sphere against a two-sided plane: the normal faces the side the sphere's
/// center is on.
pub fn sphere_and_true_plane<const N: usize>(
    sphere: &CollisionPrimitive,
    plane: &CollisionPlane,
    data: &mut CollisionData<N>,
) -> usize {
    let Some(radius) = sphere.radius() else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let position = sphere.position();
    let distance = plane.normal.dot(&position) - plane.offset;
    if distance * distance > radius * radius {
        return 0;
    }

    let (normal, penetration) = if distance < 0.0 {
        (-plane.normal, radius + distance)
    } else {
        (plane.normal, radius - distance)
    };
    let contact_point = position - plane.normal * distance;
    data.add(sphere.body, None, contact_point, normal, penetration)
}

/// Sphere against sphere. The normal points from `two` towards `one`;
/// coincident centers use `+Y`.
pub fn sphere_and_sphere<const N: usize>(
    one: &CollisionPrimitive,
    two: &CollisionPrimitive,
    data: &mut CollisionData<N>,
) -> usize {
    let (Some(r1), Some(r2)) = (one.radius(), two.radius()) else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let p1 = one.position();
    let p2 = two.position();
    let midline = p1 - p2;
    let size = midline.norm();
    if size >= r1 + r2 {
        return 0;
    }

    let normal = if size > 1e-6 {
        midline / size
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };
    // Midpoint between the two surface points inside the overlap.
    let contact_point = ((p1 - normal * r1) + (p2 + normal * r2)) * 0.5;
    data.add(one.body, Some(two.body), contact_point, normal, r1 + r2 - size)
}

/// Box against the solid half-space behind `plane`. The contact point is
/// the box corner deepest below the plane.
pub fn box_and_half_space<const N: usize>(
    cuboid: &CollisionPrimitive,
    plane: &CollisionPlane,
    data: &mut CollisionData<N>,
) -> usize {
    let Some(half_size) = cuboid.half_size() else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let transform = cuboid.transform();
    let projected_radius = transform_to_axis(transform, &half_size, &plane.normal);
    let distance = plane.normal.dot(&cuboid.position()) - plane.offset;
    if distance > projected_radius {
        return 0;
    }

    let corner = |i: usize, half: Real| {
        if transform.axis(i).dot(&plane.normal) < 0.0 {
            half
        } else {
            -half
        }
    };
    let local_vertex = Vector3::new(
        corner(0, half_size.x),
        corner(1, half_size.y),
        corner(2, half_size.z),
    );
    let contact_point = transform.transform(&local_vertex);
    data.add(cuboid.body, None, contact_point, plane.normal, projected_radius - distance)
}

/// Box against box by the separating-axis test. The penetration is the
/// smallest overlap over all 15 axes, the normal is that axis turned to
/// point from `two` towards `one`, and the contact point is the midpoint of
/// the two centers.
pub fn box_and_box<const N: usize>(
    one: &CollisionPrimitive,
    two: &CollisionPrimitive,
    data: &mut CollisionData<N>,
) -> usize {
    let (Some(one_half), Some(two_half)) = (one.half_size(), two.half_size()) else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let Some((penetration, best)) = box_box_overlap(one.transform(), &one_half, two.transform(), &two_half)
    else {
        return 0;
    };

    let mut normal = match best {
        0..=2 => one.axis(best),
        3..=5 => two.axis(best - 3),
        _ => one.axis((best - 6) / 3).cross(&two.axis((best - 6) % 3)),
    };
    normal.normalize_mut();

    let to_centre = two.position() - one.position();
    if normal.dot(&to_centre) > 0.0 {
        normal = -normal;
    }

    let contact_point = one.position() + to_centre * 0.5;
    data.add(one.body, Some(two.body), contact_point, normal, penetration)
}

/// Box against sphere. The normal points from the sphere's center towards
/// the closest point of the box.
pub fn box_and_sphere<const N: usize>(
    cuboid: &CollisionPrimitive,
    sphere: &CollisionPrimitive,
    data: &mut CollisionData<N>,
) -> usize {
    let (Some(half_size), Some(radius)) = (cuboid.half_size(), sphere.radius()) else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let centre = sphere.position();
    let relative_centre = cuboid.transform().transform_inverse(&centre);

    // Early out on any face.
    if relative_centre.x.abs() - radius > half_size.x
        || relative_centre.y.abs() - radius > half_size.y
        || relative_centre.z.abs() - radius > half_size.z
    {
        return 0;
    }

    let closest = Vector3::new(
        relative_centre.x.clamp(-half_size.x, half_size.x),
        relative_centre.y.clamp(-half_size.y, half_size.y),
        relative_centre.z.clamp(-half_size.z, half_size.z),
    );
    let distance_sq = (closest - relative_centre).norm_squared();
    if distance_sq > radius * radius {
        return 0;
    }

    let closest_world = cuboid.transform().transform(&closest);
    let distance = distance_sq.sqrt();
    if distance > 1e-6 {
        let normal = (closest_world - centre) / distance;
        return data.add(cuboid.body, Some(sphere.body), closest_world, normal, radius - distance);
    }

    // Center inside the box: leave through the nearest face.
    let mut axis = 0;
    let mut depth = REAL_MAX;
    for i in 0..3 {
        let d = half_size[i] - relative_centre[i].abs();
        if d < depth {
            depth = d;
            axis = i;
        }
    }
    let sign = if relative_centre[axis] < 0.0 { 1.0 } else { -1.0 };
    let normal = cuboid.axis(axis) * sign;
    data.add(cuboid.body, Some(sphere.body), centre, normal, radius + depth)
}

/// Box against a single world-space point (for example a particle). The
/// normal is the box face axis through which the point leaves soonest,
/// oriented so that moving the box along it expels the point.
pub fn box_and_point<const N: usize>(
    cuboid: &CollisionPrimitive,
    point: &Vector3,
    data: &mut CollisionData<N>,
) -> usize {
    let Some(half_size) = cuboid.half_size() else {
        return 0;
    };
    if !data.has_room() {
        return 0;
    }

    let relative_point = cuboid.transform().transform_inverse(point);

    let mut axis = 0;
    let mut min_depth = REAL_MAX;
    for i in 0..3 {
        let depth = half_size[i] - relative_point[i].abs();
        if depth < 0.0 {
            return 0;
        }
        if depth < min_depth {
            min_depth = depth;
            axis = i;
        }
    }

    let sign = if relative_point[axis] < 0.0 { 1.0 } else { -1.0 };
    let normal = cuboid.axis(axis) * sign;
    data.add(cuboid.body, None, *point, normal, min_depth)
}

/// Dispatch a primitive pair to the matching detector.
pub fn collide_primitives<const N: usize>(
    one: &CollisionPrimitive,
    two: &CollisionPrimitive,
    data: &mut CollisionData<N>,
) -> usize {
    match (one.shape, two.shape) {
        (Shape::Sphere { .. }, Shape::Sphere { .. }) => sphere_and_sphere(one, two, data),
        (Shape::Box { .. }, Shape::Box { .. }) => box_and_box(one, two, data),
        (Shape::Box { .. }, Shape::Sphere { .. }) => box_and_sphere(one, two, data),
        (Shape::Sphere { .. }, Shape::Box { .. }) => box_and_sphere(two, one, data),
    }
}

/// Dispatch a primitive against a half-space.
pub fn collide_with_half_space<const N: usize>(
    primitive: &CollisionPrimitive,
    plane: &CollisionPlane,
    data: &mut CollisionData<N>,
) -> usize {
    match primitive.shape {
        Shape::Sphere { .. } => sphere_and_half_space(primitive, plane, data),
        Shape::Box { .. } => box_and_half_space(primitive, plane, data),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::math::Quaternion;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vector3, b: &Vector3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn placed(primitive: CollisionPrimitive, position: Vector3, orientation: Quaternion) -> CollisionPrimitive {
        let body = RigidBody::new(1.0)
            .with_position(position)
            .with_orientation(orientation);
        let mut primitive = CollisionPrimitive {
            body: BodyId(0),
            ..primitive
        };
        primitive.calculate_internals(core::slice::from_ref(&body));
        primitive
    }

    fn sphere_at(id: usize, position: Vector3, radius: Real) -> CollisionPrimitive {
        CollisionPrimitive {
            body: BodyId(id),
            ..placed(CollisionPrimitive::sphere(BodyId(id), radius), position, Quaternion::identity())
        }
    }

    fn box_at(id: usize, position: Vector3, half_size: Vector3, orientation: Quaternion) -> CollisionPrimitive {
        CollisionPrimitive {
            body: BodyId(id),
            ..placed(CollisionPrimitive::cuboid(BodyId(id), half_size), position, orientation)
        }
    }

    fn unit_box_at(id: usize, position: Vector3) -> CollisionPrimitive {
        box_at(id, position, Vector3::new(1.0, 1.0, 1.0), Quaternion::identity())
    }

    fn about_z(angle: Real) -> Quaternion {
        *nalgebra::UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle).quaternion()
    }

    fn about_x(angle: Real) -> Quaternion {
        *nalgebra::UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle).quaternion()
    }

    #[test]
    fn test_primitive_follows_body_and_offset() {
        let body = RigidBody::new(1.0)
            .with_position(Vector3::new(1.0, 0.0, 0.0))
            .with_orientation(about_z(core::f32::consts::FRAC_PI_2));
        let mut primitive = CollisionPrimitive::sphere(BodyId(0), 0.5)
            .with_offset(Transform::from_translation(Vector3::new(2.0, 0.0, 0.0)));
        primitive.calculate_internals(core::slice::from_ref(&body));
        // Local +X maps to world +Y.
        assert!(approx_vec_eq(&primitive.position(), &Vector3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn test_sphere_half_space_contact() {
        let sphere = sphere_at(0, Vector3::new(0.0, 0.5, 0.0), 1.0);
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_half_space(&sphere, &CollisionPlane::ground(), &mut data), 1);

        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_vec_eq(&contact.contact_point, &Vector3::new(0.0, -0.25, 0.0)));
        assert_eq!(contact.first, BodyId(0));
        assert_eq!(contact.second, None);
        assert!(approx_eq(contact.friction, data.friction));
        assert!(approx_eq(contact.restitution, data.restitution));
    }

    #[test]
    fn test_sphere_above_half_space_misses() {
        let sphere = sphere_at(0, Vector3::new(0.0, 1.5, 0.0), 1.0);
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_half_space(&sphere, &CollisionPlane::ground(), &mut data), 0);
        assert!(!intersection::sphere_and_half_space(&sphere, &CollisionPlane::ground()));
        assert_eq!(data.contact_count(), 0);
    }

    #[test]
    fn test_sphere_true_plane_from_below() {
        let sphere = sphere_at(0, Vector3::new(0.0, -0.5, 0.0), 1.0);
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_true_plane(&sphere, &CollisionPlane::ground(), &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, -1.0, 0.0)));
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_vec_eq(&contact.contact_point, &Vector3::zeros()));
    }

    #[test]
    fn test_sphere_sphere_contact() {
        let one = sphere_at(0, Vector3::new(1.5, 0.0, 0.0), 1.0);
        let two = sphere_at(1, Vector3::zeros(), 1.0);
        let mut data = CollisionData::<4>::new();
        assert!(intersection::sphere_and_sphere(&one, &two));
        assert_eq!(sphere_and_sphere(&one, &two, &mut data), 1);

        let contact = data.contacts()[0];
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(1.0, 0.0, 0.0)));
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_vec_eq(&contact.contact_point, &Vector3::new(0.75, 0.0, 0.0)));
        assert_eq!(contact.second, Some(BodyId(1)));
    }

    #[test]
    fn test_coincident_spheres_use_up_normal() {
        let one = sphere_at(0, Vector3::zeros(), 1.0);
        let two = sphere_at(1, Vector3::zeros(), 0.5);
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_sphere(&one, &two, &mut data), 1);
        assert!(approx_vec_eq(&data.contacts()[0].normal, &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_eq(data.contacts()[0].penetration, 1.5));
    }

    #[test]
    fn test_touching_spheres_do_not_collide() {
        let one = sphere_at(0, Vector3::new(2.0, 0.0, 0.0), 1.0);
        let two = sphere_at(1, Vector3::zeros(), 1.0);
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_sphere(&one, &two, &mut data), 0);
    }

    #[test]
    fn test_box_half_space_deepest_corner() {
        let cuboid = unit_box_at(0, Vector3::new(0.0, 0.5, 0.0));
        let mut data = CollisionData::<4>::new();
        assert!(intersection::box_and_half_space(&cuboid, &CollisionPlane::ground()));
        assert_eq!(box_and_half_space(&cuboid, &CollisionPlane::ground(), &mut data), 1);

        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_eq(contact.contact_point.y, -0.5));
    }

    #[test]
    fn test_tilted_box_half_space() {
        let cuboid = box_at(
            0,
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            about_z(core::f32::consts::FRAC_PI_4),
        );
        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_half_space(&cuboid, &CollisionPlane::ground(), &mut data), 1);
        let contact = data.contacts()[0];
        // A unit box on its edge reaches sqrt(2) below its center.
        assert!(approx_eq(contact.penetration, core::f32::consts::SQRT_2 - 1.0));
        assert!(approx_eq(contact.contact_point.x, 0.0));
        assert!(approx_eq(contact.contact_point.y, 1.0 - core::f32::consts::SQRT_2));
    }

    #[test]
    fn test_axis_aligned_boxes_overlap() {
        let one = unit_box_at(0, Vector3::zeros());
        let two = unit_box_at(1, Vector3::new(1.5, 0.25, 0.0));
        let mut data = CollisionData::<4>::new();
        assert!(intersection::box_and_box(&one, &two));
        assert_eq!(box_and_box(&one, &two, &mut data), 1);

        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.5));
        // Face axis, pointing from the second box towards the first.
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(-1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&contact.contact_point, &Vector3::new(0.75, 0.125, 0.0)));
        assert_eq!(contact.first, BodyId(0));
        assert_eq!(contact.second, Some(BodyId(1)));
    }

    #[test]
    fn test_stacked_boxes_use_vertical_face() {
        let one = unit_box_at(0, Vector3::new(0.0, 1.9, 0.0));
        let two = unit_box_at(1, Vector3::zeros());
        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_box(&one, &two, &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.1));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_rotated_box_overlap() {
        let one = unit_box_at(0, Vector3::zeros());
        let two = box_at(
            1,
            Vector3::new(2.2, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            about_z(core::f32::consts::FRAC_PI_4),
        );
        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_box(&one, &two, &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 1.0 + core::f32::consts::SQRT_2 - 2.2));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_crossed_edges_use_edge_axis() {
        // A's top edge runs along Z, B's bottom edge along X; they cross with
        // 0.1 of overlap along Y.
        let quarter = core::f32::consts::FRAC_PI_4;
        let one = box_at(0, Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0), about_z(quarter));
        let two = box_at(
            1,
            Vector3::new(0.0, 2.0 * core::f32::consts::SQRT_2 - 0.1, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            about_x(quarter),
        );

        let (overlap, axis) = box_box_overlap(
            one.transform(),
            &Vector3::new(1.0, 1.0, 1.0),
            two.transform(),
            &Vector3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        assert!(axis >= 6, "expected an edge-edge axis, got {}", axis);
        assert!(approx_eq(overlap, 0.1));

        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_box(&one, &two, &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.1));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_separated_boxes() {
        let one = unit_box_at(0, Vector3::zeros());
        let two = box_at(
            1,
            Vector3::new(2.5, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            about_z(core::f32::consts::FRAC_PI_4),
        );
        let mut data = CollisionData::<4>::new();
        assert!(!intersection::box_and_box(&one, &two));
        assert_eq!(box_and_box(&one, &two, &mut data), 0);
    }

    #[test]
    fn test_box_and_sphere() {
        let cuboid = unit_box_at(0, Vector3::zeros());
        let sphere = sphere_at(1, Vector3::new(1.5, 0.0, 0.0), 1.0);
        let mut data = CollisionData::<4>::new();
        assert_eq!(collide_primitives(&sphere, &cuboid, &mut data), 1);

        let contact = data.contacts()[0];
        assert_eq!(contact.first, BodyId(0));
        assert_eq!(contact.second, Some(BodyId(1)));
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(-1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&contact.contact_point, &Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_sphere_centre_inside_box() {
        let cuboid = unit_box_at(0, Vector3::zeros());
        let sphere = sphere_at(1, Vector3::new(0.0, 0.0, 0.75), 0.5);
        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_sphere(&cuboid, &sphere, &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(0.0, 0.0, -1.0)));
        assert!(approx_eq(contact.penetration, 0.75));
    }

    #[test]
    fn test_box_and_point() {
        let cuboid = unit_box_at(0, Vector3::zeros());
        let mut data = CollisionData::<4>::new();
        assert_eq!(box_and_point(&cuboid, &Vector3::new(0.8, 0.1, -0.3), &mut data), 1);
        let contact = data.contacts()[0];
        assert!(approx_eq(contact.penetration, 0.2));
        assert!(approx_vec_eq(&contact.normal, &Vector3::new(-1.0, 0.0, 0.0)));

        assert_eq!(box_and_point(&cuboid, &Vector3::new(1.2, 0.0, 0.0), &mut data), 0);
    }

    #[test]
    fn test_full_sink_refuses_contacts() {
        let sphere = sphere_at(0, Vector3::zeros(), 1.0);
        let mut data = CollisionData::<1>::new();
        assert_eq!(sphere_and_half_space(&sphere, &CollisionPlane::ground(), &mut data), 1);
        assert!(!data.has_more_contacts());
        assert_eq!(data.contacts_left(), 0);
        assert_eq!(sphere_and_half_space(&sphere, &CollisionPlane::ground(), &mut data), 0);
        assert_eq!(data.contact_count(), 1);

        data.reset();
        assert_eq!(data.contacts_left(), 1);
    }

    #[test]
    fn test_mismatched_shape_writes_nothing() {
        let cuboid = unit_box_at(0, Vector3::zeros());
        let mut data = CollisionData::<4>::new();
        assert_eq!(sphere_and_half_space(&cuboid, &CollisionPlane::ground(), &mut data), 0);
        assert_eq!(collide_with_half_space(&cuboid, &CollisionPlane::ground(), &mut data), 1);
    }

    #[test]
    fn test_sink_defaults_are_configurable() {
        let data = CollisionData::<2>::new().with_friction(-1.0).with_restitution(1.5);
        assert_eq!(data.friction, 0.0);
        assert_eq!(data.restitution, 1.0);
    }
}
