//! Math kernel shared by every other module.
//!
//! Vectors, matrices and quaternions are plain [`nalgebra`] types fixed to
//! [`Real`]. This module adds the handful of operations the simulation needs
//! on top of them with the exact degenerate-case behaviour the integrators
//! rely on: normalizing a zero vector is a no-op, normalizing a zero
//! quaternion yields the identity, and inverting a singular matrix leaves it
//! untouched.
//!
//! [`Transform`] is the 3x4 affine matrix (rotation block + translation
//! column) cached by rigid bodies and collision primitives.

use nalgebra::Matrix3x4;

// ComplexField provides sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Scalar type used throughout the crate.
pub type Real = f32;

/// Largest representable [`Real`], used as the "nothing found yet" sentinel.
pub const REAL_MAX: Real = Real::MAX;

pub type Vector3 = nalgebra::Vector3<Real>;
pub type Matrix3 = nalgebra::Matrix3<Real>;
/// Orientation quaternion, `w` is the real part (`r`).
pub type Quaternion = nalgebra::Quaternion<Real>;

/// Normalize `v` in place. A zero-length vector is left unchanged.
#[inline]
pub fn normalize(v: &mut Vector3) {
    let _ = v.try_normalize_mut(0.0);
}

/// Returns `v` normalized, or `v` itself if its length is zero.
#[inline]
pub fn normalized(mut v: Vector3) -> Vector3 {
    normalize(&mut v);
    v
}

/// Orientation-specific quaternion operations.
pub trait QuaternionExt {
    /// Normalize to unit length. Falls back to the identity when the squared
    /// norm is exactly zero.
    fn normalize_or_identity(&mut self);

    /// First-order integration of an angular velocity into this orientation:
    /// `q += 0.5 * (0, v * scale) * q`.
    fn add_scaled_vector(&mut self, vector: &Vector3, scale: Real);

    /// Rotate by the pure quaternion `(0, v)`: `q = q * (0, v)`.
    fn rotate_by_vector(&mut self, vector: &Vector3);
}

impl QuaternionExt for Quaternion {
    fn normalize_or_identity(&mut self) {
        let d = self.norm_squared();
        if d == 0.0 {
            self.w = 1.0;
            return;
        }
        let inv = 1.0 / d.sqrt();
        self.coords *= inv;
    }

    fn add_scaled_vector(&mut self, vector: &Vector3, scale: Real) {
        let spin = Quaternion::new(0.0, vector.x * scale, vector.y * scale, vector.z * scale);
        let q = spin * *self;
        self.coords += q.coords * 0.5;
    }

    fn rotate_by_vector(&mut self, vector: &Vector3) {
        let q = Quaternion::new(0.0, vector.x, vector.y, vector.z);
        *self = *self * q;
    }
}

/// Rotation matrix of a (unit) quaternion.
pub fn rotation_matrix(q: &Quaternion) -> Matrix3 {
    let (r, i, j, k) = (q.w, q.i, q.j, q.k);
    Matrix3::new(
        1.0 - (2.0 * j * j + 2.0 * k * k),
        2.0 * i * j - 2.0 * k * r,
        2.0 * i * k + 2.0 * j * r,
        2.0 * i * j + 2.0 * k * r,
        1.0 - (2.0 * i * i + 2.0 * k * k),
        2.0 * j * k - 2.0 * i * r,
        2.0 * i * k - 2.0 * j * r,
        2.0 * j * k + 2.0 * i * r,
        1.0 - (2.0 * i * i + 2.0 * j * j),
    )
}

/// Invert `m` in place. A singular matrix (determinant exactly zero) is left
/// unmodified; returns whether the inversion happened.
pub fn invert(m: &mut Matrix3) -> bool {
    match m.try_inverse() {
        Some(inverse) => {
            *m = inverse;
            true
        }
        None => false,
    }
}

/// Build an inertia tensor from its principal moments and products of
/// inertia.
pub fn inertia_tensor_coeffs(ix: Real, iy: Real, iz: Real, ixy: Real, ixz: Real, iyz: Real) -> Matrix3 {
    Matrix3::new(ix, -ixy, -ixz, -ixy, iy, -iyz, -ixz, -iyz, iz)
}

/// Inertia tensor of a solid cuboid with the given half-extents.
///
/// For full dimensions `(2*hx, 2*hy, 2*hz)`:
/// - `Ixx = (1/12) * m * (4*hy² + 4*hz²)`
/// - `Iyy = (1/12) * m * (4*hx² + 4*hz²)`
/// - `Izz = (1/12) * m * (4*hx² + 4*hy²)`
pub fn cuboid_inertia_tensor(half_sizes: &Vector3, mass: Real) -> Matrix3 {
    let hx2 = 4.0 * half_sizes.x * half_sizes.x;
    let hy2 = 4.0 * half_sizes.y * half_sizes.y;
    let hz2 = 4.0 * half_sizes.z * half_sizes.z;
    let k = mass / 12.0;
    inertia_tensor_coeffs(k * (hy2 + hz2), k * (hx2 + hz2), k * (hx2 + hy2), 0.0, 0.0, 0.0)
}

/// Inertia tensor of a solid sphere: `I = (2/5) * m * r²` on every axis.
pub fn sphere_inertia_tensor(radius: Real, mass: Real) -> Matrix3 {
    let i = 0.4 * mass * radius * radius;
    inertia_tensor_coeffs(i, i, i, 0.0, 0.0, 0.0)
}

/// Affine transform stored as a 3x4 matrix: a rotation block in the first
/// three columns and the translation in the last one. There is no
/// perspective row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub data: Matrix3x4<Real>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            data: Matrix3x4::identity(),
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3) -> Self {
        let mut t = Self::identity();
        t.data.set_column(3, &translation);
        t
    }

    /// Combine an orientation and a position into a transform.
    pub fn from_orientation_and_pos(orientation: &Quaternion, position: &Vector3) -> Self {
        let mut t = Self::identity();
        t.set_orientation_and_pos(orientation, position);
        t
    }

    pub fn set_orientation_and_pos(&mut self, orientation: &Quaternion, position: &Vector3) {
        self.data
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_matrix(orientation));
        self.data.set_column(3, position);
    }

    /// The rotation block.
    #[inline]
    pub fn rotation(&self) -> Matrix3 {
        self.data.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column (the transformed origin).
    #[inline]
    pub fn translation(&self) -> Vector3 {
        self.data.column(3).into_owned()
    }

    /// Column `index` of the matrix. Columns 0..3 are the local axes in world
    /// space, column 3 is the translation.
    #[inline]
    pub fn axis(&self, index: usize) -> Vector3 {
        self.data.column(index).into_owned()
    }

    /// Transform a point (rotation and translation).
    #[inline]
    pub fn transform(&self, point: &Vector3) -> Vector3 {
        self.rotation() * point + self.translation()
    }

    /// Transform a direction (rotation only).
    #[inline]
    pub fn transform_direction(&self, direction: &Vector3) -> Vector3 {
        self.rotation() * direction
    }

    /// Inverse point transform. Assumes the rotation block is orthonormal and
    /// inverts it by transposition.
    #[inline]
    pub fn transform_inverse(&self, point: &Vector3) -> Vector3 {
        self.rotation().transpose() * (point - self.translation())
    }

    /// Inverse direction transform, see [`Transform::transform_inverse`].
    #[inline]
    pub fn transform_inverse_direction(&self, direction: &Vector3) -> Vector3 {
        self.rotation().transpose() * direction
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn compose(&self, other: &Transform) -> Transform {
        let rotation = self.rotation() * other.rotation();
        let translation = self.transform(&other.translation());
        let mut t = Self::identity();
        t.data.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        t.data.set_column(3, &translation);
        t
    }
}
