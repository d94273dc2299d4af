use glam::{DMat4, DQuat, DVec3};
use std::ops::Mul;

/// How far a quaternion norm may drift from one before it gets renormalized.
const UNIT_TOLERANCE: f64 = 1e-9;

/// Rigid body transform: a rotation followed by a translation.
///
/// Values are immutable once built. The rotation is always a unit quaternion,
/// inputs that are not (including NaN or all-zero quaternions from a sloppy
/// publisher) are normalized or replaced by the identity rotation on
/// construction.
///
/// # Example
/// ```
/// use cu_scene_tf::Transform;
///
/// let odom_to_base = Transform::from_arrays([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
/// let base_to_laser = Transform::from_arrays([0.0, 0.5, 0.2], [0.0, 0.0, 0.0, 1.0]);
/// let odom_to_laser = odom_to_base * base_to_laser;
/// assert_eq!(odom_to_laser.translation().to_array(), [1.0, 0.5, 0.2]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    translation: DVec3,
    rotation: DQuat,
}

fn normalize_rotation(rotation: DQuat) -> DQuat {
    let length = rotation.length();
    if !length.is_finite() || length <= f64::EPSILON {
        return DQuat::IDENTITY;
    }
    if (length - 1.0).abs() > UNIT_TOLERANCE {
        return rotation / length;
    }
    rotation
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation: normalize_rotation(rotation),
        }
    }

    /// Build from a `[x, y, z]` translation and a `[x, y, z, w]` rotation.
    pub fn from_arrays(translation: [f64; 3], rotation: [f64; 4]) -> Self {
        Self::new(DVec3::from_array(translation), DQuat::from_array(rotation))
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(translation, DQuat::IDENTITY)
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self::new(DVec3::ZERO, rotation)
    }

    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Apply `other` expressed in this transform's frame: `self * other`.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform::new(
            self.translation + self.rotation * other.translation,
            self.rotation * other.rotation,
        )
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform::new(-(rotation * self.translation), rotation)
    }

    /// Lerp the translations and slerp the rotations.
    ///
    /// `t` is clamped to `[0, 1]`, this never extrapolates.
    pub fn interpolate(a: &Transform, b: &Transform, t: f64) -> Transform {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        Transform::new(
            a.translation.lerp(b.translation, t),
            a.rotation.slerp(b.rotation, t),
        )
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.translation + self.rotation * point
    }

    /// Homogeneous matrix in column-major order, the translation is in the last row.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        let mat = DMat4::from_rotation_translation(self.rotation, self.translation);
        mat.to_cols_array_2d()
    }

    /// Inverse of [`Transform::to_matrix`]. Any scale in the matrix is discarded.
    pub fn from_matrix(mat: [[f64; 4]; 4]) -> Self {
        let mat = DMat4::from_cols_array_2d(&mat);
        let (_scale, rotation, translation) = mat.to_scale_rotation_translation();
        Self::new(translation, rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}
