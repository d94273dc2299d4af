/// Test utilities for creating and checking transforms
use crate::transform::Transform;
use approx::assert_relative_eq;
use glam::{DQuat, DVec3};

/// Create a pure translation transform
pub fn translation(x: f64, y: f64, z: f64) -> Transform {
    Transform::from_translation(DVec3::new(x, y, z))
}

/// Create a rotation of `angle` radians around Z
pub fn rotation_z(angle: f64) -> Transform {
    Transform::from_rotation(DQuat::from_rotation_z(angle))
}

/// Check the translation part of a transform within float noise
pub fn assert_translation(transform: &Transform, expected: [f64; 3]) {
    let actual = transform.translation().to_array();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, epsilon = 1e-9);
    }
}
