//! Test utilities for building pose streams and comparing poses
use crate::pose::{rotation_angle, Pose};
use glam::{Quat, Vec3};

/// Helper macro to build a pose from a position literal
#[macro_export]
macro_rules! pose_at {
    ($x:expr, $y:expr, $z:expr) => {
        $crate::Pose::from_position($crate::prelude::Vec3::new($x, $y, $z))
    };
}

pub fn assert_approx_eq(actual: f32, expected: f32, epsilon: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= epsilon,
        "expected {expected}, got {actual}, difference {diff} exceeds epsilon {epsilon}",
    );
}

pub fn assert_vec3_approx_eq(actual: Vec3, expected: Vec3, epsilon: f32) {
    let diff = actual.distance(expected);
    assert!(
        diff <= epsilon,
        "expected {expected:?}, got {actual:?}, distance {diff} exceeds epsilon {epsilon}",
    );
}

pub fn assert_quat_approx_eq(actual: Quat, expected: Quat, epsilon: f32) {
    let angle = rotation_angle(actual, expected);
    assert!(
        angle <= epsilon,
        "expected {expected:?}, got {actual:?}, angle {angle} exceeds epsilon {epsilon}",
    );
}

pub fn assert_pose_approx_eq(actual: &Pose, expected: &Pose, epsilon: f32) {
    assert_vec3_approx_eq(actual.position, expected.position, epsilon);
    assert_quat_approx_eq(actual.rotation, expected.rotation, epsilon);
}

/// Evenly spaced poses along a straight line, identity rotation.
pub fn line_poses(start: Vec3, step: Vec3, count: usize) -> Vec<Pose> {
    (0..count)
        .map(|i| Pose::from_position(start + step * i as f32))
        .collect()
}

/// Poses on a horizontal circle (XZ plane), rotation facing along the tangent.
pub fn circle_poses(radius: f32, count: usize, step_radians: f32) -> Vec<Pose> {
    (0..count)
        .map(|i| {
            let angle = i as f32 * step_radians;
            let position = Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
            let tangent = Vec3::new(-angle.sin(), 0.0, angle.cos());
            let rotation = crate::pose::look_rotation(tangent, Vec3::Y).unwrap_or(Quat::IDENTITY);
            Pose::new(position, rotation)
        })
        .collect()
}
