//! Rigid pose algebra (position + orientation, no scale).

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Squared length under which a direction is considered degenerate.
pub const DEGENERATE_LENGTH_SQUARED: f32 = 1e-12;

/// A rigid transform sampled from a tracking source.
///
/// Local axes follow the tracking convention: +Z is forward (distal),
/// +Y is up (dorsal) and +X is right.
///
/// # Example
///
/// ```
/// use posestream::Pose;
/// use glam::{Quat, Vec3};
///
/// let reference = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(0.5));
/// let round_trip = reference.compose(&reference.inverse());
/// assert!(round_trip.approx_eq(&Pose::IDENTITY, 1e-5, 1e-5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[must_use]
    pub const fn from_rotation(rotation: Quat) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation,
        }
    }

    /// Returns the pose `q` such that `self.compose(&q)` is the identity.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            position: inv_rotation * (-self.position),
            rotation: inv_rotation,
        }
    }

    /// Expresses `other` (given in this pose's local frame) in the parent frame.
    ///
    /// Not commutative: `a.compose(&b)` applies `b` first, then `a`.
    #[must_use]
    pub fn compose(&self, other: &Pose) -> Self {
        Self {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Linear blend of the positions and shortest-arc slerp of the rotations.
    ///
    /// `t` outside of `[0, 1]` extrapolates.
    #[must_use]
    pub fn interpolate(&self, other: &Pose, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
        }
    }

    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    /// Local +Z in the parent frame.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Local +Y in the parent frame.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Local +X in the parent frame.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    #[must_use]
    pub fn with_rotation(self, rotation: Quat) -> Self {
        Self { rotation, ..self }
    }

    #[must_use]
    pub fn distance(&self, other: &Pose) -> f32 {
        self.position.distance(other.position)
    }

    #[must_use]
    pub fn distance_squared(&self, other: &Pose) -> f32 {
        self.position.distance_squared(other.position)
    }

    /// Compares positions by distance and rotations by the angle between them (radians).
    #[must_use]
    pub fn approx_eq(&self, other: &Pose, position_epsilon: f32, angle_epsilon: f32) -> bool {
        self.position.distance(other.position) <= position_epsilon
            && rotation_angle(self.rotation, other.rotation) <= angle_epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

/// Builds the rotation whose local +Z points along `forward` and whose local +Y
/// is as close as possible to `up`.
///
/// Returns `None` when `forward` is degenerate or parallel to `up`.
#[must_use]
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    if forward.length_squared() < DEGENERATE_LENGTH_SQUARED {
        return None;
    }
    let forward = forward.normalize();
    let right = up.cross(forward);
    if right.length_squared() < DEGENERATE_LENGTH_SQUARED {
        return None;
    }
    let right = right.normalize();
    let up = forward.cross(right);
    let rotation = Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize();
    rotation.is_finite().then_some(rotation)
}

/// Unsigned angle in radians between two directions, 0 if either is degenerate.
#[must_use]
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    let denominator = (a.length_squared() * b.length_squared()).sqrt();
    if denominator < DEGENERATE_LENGTH_SQUARED {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(-1.0, 1.0).acos()
}

/// Angle in radians turning `from` onto `to` around `axis` (right-hand rule).
#[must_use]
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let Some(axis) = axis.try_normalize() else {
        return 0.0;
    };
    let sin = axis.dot(from.cross(to));
    let cos = from.dot(to);
    if sin.abs() < f32::EPSILON && cos.abs() < f32::EPSILON {
        return 0.0;
    }
    sin.atan2(cos)
}

/// Removes the component of `vector` along `normal`.
#[must_use]
pub fn project_on_plane(vector: Vec3, normal: Vec3) -> Vec3 {
    match normal.try_normalize() {
        Some(n) => vector - n * vector.dot(n),
        None => vector,
    }
}

/// Smallest angle in radians taking rotation `a` onto rotation `b`.
#[must_use]
pub fn rotation_angle(a: Quat, b: Quat) -> f32 {
    let dot = a.normalize().dot(b.normalize()).abs().min(1.0);
    2.0 * dot.acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_approx_eq, assert_vec3_approx_eq};
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = Pose::new(
            Vec3::new(0.3, -1.2, 4.0),
            Quat::from_euler(glam::EulerRot::YXZ, 0.4, -0.7, 1.1),
        );
        assert!(pose.compose(&pose.inverse()).approx_eq(&Pose::IDENTITY, 1e-5, 1e-3));
        assert!(pose.inverse().compose(&pose).approx_eq(&Pose::IDENTITY, 1e-5, 1e-3));
    }

    #[test]
    fn test_compose_applies_frame() {
        let parent = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));
        let child = Pose::from_position(Vec3::new(0.0, 0.0, 1.0));
        let composed = parent.compose(&child);
        // +Z rotated by +90 degrees about Y lands on +X.
        assert_vec3_approx_eq(composed.position, Vec3::new(2.0, 0.0, 0.0), 1e-5);
    }

    #[test]
    fn test_compose_is_not_commutative() {
        let a = Pose::new(Vec3::X, Quat::from_rotation_z(FRAC_PI_2));
        let b = Pose::new(Vec3::Y, Quat::IDENTITY);
        assert!(!a.compose(&b).approx_eq(&b.compose(&a), 1e-4, 1e-4));
    }

    #[test]
    fn test_interpolate_midpoint_and_extrapolation() {
        let a = Pose::new(Vec3::ZERO, Quat::IDENTITY);
        let b = Pose::new(Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));
        let mid = a.interpolate(&b, 0.5);
        assert_vec3_approx_eq(mid.position, Vec3::new(1.0, 0.0, 0.0), 1e-6);
        assert_approx_eq(rotation_angle(mid.rotation, Quat::IDENTITY), FRAC_PI_2 / 2.0, 1e-4);

        let beyond = a.interpolate(&b, 1.5);
        assert_vec3_approx_eq(beyond.position, Vec3::new(3.0, 0.0, 0.0), 1e-6);
    }

    #[test]
    fn test_interpolate_takes_shortest_arc() {
        let a = Pose::from_rotation(Quat::from_rotation_y(0.1));
        // Same orientation expressed with the opposite quaternion sign.
        let b = Pose::from_rotation(-Quat::from_rotation_y(0.3));
        let mid = a.interpolate(&b, 0.5);
        assert_approx_eq(rotation_angle(mid.rotation, Quat::from_rotation_y(0.2)), 0.0, 1e-3);
    }

    #[test]
    fn test_look_rotation_axes() {
        let rotation = look_rotation(Vec3::X, Vec3::Y).unwrap();
        assert_vec3_approx_eq(rotation * Vec3::Z, Vec3::X, 1e-5);
        assert_vec3_approx_eq(rotation * Vec3::Y, Vec3::Y, 1e-5);
    }

    #[test]
    fn test_look_rotation_degenerate() {
        assert!(look_rotation(Vec3::ZERO, Vec3::Y).is_none());
        assert!(look_rotation(Vec3::Y, Vec3::Y * 3.0).is_none());
    }

    #[test]
    fn test_angle_helpers_never_nan() {
        assert_eq!(angle_between(Vec3::ZERO, Vec3::X), 0.0);
        assert_approx_eq(angle_between(Vec3::X, -Vec3::X), PI, 1e-5);
        assert_eq!(signed_angle(Vec3::ZERO, Vec3::X, Vec3::Y), 0.0);
        assert_eq!(signed_angle(Vec3::X, Vec3::Z, Vec3::ZERO), 0.0);
        assert_approx_eq(signed_angle(Vec3::Y, -Vec3::X, Vec3::Z), FRAC_PI_2, 1e-5);
        assert_approx_eq(signed_angle(Vec3::Y, Vec3::X, Vec3::Z), -FRAC_PI_2, 1e-5);
    }

    #[test]
    fn test_project_on_plane() {
        let projected = project_on_plane(Vec3::new(1.0, 2.0, 3.0), Vec3::Y * 5.0);
        assert_vec3_approx_eq(projected, Vec3::new(1.0, 0.0, 3.0), 1e-6);
        assert_eq!(project_on_plane(Vec3::ONE, Vec3::ZERO), Vec3::ONE);
    }
}
