//! Optional roll correction pulling the ribbon up vector towards a surface
//! normal.

use glam::{Quat, Vec3};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

/// Maps a normalised misalignment in [0, 1] to a correction strength in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResponseCurve {
    Linear,
    SmoothStep,
    Power(f32),
}

impl ResponseCurve {
    pub fn apply(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            ResponseCurve::Linear => x,
            ResponseCurve::SmoothStep => x * x * (3.0 - 2.0 * x),
            ResponseCurve::Power(exponent) => x.powf(*exponent),
        }
    }

    pub fn parse(name: &str, exponent: f32) -> Option<Self> {
        match name {
            "linear" => Some(ResponseCurve::Linear),
            "smoothstep" => Some(ResponseCurve::SmoothStep),
            "power" => Some(ResponseCurve::Power(exponent)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAlignment {
    /// Misalignment at or below this angle gets no correction.
    pub min_angle_degrees: f32,
    /// Misalignment at or above this angle gets full strength.
    pub max_angle_degrees: f32,
    pub response: ResponseCurve,
    /// Correction allowed per centimeter of travel, at full strength.
    pub max_angle_per_cm: f32,
    /// Pitch change that fully suppresses the correction.
    pub pitch_suppression_degrees: f32,
}

impl Default for SurfaceAlignment {
    fn default() -> Self {
        Self {
            min_angle_degrees: 5.0,
            max_angle_degrees: 45.0,
            response: ResponseCurve::SmoothStep,
            max_angle_per_cm: 2.0,
            pitch_suppression_degrees: 30.0,
        }
    }
}

fn inverse_lerp(min: f32, max: f32, value: f32) -> f32 {
    if max - min <= f32::EPSILON {
        return if value >= max { 1.0 } else { 0.0 };
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

impl SurfaceAlignment {
    pub fn validate(&self, component: &str) -> PsResult<()> {
        let finite = [
            self.min_angle_degrees,
            self.max_angle_degrees,
            self.max_angle_per_cm,
            self.pitch_suppression_degrees,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(PoseStreamError::invalid_config(
                component,
                "surface alignment values must be finite",
            ));
        }
        if self.min_angle_degrees < 0.0 || self.max_angle_degrees < self.min_angle_degrees {
            return Err(PoseStreamError::invalid_config(
                component,
                format!(
                    "alignment angles must satisfy 0 <= min <= max, got {} and {}",
                    self.min_angle_degrees, self.max_angle_degrees
                ),
            ));
        }
        if self.max_angle_per_cm < 0.0 {
            return Err(PoseStreamError::invalid_config(
                component,
                "max_angle_per_cm must be >= 0",
            ));
        }
        if self.pitch_suppression_degrees <= 0.0 {
            return Err(PoseStreamError::invalid_config(
                component,
                "pitch_suppression_degrees must be > 0",
            ));
        }
        if let ResponseCurve::Power(exponent) = self.response {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(PoseStreamError::invalid_config(
                    component,
                    format!("response exponent must be > 0, got {exponent}"),
                ));
            }
        }
        Ok(())
    }

    /// Strength in [0, 1] for a misalignment and a local pitch change, both in radians.
    pub fn strength(&self, misalignment: f32, pitch_change: f32) -> f32 {
        let normalized = inverse_lerp(
            self.min_angle_degrees,
            self.max_angle_degrees,
            radians_to_degrees(misalignment.abs()),
        );
        let suppression =
            (radians_to_degrees(pitch_change.abs()) / self.pitch_suppression_degrees).clamp(0.0, 1.0);
        self.response.apply(normalized) * (1.0 - suppression)
    }

    /// Rolls `rotation` about its forward axis towards `normal`.
    ///
    /// `segment_length` is in meters; the roll applied is at most
    /// `segment_length (cm) * max_angle_per_cm * strength`.
    pub fn correct(&self, rotation: Quat, normal: Vec3, pitch_change: f32, segment_length: f32) -> Quat {
        let forward = rotation * Vec3::Z;
        let up = rotation * Vec3::Y;
        let target = project_on_plane(normal, forward);
        if target.length_squared() < 1e-12 {
            return rotation;
        }
        let misalignment = signed_angle(up, target, forward);
        let strength = self.strength(misalignment, pitch_change);
        let limit = degrees_to_radians(
            meters_to_centimeters(segment_length) * self.max_angle_per_cm * strength,
        );
        let roll = misalignment.clamp(-limit, limit);
        if roll == 0.0 {
            return rotation;
        }
        (Quat::from_axis_angle(forward.normalize(), roll) * rotation).normalize()
    }
}
