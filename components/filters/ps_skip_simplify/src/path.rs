//! Distance and angle based path simplification policy.

use crate::{SkipDecision, SkipPolicy};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "skip_simplify";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSimplifyParams {
    /// Meters of path allowed between two emitted poses.
    pub max_skip_distance: f32,
    /// Chord deviation tolerated right after an emitted pose. It shrinks
    /// linearly to zero as the skipped path approaches `max_skip_distance`.
    pub max_skip_angle_degrees: f32,
    /// Same for the change of orientation.
    pub max_skip_rotation_degrees: f32,
    /// Poses closer than this to the last emitted one are noise.
    pub always_skip_radius: f32,
}

impl Default for PathSimplifyParams {
    fn default() -> Self {
        Self {
            max_skip_distance: 0.05,
            max_skip_angle_degrees: 10.0,
            max_skip_rotation_degrees: 20.0,
            always_skip_radius: 0.002,
        }
    }
}

impl PathSimplifyParams {
    pub fn validate(&self) -> PsResult<()> {
        if !self.max_skip_distance.is_finite() || self.max_skip_distance <= 0.0 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("max_skip_distance must be > 0, got {}", self.max_skip_distance),
            ));
        }
        for (key, value) in [
            ("max_skip_angle_degrees", self.max_skip_angle_degrees),
            ("max_skip_rotation_degrees", self.max_skip_rotation_degrees),
            ("always_skip_radius", self.always_skip_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PoseStreamError::invalid_config(
                    NAME,
                    format!("{key} must be a finite value >= 0, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSimplifyPolicy {
    params: PathSimplifyParams,
}

impl PathSimplifyPolicy {
    pub fn new(params: PathSimplifyParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PathSimplifyParams {
        &self.params
    }

    pub fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let mut params = PathSimplifyParams::default();
        if let Some(config) = config {
            params.max_skip_distance = config.get_or("max_skip_distance", params.max_skip_distance)?;
            params.max_skip_angle_degrees =
                config.get_or("max_skip_angle_degrees", params.max_skip_angle_degrees)?;
            params.max_skip_rotation_degrees =
                config.get_or("max_skip_rotation_degrees", params.max_skip_rotation_degrees)?;
            params.always_skip_radius =
                config.get_or("always_skip_radius", params.always_skip_radius)?;
        }
        Self::new(params)
    }
}

/// Length of the path from `start` through every pose of `path`.
fn path_length(start: &Pose, path: &[Pose]) -> f32 {
    let mut previous = start;
    let mut length = 0.0;
    for pose in path {
        length += previous.distance(pose);
        previous = pose;
    }
    length
}

impl SkipPolicy for PathSimplifyPolicy {
    fn decide(
        &mut self,
        candidate: &Pose,
        last_emitted: Option<&Pose>,
        skipped: &[Pose],
    ) -> SkipDecision {
        // the first pose of a session is held back and anchors the path
        let Some(anchor) = last_emitted.or(skipped.first()) else {
            return SkipDecision::Skip;
        };
        let radius = self.params.always_skip_radius;
        if anchor.distance_squared(candidate) < radius * radius {
            return SkipDecision::Discard;
        }
        let max_distance = self.params.max_skip_distance;
        let Some(pending) = skipped.last() else {
            return if anchor.distance(candidate) > max_distance {
                SkipDecision::Emit {
                    output: *candidate,
                    retain_candidate: false,
                }
            } else {
                SkipDecision::Skip
            };
        };

        let emit_pending = SkipDecision::Emit {
            output: *pending,
            retain_candidate: true,
        };
        let travelled = path_length(anchor, skipped) + pending.distance(candidate);
        if travelled > max_distance {
            return emit_pending;
        }

        let slack = 1.0 - travelled / max_distance;
        let angle_tolerance = degrees_to_radians(self.params.max_skip_angle_degrees) * slack;
        let rotation_tolerance = degrees_to_radians(self.params.max_skip_rotation_degrees) * slack;
        let chord_deviation = angle_between(
            pending.position - anchor.position,
            candidate.position - anchor.position,
        );
        let rotation_deviation = rotation_angle(anchor.rotation, pending.rotation);
        if chord_deviation > angle_tolerance || rotation_deviation > rotation_tolerance {
            emit_pending
        } else {
            SkipDecision::Skip
        }
    }
}
