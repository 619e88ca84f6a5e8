//! Intersect gate: lets poses through only after they have been near a volume
//! for a number of consecutive samples.
//!
//! Emission is level-sensitive. Once `threshold` consecutive hits have been
//! counted, every further hit is forwarded; a single miss resets the counter
//! and a full run of `threshold` hits is needed again.

use glam::Vec3;
use log::{debug, trace};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "intersect_gate";

/// A region poses are tested against.
pub trait GateVolume {
    /// Closest point of the volume to `point`; `point` itself when inside.
    fn closest_point(&self, point: Vec3) -> Vec3;

    fn distance(&self, point: Vec3) -> f32 {
        self.closest_point(point).distance(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereVolume {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereVolume {
    pub fn new(center: Vec3, radius: f32) -> PsResult<Self> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("sphere radius must be a finite value >= 0, got {radius}"),
            ));
        }
        Ok(Self { center, radius })
    }
}

impl GateVolume for SphereVolume {
    fn closest_point(&self, point: Vec3) -> Vec3 {
        let offset = point - self.center;
        let distance = offset.length();
        if distance <= self.radius {
            point
        } else {
            self.center + offset * (self.radius / distance)
        }
    }
}

/// Box centred on `frame.position`, axes along the frame rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxVolume {
    pub frame: Pose,
    pub half_extents: Vec3,
}

impl BoxVolume {
    pub fn new(frame: Pose, half_extents: Vec3) -> PsResult<Self> {
        if !frame.is_finite() || !half_extents.is_finite() || half_extents.min_element() < 0.0 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("box half extents must be finite and >= 0, got {half_extents}"),
            ));
        }
        Ok(Self {
            frame,
            half_extents,
        })
    }
}

impl GateVolume for BoxVolume {
    fn closest_point(&self, point: Vec3) -> Vec3 {
        let local = self.frame.inverse().transform_point(point);
        let clamped = local.clamp(-self.half_extents, self.half_extents);
        self.frame.transform_point(clamped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectGateParams {
    /// Consecutive hits needed before poses are forwarded.
    pub threshold: u32,
    /// Meters of slack around the volume.
    pub tolerance: f32,
}

impl Default for IntersectGateParams {
    fn default() -> Self {
        Self {
            threshold: 3,
            tolerance: 0.0,
        }
    }
}

impl IntersectGateParams {
    pub fn validate(&self) -> PsResult<()> {
        if self.threshold == 0 {
            return Err(PoseStreamError::invalid_config(NAME, "threshold must be >= 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("tolerance must be a finite value >= 0, got {}", self.tolerance),
            ));
        }
        Ok(())
    }
}

pub struct IntersectGateFilter {
    params: IntersectGateParams,
    volume: Option<Box<dyn GateVolume>>,
    hits: u32,
}

impl IntersectGateFilter {
    pub fn new(params: IntersectGateParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            volume: None,
            hits: 0,
        })
    }

    pub fn with_volume(mut self, volume: impl GateVolume + 'static) -> Self {
        self.volume = Some(Box::new(volume));
        self
    }

    pub fn set_volume(&mut self, volume: Option<Box<dyn GateVolume>>) {
        self.volume = volume;
    }

    pub fn params(&self) -> &IntersectGateParams {
        &self.params
    }

    /// Current run of consecutive hits, saturated at the threshold.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn is_armed(&self) -> bool {
        self.hits >= self.params.threshold
    }

    /// Without a volume every pose counts as inside.
    pub fn is_inside(&self, pose: &Pose) -> bool {
        match &self.volume {
            None => true,
            Some(volume) => volume.distance(pose.position) <= self.params.tolerance,
        }
    }
}

/// Reads `threshold`, `tolerance` and an optional sphere volume given by
/// `sphere_radius` and `sphere_x`, `sphere_y`, `sphere_z`.
impl FromConfig for IntersectGateFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let Some(config) = config else {
            return Self::new(IntersectGateParams::default());
        };
        let defaults = IntersectGateParams::default();
        let params = IntersectGateParams {
            threshold: config.get_or("threshold", defaults.threshold)?,
            tolerance: config.get_or("tolerance", defaults.tolerance)?,
        };
        let mut filter = Self::new(params)?;
        if let Some(radius) = config.get::<f32>("sphere_radius")? {
            let center = Vec3::new(
                config.get_or("sphere_x", 0.0f32)?,
                config.get_or("sphere_y", 0.0f32)?,
                config.get_or("sphere_z", 0.0f32)?,
            );
            filter = filter.with_volume(SphereVolume::new(center, radius)?);
        }
        Ok(filter)
    }
}

impl PoseFilter for IntersectGateFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!(
            "intersect_gate: open, threshold {} tolerance {}",
            self.params.threshold, self.params.tolerance
        );
        self.hits = 0;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        if self.is_inside(&pose) {
            self.hits = (self.hits + 1).min(self.params.threshold);
        } else {
            if self.is_armed() {
                debug!("intersect_gate: left the volume, disarmed");
            }
            self.hits = 0;
        }
        if self.is_armed() {
            out.push(pose);
        } else {
            trace!("intersect_gate: holding, {} hits", self.hits);
        }
        Ok(())
    }
}
