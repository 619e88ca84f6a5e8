//! Deadzone filter: forwards only the poses lying outside a sphere around
//! the origin of their frame.
//!
//! Typically placed after a delta stage, so the origin is the reference and
//! the small jitter of a tracker at rest never leaves the filter.

use log::{debug, trace};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "deadzone";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeadzoneParams {
    /// Meters. A pose at exactly this distance is suppressed.
    pub radius: f32,
}

impl Default for DeadzoneParams {
    fn default() -> Self {
        Self { radius: 0.02 }
    }
}

impl DeadzoneParams {
    pub fn validate(&self) -> PsResult<()> {
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("radius must be a finite value >= 0, got {}", self.radius),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeadzoneFilter {
    radius_squared: f32,
    params: DeadzoneParams,
    suppressed: u64,
}

impl DeadzoneFilter {
    pub fn new(params: DeadzoneParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self {
            radius_squared: params.radius * params.radius,
            params,
            suppressed: 0,
        })
    }

    pub fn with_radius(radius: f32) -> PsResult<Self> {
        Self::new(DeadzoneParams { radius })
    }

    pub fn params(&self) -> &DeadzoneParams {
        &self.params
    }

    /// Poses dropped in the current session.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn is_outside(&self, pose: &Pose) -> bool {
        pose.position.length_squared() > self.radius_squared
    }
}

impl FromConfig for DeadzoneFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let mut params = DeadzoneParams::default();
        if let Some(config) = config {
            params.radius = config.get_or("radius", params.radius)?;
        }
        Self::new(params)
    }
}

impl PoseFilter for DeadzoneFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!("deadzone: open, radius {}", self.params.radius);
        self.suppressed = 0;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        if self.is_outside(&pose) {
            out.push(pose);
        } else {
            trace!("deadzone: suppressed pose at {}", pose.position);
            self.suppressed += 1;
        }
        Ok(())
    }

    fn close(&mut self, _out: &mut Vec<Pose>) -> PsResult<()> {
        debug!("deadzone: close, {} poses suppressed", self.suppressed);
        Ok(())
    }
}
