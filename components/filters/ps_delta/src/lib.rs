//! Delta filter: re-expresses every pose in the local frame of a reference.
//!
//! The reference is read on every receive, so it may move while a session is
//! running (a tracked head, a moving platform). Only position and rotation are
//! considered; any scale carried by the reference's owner is ignored.

use glam::{Quat, Vec3};
use log::{debug, trace};
use posestream::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

const NAME: &str = "delta";

/// Where the current reference pose comes from.
pub trait ReferenceFrame {
    fn current(&mut self) -> Pose;
}

/// A fixed reference.
impl ReferenceFrame for Pose {
    fn current(&mut self) -> Pose {
        *self
    }
}

/// A reference updated by the host between ticks.
impl ReferenceFrame for Rc<Cell<Pose>> {
    fn current(&mut self) -> Pose {
        self.get()
    }
}

/// A reference computed on demand by a closure.
pub struct ReferenceFn<F>(pub F);

impl<F: FnMut() -> Pose> ReferenceFrame for ReferenceFn<F> {
    fn current(&mut self) -> Pose {
        (self.0)()
    }
}

pub struct DeltaFilter<R: ReferenceFrame> {
    reference: R,
}

impl<R: ReferenceFrame> DeltaFilter<R> {
    pub fn new(reference: R) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn reference_mut(&mut self) -> &mut R {
        &mut self.reference
    }

    /// `inverse(reference) ∘ pose` for the reference as it is right now.
    pub fn relative(&mut self, pose: &Pose) -> Pose {
        self.reference.current().inverse().compose(pose)
    }
}

/// Static reference read from `x`, `y`, `z` (meters) and `yaw_degrees`
/// (about +Y). Every key is optional and defaults to the identity.
impl FromConfig for DeltaFilter<Pose> {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let Some(config) = config else {
            return Ok(Self::new(Pose::IDENTITY));
        };
        let position = Vec3::new(
            config.get_or("x", 0.0f32)?,
            config.get_or("y", 0.0f32)?,
            config.get_or("z", 0.0f32)?,
        );
        let yaw = degrees_to_radians(config.get_or("yaw_degrees", 0.0f32)?);
        if !position.is_finite() || !yaw.is_finite() {
            return Err(PoseStreamError::invalid_config(
                NAME,
                "reference pose must be finite",
            ));
        }
        let rotation = Quat::from_rotation_y(yaw);
        Ok(Self::new(Pose::new(position, rotation)))
    }
}

impl<R: ReferenceFrame> PoseFilter for DeltaFilter<R> {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!("delta: open");
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        let relative = self.relative(&pose);
        trace!("delta: {} -> {}", pose.position, relative.position);
        out.push(relative);
        Ok(())
    }
}
