//! Centred moving average over a window of `2 * radius + 1` poses.
//!
//! Output starts once the window is full, with a backfill of narrower
//! centred windows so the first emitted pose sits on the first received one.
//! In live mode the trailing half window is flushed on close, so a session
//! emits exactly as many poses as it received.
//!
//! Rotations are averaged by slerping from the first rotation of the window
//! towards each following one with a weight of `1 / len`. The result depends
//! on the order of the samples and is close to, but not, a spherical mean.

use glam::{Quat, Vec3};
use log::{debug, trace};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "moving_average";
pub const MAX_RADIUS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverageParams {
    /// Samples on each side of the centre. 0 disables smoothing.
    pub radius: usize,
    /// Flush the trailing window on close. When false the latest pose is
    /// emitted once, unfiltered, instead.
    pub live: bool,
}

impl Default for MovingAverageParams {
    fn default() -> Self {
        Self {
            radius: 2,
            live: true,
        }
    }
}

impl MovingAverageParams {
    pub fn validate(&self) -> PsResult<()> {
        if self.radius > MAX_RADIUS {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("radius must be at most {MAX_RADIUS}, got {}", self.radius),
            ));
        }
        Ok(())
    }

    pub fn window_width(&self) -> usize {
        2 * self.radius + 1
    }
}

/// Average of `poses`, see the crate docs for the rotation part.
pub fn average<'a>(poses: impl IntoIterator<Item = &'a Pose>) -> Option<Pose> {
    let poses: Vec<&Pose> = poses.into_iter().collect();
    let first = poses.first()?;
    let weight = 1.0 / poses.len() as f32;

    let position = poses.iter().map(|p| p.position).sum::<Vec3>() * weight;
    let rotation = poses
        .iter()
        .skip(1)
        .fold(first.rotation, |acc: Quat, p| acc.slerp(p.rotation, weight))
        .normalize();
    Some(Pose::new(position, rotation))
}

#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    params: MovingAverageParams,
    window: RingBuffer<Pose>,
    filled: bool,
}

impl MovingAverageFilter {
    pub fn new(params: MovingAverageParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            window: RingBuffer::new(params.window_width())?,
            filled: false,
        })
    }

    pub fn with_radius(radius: usize) -> PsResult<Self> {
        Self::new(MovingAverageParams {
            radius,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &MovingAverageParams {
        &self.params
    }

    /// Changes the radius, dropping whatever the window holds.
    pub fn set_radius(&mut self, radius: usize) -> PsResult<()> {
        let params = MovingAverageParams {
            radius,
            ..self.params
        };
        params.validate()?;
        self.window.reset(params.window_width())?;
        self.params = params;
        self.filled = false;
        Ok(())
    }

    pub fn set_live(&mut self, live: bool) {
        self.params.live = live;
    }

    fn average_range(&self, start: usize, end: usize) -> Option<Pose> {
        average((start..end).filter_map(|i| self.window.get(i)))
    }

    fn push(&mut self, pose: Pose, out: &mut Vec<Pose>) {
        self.window.add(pose);
        if !self.window.is_full() {
            return;
        }
        if !self.filled {
            self.filled = true;
            let width = self.window.capacity();
            trace!("moving_average: window full, backfilling {}", self.params.radius + 1);
            out.extend((1..=width).step_by(2).filter_map(|end| self.average_range(0, end)));
        } else {
            out.extend(self.average_range(0, self.window.capacity()));
        }
    }

    /// Centred windows truncated at both ends of a session shorter than the window.
    fn flush_partial(&self, out: &mut Vec<Pose>) {
        let count = self.window.len();
        for centre in 0..count {
            let half = centre.min(count - 1 - centre).min(self.params.radius);
            out.extend(self.average_range(centre - half, centre + half + 1));
        }
    }
}

impl FromConfig for MovingAverageFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let mut params = MovingAverageParams::default();
        if let Some(config) = config {
            params.radius = config.get_or("radius", params.radius)?;
            params.live = config.get_or("live", params.live)?;
        }
        Self::new(params)
    }
}

impl PoseFilter for MovingAverageFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!(
            "moving_average: open, radius {} live {}",
            self.params.radius, self.params.live
        );
        self.window.clear();
        self.filled = false;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        if self.params.radius == 0 {
            out.push(pose);
            return Ok(());
        }
        self.push(pose, out);
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        if self.params.radius == 0 {
            return Ok(());
        }
        let Some(latest) = self.window.last().copied() else {
            return Ok(());
        };
        if !self.params.live {
            debug!("moving_average: close, emitting latest pose");
            out.push(latest);
        } else if self.filled {
            debug!("moving_average: close, replaying latest pose {} times", self.params.radius);
            for _ in 0..self.params.radius {
                self.push(latest, out);
            }
        } else {
            debug!(
                "moving_average: close before the window filled, {} poses",
                self.window.len()
            );
            self.flush_partial(out);
        }
        Ok(())
    }
}
