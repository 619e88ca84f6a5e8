//! Catmull-Rom resampling: turns a sparse stream of poses into a dense curve,
//! for ribbon and trail rendering.
//!
//! The filter keeps the last four poses `a, b, c, d` and emits the segment
//! between `b` and `c` as soon as `d` arrives. The first segment of a session
//! is covered by an entry segment `(a, a, b, c)` and the last one by an exit
//! segment `(d, d, c, b)` flushed in reverse on close, so the first and last
//! received poses are always the first and last emitted samples.

mod spline;

pub use spline::{sample_pose, CatmullRomSegment};

use log::{debug, trace};
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "catmull_rom";
const WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatmullRomParams {
    /// Samples per meter of chord length.
    pub samples_per_unit: f32,
    /// Samples per 90 degrees of direction change.
    pub samples_per_90_degrees: f32,
    /// 0 uniform, 0.5 centripetal, 1 chordal.
    pub alpha: f32,
    /// Upper bound on a single segment, against a corrupt sample far away.
    /// The default sits well above any tracked chord at the default density.
    pub max_samples_per_segment: usize,
}

impl Default for CatmullRomParams {
    fn default() -> Self {
        Self {
            samples_per_unit: 100.0,
            samples_per_90_degrees: 8.0,
            alpha: 0.5,
            max_samples_per_segment: 10_000,
        }
    }
}

impl CatmullRomParams {
    pub fn validate(&self) -> PsResult<()> {
        let positive = |value: f32| value.is_finite() && value > 0.0;
        if !positive(self.samples_per_unit) {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("samples_per_unit must be > 0, got {}", self.samples_per_unit),
            ));
        }
        if !positive(self.samples_per_90_degrees) {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!(
                    "samples_per_90_degrees must be > 0, got {}",
                    self.samples_per_90_degrees
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!("alpha must be in [0, 1], got {}", self.alpha),
            ));
        }
        if self.max_samples_per_segment < 2 {
            return Err(PoseStreamError::invalid_config(
                NAME,
                "max_samples_per_segment must be >= 2",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CatmullRomResampleFilter {
    params: CatmullRomParams,
    window: RingBuffer<Pose>,
    received: usize,
}

impl CatmullRomResampleFilter {
    pub fn new(params: CatmullRomParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            window: RingBuffer::new(WINDOW)?,
            received: 0,
        })
    }

    pub fn params(&self) -> &CatmullRomParams {
        &self.params
    }

    /// Poses received in the current session.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of samples for the segment between `b` and `c`, at least 2.
    pub fn sample_count(&self, a: &Pose, b: &Pose, c: &Pose, d: &Pose) -> usize {
        let ab = b.position - a.position;
        let bc = c.position - b.position;
        let cd = d.position - c.position;
        let turn = radians_to_degrees(angle_between(ab, bc).max(angle_between(bc, cd)));

        let by_length = (bc.length() * self.params.samples_per_unit).ceil();
        let by_angle = (turn / 90.0 * self.params.samples_per_90_degrees).ceil();
        let count = by_length.max(by_angle).max(2.0);
        if count >= self.params.max_samples_per_segment as f32 {
            self.params.max_samples_per_segment
        } else {
            count as usize
        }
    }

    /// All `n + 1` samples from `b` to `c` inclusive.
    pub fn sample_segment(&self, a: &Pose, b: &Pose, c: &Pose, d: &Pose) -> Vec<Pose> {
        let count = self.sample_count(a, b, c, d);
        let segment = CatmullRomSegment::new(
            a.position,
            b.position,
            c.position,
            d.position,
            self.params.alpha,
        );
        (0..=count)
            .map(|i| sample_pose(&segment, b, c, i as f32 / count as f32))
            .collect()
    }

    /// Emits the segment without its final point, which starts the next one.
    fn emit_forward(&self, a: &Pose, b: &Pose, c: &Pose, d: &Pose, out: &mut Vec<Pose>) {
        let mut samples = self.sample_segment(a, b, c, d);
        samples.pop();
        trace!("catmull_rom: {} samples towards {}", samples.len(), c.position);
        out.extend(samples);
    }

    /// Emits an exit segment back to front, including both end points.
    fn emit_reversed(&self, a: &Pose, b: &Pose, c: &Pose, d: &Pose, out: &mut Vec<Pose>) {
        let samples = self.sample_segment(a, b, c, d);
        trace!("catmull_rom: {} closing samples", samples.len());
        out.extend(samples.into_iter().rev());
    }

    fn buffered(&self) -> Vec<Pose> {
        self.window.iter().copied().collect()
    }
}

impl FromConfig for CatmullRomResampleFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let mut params = CatmullRomParams::default();
        if let Some(config) = config {
            params.samples_per_unit = config.get_or("samples_per_unit", params.samples_per_unit)?;
            params.samples_per_90_degrees =
                config.get_or("samples_per_90_degrees", params.samples_per_90_degrees)?;
            params.alpha = config.get_or("alpha", params.alpha)?;
            params.max_samples_per_segment =
                config.get_or("max_samples_per_segment", params.max_samples_per_segment)?;
        }
        Self::new(params)
    }
}

impl PoseFilter for CatmullRomResampleFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!("catmull_rom: open, {:?}", self.params);
        self.window.clear();
        self.received = 0;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        self.window.add(pose);
        self.received += 1;
        if let [a, b, c, d] = self.buffered()[..] {
            if self.received == WINDOW {
                self.emit_forward(&a, &a, &b, &c, out);
            }
            self.emit_forward(&a, &b, &c, &d, out);
        }
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        debug!("catmull_rom: close after {} poses", self.received);
        match self.buffered()[..] {
            [] | [_] => {}
            [a, b] => out.extend([a, b]),
            [a, b, c] => {
                self.emit_forward(&a, &a, &b, &c, out);
                self.emit_reversed(&c, &c, &b, &a, out);
            }
            [_, b, c, d] => self.emit_reversed(&d, &d, &c, &b, out),
            _ => {}
        }
        Ok(())
    }
}
