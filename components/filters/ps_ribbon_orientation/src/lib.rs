//! Ribbon orientation: derives a twist free orientation along a path, for
//! rendering ribbons and trails that do not corkscrew.
//!
//! The filter keeps the last three poses `a, b, c`. Each new pose orients `b`
//! halfway between `a` and the direction of `b -> c`, reached from `a` by a
//! pitch about its right axis followed by a yaw about its up axis. Roll is
//! never introduced by the propagation itself; it only comes from the
//! optional [`SurfaceAlignment`], which slowly rolls the ribbon towards the
//! up vector the tracker reported for `b`.

mod alignment;

pub use alignment::{ResponseCurve, SurfaceAlignment};

use glam::{Quat, Vec3};
use log::{debug, trace};
use posestream::pose::DEGENERATE_LENGTH_SQUARED;
use posestream::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "ribbon_orientation";
const WINDOW: usize = 3;

/// Rotates `rotation` so its forward axis points along `direction`, using a
/// pitch about the local right axis then a yaw about the new up axis.
///
/// Degenerate directions leave the rotation untouched.
pub fn rollless_towards(rotation: Quat, direction: Vec3) -> Quat {
    if direction.length_squared() < DEGENERATE_LENGTH_SQUARED {
        return rotation;
    }
    let right = rotation * Vec3::X;
    let forward = rotation * Vec3::Z;

    let mut pitched = rotation;
    let in_pitch_plane = project_on_plane(direction, right);
    if in_pitch_plane.length_squared() >= DEGENERATE_LENGTH_SQUARED {
        let pitch = signed_angle(forward, in_pitch_plane, right);
        pitched = (Quat::from_axis_angle(right.normalize(), pitch) * rotation).normalize();
    }

    let up = pitched * Vec3::Y;
    let yaw = signed_angle(pitched * Vec3::Z, direction, up);
    let result = (Quat::from_axis_angle(up.normalize(), yaw) * pitched).normalize();
    if result.is_finite() {
        result
    } else {
        rotation
    }
}

/// Pitch change in radians needed for `rotation` to follow `direction`.
fn pitch_change(rotation: Quat, direction: Vec3) -> f32 {
    let in_pitch_plane = project_on_plane(direction, rotation * Vec3::X);
    angle_between(rotation * Vec3::Z, in_pitch_plane)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RibbonOrientationParams {
    /// Below this angle between the up axis and the first segment, the first
    /// orientation is built from the forward axis instead.
    pub dorsal_threshold_degrees: f32,
    pub alignment: Option<SurfaceAlignment>,
}

impl Default for RibbonOrientationParams {
    fn default() -> Self {
        Self {
            dorsal_threshold_degrees: 10.0,
            alignment: None,
        }
    }
}

impl RibbonOrientationParams {
    pub fn validate(&self) -> PsResult<()> {
        if !(self.dorsal_threshold_degrees > 0.0 && self.dorsal_threshold_degrees < 90.0) {
            return Err(PoseStreamError::invalid_config(
                NAME,
                format!(
                    "dorsal_threshold_degrees must be in (0, 90), got {}",
                    self.dorsal_threshold_degrees
                ),
            ));
        }
        if let Some(alignment) = &self.alignment {
            alignment.validate(NAME)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RibbonOrientationFilter {
    params: RibbonOrientationParams,
    window: RingBuffer<Pose>,
    received: usize,
}

impl RibbonOrientationFilter {
    pub fn new(params: RibbonOrientationParams) -> PsResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            window: RingBuffer::new(WINDOW)?,
            received: 0,
        })
    }

    pub fn params(&self) -> &RibbonOrientationParams {
        &self.params
    }

    pub fn set_alignment(&mut self, alignment: Option<SurfaceAlignment>) -> PsResult<()> {
        if let Some(alignment) = &alignment {
            alignment.validate(NAME)?;
        }
        self.params.alignment = alignment;
        Ok(())
    }

    /// Orientation at `a` facing `b`, keeping the up axis of `a` when possible.
    pub fn initial_orientation(&self, a: &Pose, b: &Pose) -> Quat {
        let ab = b.position - a.position;
        let dorsal = a.up();
        let side = if radians_to_degrees(angle_between(dorsal, ab))
            < self.params.dorsal_threshold_degrees
        {
            // moving along the up axis, build from forward instead
            ab.cross(a.forward())
        } else {
            ab.cross(dorsal)
        };
        let up = side.cross(ab).normalize_or_zero();
        look_rotation(ab, up).unwrap_or(a.rotation)
    }

    /// Orientation for `b`: halfway from `a` to the roll-less orientation
    /// along `b -> c`, then rolled towards the up axis reported for `b`.
    pub fn midpoint_orientation(&self, a: &Pose, b: &Pose, c: &Pose) -> Quat {
        let ab = b.position - a.position;
        let bc = c.position - b.position;
        let along_bc = rollless_towards(rollless_towards(a.rotation, ab), bc);
        let midpoint = a.rotation.slerp(along_bc, 0.5).normalize();

        match &self.params.alignment {
            None => midpoint,
            Some(alignment) => alignment.correct(
                midpoint,
                b.up(),
                pitch_change(a.rotation, bc),
                ab.length(),
            ),
        }
    }

    fn buffered(&self) -> Vec<Pose> {
        self.window.iter().copied().collect()
    }
}

/// Reads `dorsal_threshold_degrees` and, when `align` is true, the surface
/// alignment keys `align_min_degrees`, `align_max_degrees`, `align_response`
/// (`linear`, `smoothstep` or `power`), `align_exponent`, `max_angle_per_cm`
/// and `pitch_suppression_degrees`.
impl FromConfig for RibbonOrientationFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        let mut params = RibbonOrientationParams::default();
        let Some(config) = config else {
            return Self::new(params);
        };
        params.dorsal_threshold_degrees =
            config.get_or("dorsal_threshold_degrees", params.dorsal_threshold_degrees)?;
        if config.get_or("align", false)? {
            let defaults = SurfaceAlignment::default();
            let response = match config.get::<String>("align_response")? {
                None => defaults.response,
                Some(name) => {
                    let exponent = config.get_or("align_exponent", 2.0f32)?;
                    ResponseCurve::parse(&name, exponent).ok_or_else(|| {
                        PoseStreamError::invalid_config(
                            NAME,
                            format!("unknown response curve '{name}'"),
                        )
                    })?
                }
            };
            params.alignment = Some(SurfaceAlignment {
                min_angle_degrees: config.get_or("align_min_degrees", defaults.min_angle_degrees)?,
                max_angle_degrees: config.get_or("align_max_degrees", defaults.max_angle_degrees)?,
                response,
                max_angle_per_cm: config.get_or("max_angle_per_cm", defaults.max_angle_per_cm)?,
                pitch_suppression_degrees: config
                    .get_or("pitch_suppression_degrees", defaults.pitch_suppression_degrees)?,
            });
        }
        Self::new(params)
    }
}

impl PoseFilter for RibbonOrientationFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn open(&mut self) -> PsResult<()> {
        debug!("ribbon_orientation: open, {:?}", self.params);
        self.window.clear();
        self.received = 0;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        self.window.add(pose);
        self.received += 1;
        match self.buffered()[..] {
            [a, b] => {
                let oriented = a.with_rotation(self.initial_orientation(&a, &b));
                if let Some(first) = self.window.get_mut(0) {
                    *first = oriented;
                }
                out.push(oriented);
            }
            [a, b, c] => {
                let rotation = self.midpoint_orientation(&a, &b, &c);
                trace!(
                    "ribbon_orientation: {} rotated by {:.4} rad",
                    b.position,
                    rotation_angle(b.rotation, rotation)
                );
                let oriented = b.with_rotation(rotation);
                if let Some(middle) = self.window.get_mut(1) {
                    *middle = oriented;
                }
                out.push(oriented);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        debug!("ribbon_orientation: close after {} poses", self.received);
        match self.buffered()[..] {
            [a] => out.push(a),
            [a, b] | [_, a, b] => {
                let rotation = rollless_towards(a.rotation, b.position - a.position);
                out.push(b.with_rotation(rotation));
            }
            _ => {}
        }
        Ok(())
    }
}
