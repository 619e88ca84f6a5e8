//! Building blocks of the `ps-trail` demo: a synthetic helix tracker and a
//! filter chain assembled from command line style options.

use glam::{Quat, Vec3};
use log::{debug, info};
use posestream::prelude::*;
use posestream::Value;
use ps_catmull_rom::CatmullRomResampleFilter;
use ps_deadzone::DeadzoneFilter;
use ps_delta::DeltaFilter;
use ps_intersect_gate::IntersectGateFilter;
use ps_moving_average::MovingAverageFilter;
use ps_ribbon_orientation::RibbonOrientationFilter;
use ps_skip_simplify::PathSimplifyFilter;
use std::collections::HashMap;

/// Stage names accepted by [`ChainOptions::overrides`], in chain order.
pub const STAGES: [&str; 7] = [
    "gate", "delta", "deadzone", "average", "simplify", "resample", "ribbon",
];

/// A tracker moving along a helix around +Y, facing along its path, with
/// periodic tracking loss.
#[derive(Debug, Clone)]
pub struct HelixTracker {
    pub radius: f32,
    /// Rise per full turn, meters.
    pub rise: f32,
    /// Angle travelled per tick, radians.
    pub step: f32,
    /// Ticks tracked before each gap. 0 means never lost.
    pub tracked_ticks: u64,
    pub gap_ticks: u64,
    tick: u64,
}

impl HelixTracker {
    pub fn new(radius: f32, rise: f32, step: f32) -> Self {
        Self {
            radius,
            rise,
            step,
            tracked_ticks: 0,
            gap_ticks: 0,
            tick: 0,
        }
    }

    pub fn with_gaps(mut self, tracked_ticks: u64, gap_ticks: u64) -> Self {
        self.tracked_ticks = tracked_ticks;
        self.gap_ticks = gap_ticks;
        self
    }

    pub fn pose_at(&self, tick: u64) -> Pose {
        let angle = tick as f32 * self.step;
        let height = self.rise * angle / std::f32::consts::TAU;
        let position = Vec3::new(self.radius * angle.cos(), height, self.radius * angle.sin());
        let tangent = Vec3::new(
            -self.radius * angle.sin(),
            self.rise / std::f32::consts::TAU,
            self.radius * angle.cos(),
        );
        let rotation = look_rotation(tangent, Vec3::Y).unwrap_or(Quat::IDENTITY);
        Pose::new(position, rotation)
    }

    fn is_tracking(&self, tick: u64) -> bool {
        if self.tracked_ticks == 0 || self.gap_ticks == 0 {
            return true;
        }
        tick % (self.tracked_ticks + self.gap_ticks) < self.tracked_ticks
    }
}

impl PoseTracker for HelixTracker {
    fn sample(&mut self) -> Option<Pose> {
        let tick = self.tick;
        self.tick += 1;
        self.is_tracking(tick).then(|| self.pose_at(tick))
    }
}

/// Which stages to chain and how. A stage is enabled by its flag or by an
/// entry in `overrides`; override keys win over the flag values.
#[derive(Debug, Clone, Default)]
pub struct ChainOptions {
    pub gate_radius: Option<f32>,
    pub relative: bool,
    pub deadzone: Option<f32>,
    pub average: Option<usize>,
    pub simplify: Option<f32>,
    pub resample: Option<f32>,
    pub ribbon: bool,
    pub lenient: bool,
    pub overrides: HashMap<String, ComponentConfig>,
}

impl ChainOptions {
    /// Parses one `stage=RON map` override, e.g. `average={"radius": 4}`.
    pub fn add_override(&mut self, text: &str) -> PsResult<()> {
        let (stage, ron) = text.split_once('=').ok_or_else(|| {
            PoseStreamError::ConfigParse(format!("expected stage=config, got '{text}'"))
        })?;
        let stage = stage.trim();
        if !STAGES.contains(&stage) {
            return Err(PoseStreamError::ConfigParse(format!(
                "unknown stage '{stage}', expected one of {}",
                STAGES.join(", ")
            )));
        }
        let config = ComponentConfig::from_ron(ron)?;
        self.overrides
            .entry(stage.to_string())
            .or_default()
            .0
            .extend(config.0);
        Ok(())
    }

    /// Flag value first, overrides on top. `None` when the stage is disabled.
    fn stage_config(&self, stage: &str, flag: Option<(&str, Value)>) -> Option<ComponentConfig> {
        let overrides = self.overrides.get(stage);
        if flag.is_none() && overrides.is_none() {
            return None;
        }
        let mut config = ComponentConfig::new();
        if let Some((key, value)) = flag {
            config.0.insert(key.to_string(), value);
        }
        if let Some(overrides) = overrides {
            config.0.extend(overrides.0.clone());
        }
        Some(config)
    }

    fn enabled(&self, enabled: bool, stage: &str) -> Option<ComponentConfig> {
        match (enabled, self.overrides.get(stage)) {
            (_, Some(config)) => Some(config.clone()),
            (true, None) => Some(ComponentConfig::new()),
            (false, None) => None,
        }
    }

    pub fn build(&self) -> PsResult<Pipeline> {
        let policy = if self.lenient {
            SessionPolicy::Lenient
        } else {
            SessionPolicy::Strict
        };
        let mut pipeline = Pipeline::new().with_policy(policy);

        let gate = self.stage_config("gate", self.gate_radius.map(|r| ("sphere_radius", r.into())));
        if let Some(config) = gate {
            debug!("gate {config}");
            pipeline = pipeline.filter(IntersectGateFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.enabled(self.relative, "delta") {
            debug!("delta {config}");
            pipeline = pipeline.filter(DeltaFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.stage_config("deadzone", self.deadzone.map(|r| ("radius", r.into()))) {
            debug!("deadzone {config}");
            pipeline = pipeline.filter(DeadzoneFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.stage_config("average", self.average.map(|r| ("radius", r.into()))) {
            debug!("average {config}");
            pipeline = pipeline.filter(MovingAverageFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.stage_config(
            "simplify",
            self.simplify.map(|d| ("max_skip_distance", d.into())),
        ) {
            debug!("simplify {config}");
            pipeline = pipeline.filter(PathSimplifyFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.stage_config(
            "resample",
            self.resample.map(|s| ("samples_per_unit", s.into())),
        ) {
            debug!("resample {config}");
            pipeline = pipeline.filter(CatmullRomResampleFilter::from_config(Some(&config))?);
        }
        if let Some(config) = self.enabled(self.ribbon, "ribbon") {
            debug!("ribbon {config}");
            pipeline = pipeline.filter(RibbonOrientationFilter::from_config(Some(&config))?);
        }
        info!("chain of {} stages", pipeline.len());
        Ok(pipeline)
    }
}
