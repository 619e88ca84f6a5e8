//! Skip-simplify: drops poses that add little to the shape of a path.
//!
//! The filter holds back candidate poses and asks a [`SkipPolicy`] about each
//! new one. The policy can keep skipping, throw the pose away as noise, or
//! emit a pose, usually the last one held back rather than the new one.
//! On close the most recent held back pose is emitted so the path keeps its end.

mod path;

pub use path::{PathSimplifyParams, PathSimplifyPolicy};

use log::{debug, trace};
use posestream::prelude::*;

/// What to do with a candidate pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipDecision {
    /// Hold the candidate back; it may be emitted later.
    Skip,
    /// Forget the candidate.
    Discard,
    /// Emit `output` and restart from it. With `retain_candidate` the
    /// candidate is held back as the first pose after the emitted one.
    Emit {
        output: Pose,
        retain_candidate: bool,
    },
}

pub trait SkipPolicy {
    /// `skipped` holds the poses held back since `last_emitted`, oldest first.
    fn decide(&mut self, candidate: &Pose, last_emitted: Option<&Pose>, skipped: &[Pose])
        -> SkipDecision;

    /// Called on every open.
    fn reset(&mut self) {}
}

pub struct SkipSimplifyFilter<P: SkipPolicy> {
    policy: P,
    skipped: Vec<Pose>,
    last_emitted: Option<Pose>,
    discarded: u64,
}

pub type PathSimplifyFilter = SkipSimplifyFilter<PathSimplifyPolicy>;

impl<P: SkipPolicy> SkipSimplifyFilter<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            skipped: Vec::new(),
            last_emitted: None,
            discarded: 0,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn pending(&self) -> &[Pose] {
        &self.skipped
    }

    pub fn last_emitted(&self) -> Option<&Pose> {
        self.last_emitted.as_ref()
    }

    fn emit(&mut self, pose: Pose, out: &mut Vec<Pose>) {
        out.push(pose);
        self.last_emitted = Some(pose);
        self.skipped.clear();
    }
}

impl FromConfig for PathSimplifyFilter {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self> {
        Ok(Self::new(PathSimplifyPolicy::from_config(config)?))
    }
}

impl<P: SkipPolicy> PoseFilter for SkipSimplifyFilter<P> {
    fn name(&self) -> &str {
        "skip_simplify"
    }

    fn open(&mut self) -> PsResult<()> {
        debug!("skip_simplify: open");
        self.policy.reset();
        self.skipped.clear();
        self.last_emitted = None;
        self.discarded = 0;
        Ok(())
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        let decision = self
            .policy
            .decide(&pose, self.last_emitted.as_ref(), &self.skipped);
        match decision {
            SkipDecision::Skip => self.skipped.push(pose),
            SkipDecision::Discard => {
                trace!("skip_simplify: discarded {}", pose.position);
                self.discarded += 1;
            }
            SkipDecision::Emit {
                output,
                retain_candidate,
            } => {
                trace!(
                    "skip_simplify: emitting {} after {} skipped",
                    output.position,
                    self.skipped.len()
                );
                self.emit(output, out);
                if retain_candidate {
                    self.skipped.push(pose);
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        debug!(
            "skip_simplify: close, {} pending, {} discarded",
            self.skipped.len(),
            self.discarded
        );
        if let Some(last) = self.skipped.last().copied() {
            self.emit(last, out);
        }
        Ok(())
    }
}
