//! Explicit per-tick driver between a tracking source and a chain.
//!
//! The host application calls [`TickDriver::tick`] once per logical tick. The
//! driver turns the tracker's availability into a well-formed session: open on
//! the first tracked tick, one send per tracked tick, close when tracking drops.

use crate::error::PsResult;
use crate::pose::Pose;
use crate::stream::{Multicast, PoseSink};
use log::debug;

/// The upstream collaborator producing one raw pose per tick.
pub trait PoseTracker {
    /// The pose for this tick, or `None` while tracking is not active.
    fn sample(&mut self) -> Option<Pose>;
}

impl<F: FnMut() -> Option<Pose>> PoseTracker for F {
    fn sample(&mut self) -> Option<Pose> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not tracking, nothing sent.
    Idle,
    /// Tracking started: the stream was opened and the first sample sent.
    Opened,
    Sent,
    /// Tracking stopped: the stream was closed.
    Closed,
}

pub struct TickDriver<T: PoseTracker> {
    tracker: T,
    output: Multicast,
    streaming: bool,
    ticks: u64,
    sent: u64,
}

impl<T: PoseTracker> TickDriver<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            output: Multicast::new(),
            streaming: false,
            ticks: 0,
            sent: 0,
        }
    }

    pub fn with_sink(mut self, sink: impl PoseSink + 'static) -> Self {
        self.output.subscribe(sink);
        self
    }

    pub fn subscribe(&mut self, sink: impl PoseSink + 'static) {
        self.output.subscribe(sink);
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Samples sent over the lifetime of the driver.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn tick(&mut self) -> PsResult<TickOutcome> {
        self.ticks += 1;
        match (self.tracker.sample(), self.streaming) {
            (Some(pose), false) => {
                debug!("tick {}: tracking acquired, opening stream", self.ticks);
                self.output.open()?;
                self.streaming = true;
                self.send(pose)?;
                Ok(TickOutcome::Opened)
            }
            (Some(pose), true) => {
                self.send(pose)?;
                Ok(TickOutcome::Sent)
            }
            (None, true) => {
                debug!("tick {}: tracking lost, closing stream", self.ticks);
                self.streaming = false;
                self.output.close()?;
                Ok(TickOutcome::Closed)
            }
            (None, false) => Ok(TickOutcome::Idle),
        }
    }

    /// Runs `ticks` ticks and returns the outcome of each.
    pub fn run(&mut self, ticks: usize) -> PsResult<Vec<TickOutcome>> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    /// Closes the running session, if any. Call when the tracker is torn down.
    pub fn shutdown(&mut self) -> PsResult<()> {
        if self.streaming {
            debug!("shutdown: closing stream after {} ticks", self.ticks);
            self.streaming = false;
            self.output.close()?;
        }
        Ok(())
    }

    /// Drops the running session without flushing downstream buffers.
    pub fn abort(&mut self) {
        if self.streaming {
            self.streaming = false;
            self.output.abort();
        }
    }

    fn send(&mut self, pose: Pose) -> PsResult<()> {
        self.sent += 1;
        self.output.send(pose)
    }
}
