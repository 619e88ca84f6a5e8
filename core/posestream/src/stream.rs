//! The Open/Send*/Close stream protocol.
//!
//! A stream session is `open`, zero or more `receive`, then `close`.
//! Sinks consume sessions, a [`Multicast`] drives any number of sinks in
//! registration order, and a [`FilterNode`] is both: it consumes upstream
//! through its [`PoseFilter`] and re-emits downstream through its own multicast.

use crate::error::PsResult;
use crate::pose::Pose;
use crate::session::{CloseAction, OpenAction, Session, SessionPolicy, SessionState};
use log::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;

/// Consumer side of a stream session.
pub trait PoseSink {
    fn open(&mut self) -> PsResult<()>;

    fn receive(&mut self, pose: Pose) -> PsResult<()>;

    fn close(&mut self) -> PsResult<()>;

    /// Ends the current session without flushing, e.g. when the producer is
    /// torn down abruptly. The next `open` starts from a clean state.
    fn abort(&mut self) {}
}

impl<S: PoseSink + ?Sized> PoseSink for Box<S> {
    fn open(&mut self) -> PsResult<()> {
        (**self).open()
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        (**self).receive(pose)
    }

    fn close(&mut self) -> PsResult<()> {
        (**self).close()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

/// Shared handle so the caller can keep inspecting a sink wired into a chain.
impl<S: PoseSink + ?Sized> PoseSink for Rc<RefCell<S>> {
    fn open(&mut self) -> PsResult<()> {
        self.borrow_mut().open()
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        self.borrow_mut().receive(pose)
    }

    fn close(&mut self) -> PsResult<()> {
        self.borrow_mut().close()
    }

    fn abort(&mut self) {
        self.borrow_mut().abort()
    }
}

/// A stateful transform between two sessions.
///
/// The filter only sees well-formed sessions: protocol enforcement lives in
/// [`FilterNode`]. Emitted poses are pushed into `out` in order.
pub trait PoseFilter {
    /// Short name used in logs and protocol errors.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Called for every new session: drop any state from the previous one.
    fn open(&mut self) -> PsResult<()>;

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()>;

    /// Called once at the end of a session to flush whatever is still buffered.
    fn close(&mut self, _out: &mut Vec<Pose>) -> PsResult<()> {
        Ok(())
    }
}

impl<F: PoseFilter + ?Sized> PoseFilter for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> PsResult<()> {
        (**self).open()
    }

    fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
        (**self).receive(pose, out)
    }

    fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
        (**self).close(out)
    }
}

/// Producer side of a stream: fans every call out to its subscribers.
///
/// Subscribers are driven in registration order. A failing subscriber does
/// not starve its later siblings; the first error is reported once all of
/// them have been called.
#[derive(Default)]
pub struct Multicast {
    sinks: Vec<Box<dyn PoseSink>>,
}

impl Multicast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: impl PoseSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn deliver(&mut self, mut call: impl FnMut(&mut dyn PoseSink) -> PsResult<()>) -> PsResult<()> {
        let mut first_error = None;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = call(sink.as_mut()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn open(&mut self) -> PsResult<()> {
        self.deliver(|sink| sink.open())
    }

    pub fn send(&mut self, pose: Pose) -> PsResult<()> {
        self.deliver(|sink| sink.receive(pose))
    }

    pub fn close(&mut self) -> PsResult<()> {
        self.deliver(|sink| sink.close())
    }

    pub fn abort(&mut self) {
        for sink in self.sinks.iter_mut() {
            sink.abort();
        }
    }
}

/// A multicast is itself a sink: a pure fan-out point with no filter.
impl PoseSink for Multicast {
    fn open(&mut self) -> PsResult<()> {
        Multicast::open(self)
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        self.send(pose)
    }

    fn close(&mut self) -> PsResult<()> {
        Multicast::close(self)
    }

    fn abort(&mut self) {
        Multicast::abort(self)
    }
}

/// Binds a [`PoseFilter`] into a chain: guards the session protocol, resets
/// the filter on open, flushes it on close and forwards everything it emits.
pub struct FilterNode<F: PoseFilter> {
    filter: F,
    session: Session,
    downstream: Multicast,
    outbox: Vec<Pose>,
    received: u64,
    emitted: u64,
}

impl<F: PoseFilter> FilterNode<F> {
    pub fn new(filter: F) -> Self {
        let session = Session::new(filter.name(), SessionPolicy::default());
        Self {
            filter,
            session,
            downstream: Multicast::new(),
            outbox: Vec::new(),
            received: 0,
            emitted: 0,
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.session.set_policy(policy);
        self
    }

    pub fn with_sink(mut self, sink: impl PoseSink + 'static) -> Self {
        self.downstream.subscribe(sink);
        self
    }

    pub fn subscribe(&mut self, sink: impl PoseSink + 'static) {
        self.downstream.subscribe(sink);
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut F {
        &mut self.filter
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Samples received in the current (or last) session.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Samples emitted in the current (or last) session.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn forward(&mut self) -> PsResult<()> {
        let Self {
            outbox,
            downstream,
            emitted,
            ..
        } = self;
        let mut result = Ok(());
        for pose in outbox.drain(..) {
            *emitted += 1;
            if let Err(e) = downstream.send(pose) {
                result = result.and(Err(e));
            }
        }
        result
    }

    fn start(&mut self) -> PsResult<()> {
        self.received = 0;
        self.emitted = 0;
        self.outbox.clear();
        self.filter.open()?;
        self.downstream.open()
    }
}

impl<F: PoseFilter> PoseSink for FilterNode<F> {
    fn open(&mut self) -> PsResult<()> {
        // a strict double open is reported after the restart, not instead of it
        let (action, violation) = match self.session.open() {
            Ok(action) => (action, None),
            Err(e) => (OpenAction::Restart, Some(e)),
        };
        if action == OpenAction::Restart {
            debug!("{}: restarting, dropping the running session", self.filter.name());
            self.downstream.abort();
        }
        debug!("{}: open", self.filter.name());
        self.start()?;
        violation.map_or(Ok(()), Err)
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        if !self.session.admit_receive()? {
            return Ok(());
        }
        self.received += 1;
        self.outbox.clear();
        self.filter.receive(pose, &mut self.outbox)?;
        trace!(
            "{}: sample {} produced {} pose(s)",
            self.filter.name(),
            self.received,
            self.outbox.len()
        );
        self.forward()
    }

    fn close(&mut self) -> PsResult<()> {
        match self.session.close()? {
            CloseAction::Flush => {
                self.outbox.clear();
                self.filter.close(&mut self.outbox)?;
                let flushed = self.outbox.len();
                let forwarded = self.forward();
                debug!(
                    "{}: close, {} received, {} emitted ({} on flush)",
                    self.filter.name(),
                    self.received,
                    self.emitted,
                    flushed
                );
                let closed = self.downstream.close();
                forwarded.and(closed)
            }
            CloseAction::Ignore => Ok(()),
        }
    }

    fn abort(&mut self) {
        if self.session.abort() {
            debug!("{}: aborted", self.filter.name());
            self.outbox.clear();
            self.downstream.abort();
        }
    }
}

/// Builds a linear chain of filters ending in one or more sinks.
///
/// ```
/// use posestream::prelude::*;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// struct Identity;
/// impl PoseFilter for Identity {
///     fn open(&mut self) -> PsResult<()> { Ok(()) }
///     fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
///         out.push(pose);
///         Ok(())
///     }
/// }
///
/// let collector = Rc::new(RefCell::new(PoseCollector::new()));
/// let mut chain = Pipeline::new().filter(Identity).into_sink(collector.clone());
/// chain.open().unwrap();
/// chain.receive(Pose::IDENTITY).unwrap();
/// chain.close().unwrap();
/// assert_eq!(collector.borrow().len(), 1);
/// ```
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn PoseFilter>>,
    policy: SessionPolicy,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn filter(mut self, filter: impl PoseFilter + 'static) -> Self {
        self.stages.push(Box::new(filter));
        self
    }

    pub fn boxed_filter(mut self, filter: Box<dyn PoseFilter>) -> Self {
        self.stages.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn into_sink(self, sink: impl PoseSink + 'static) -> Box<dyn PoseSink> {
        self.wire(Box::new(sink))
    }

    /// Ends the chain on several sibling sinks, driven in the given order.
    pub fn fan_out(self, sinks: Vec<Box<dyn PoseSink>>) -> Box<dyn PoseSink> {
        let mut multicast = Multicast::new();
        for sink in sinks {
            multicast.subscribe(sink);
        }
        self.wire(Box::new(multicast))
    }

    fn wire(self, terminal: Box<dyn PoseSink>) -> Box<dyn PoseSink> {
        let policy = self.policy;
        self.stages
            .into_iter()
            .rev()
            .fold(terminal, |downstream, stage| -> Box<dyn PoseSink> {
                Box::new(
                    FilterNode::new(stage)
                        .with_policy(policy)
                        .with_sink(downstream),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PoseStreamError, ProtocolViolation};
    use crate::pose_at;
    use crate::sinks::PoseCollector;

    /// Emits every other sample and the last odd one on close.
    #[derive(Default)]
    struct Decimate {
        pending: Option<Pose>,
        opened: usize,
    }

    impl PoseFilter for Decimate {
        fn name(&self) -> &str {
            "decimate"
        }

        fn open(&mut self) -> PsResult<()> {
            self.pending = None;
            self.opened += 1;
            Ok(())
        }

        fn receive(&mut self, pose: Pose, out: &mut Vec<Pose>) -> PsResult<()> {
            match self.pending.take() {
                Some(_) => out.push(pose),
                None => self.pending = Some(pose),
            }
            Ok(())
        }

        fn close(&mut self, out: &mut Vec<Pose>) -> PsResult<()> {
            out.extend(self.pending.take());
            Ok(())
        }
    }

    fn collector() -> Rc<RefCell<PoseCollector>> {
        Rc::new(RefCell::new(PoseCollector::new()))
    }

    #[test]
    fn test_filter_node_flushes_on_close() {
        let out = collector();
        let mut node = FilterNode::new(Decimate::default()).with_sink(out.clone());
        node.open().unwrap();
        for i in 0..5 {
            node.receive(pose_at!(i as f32, 0.0, 0.0)).unwrap();
        }
        assert_eq!(out.borrow().len(), 2);
        node.close().unwrap();
        let out = out.borrow();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].position.x, 4.0);
        assert_eq!(out.opens(), 1);
        assert_eq!(out.closes(), 1);
        assert_eq!(node.received(), 5);
        assert_eq!(node.emitted(), 3);
    }

    #[test]
    fn test_receive_after_close_is_rejected() {
        let mut node = FilterNode::new(Decimate::default()).with_sink(collector());
        node.open().unwrap();
        node.close().unwrap();
        let err = node.receive(Pose::IDENTITY).unwrap_err();
        assert_eq!(
            err,
            PoseStreamError::protocol("decimate", ProtocolViolation::ReceiveAfterClose)
        );
    }

    #[test]
    fn test_reopen_resets_filter_state() {
        let out = collector();
        let mut node = FilterNode::new(Decimate::default()).with_sink(out.clone());
        node.open().unwrap();
        node.receive(pose_at!(1.0, 0.0, 0.0)).unwrap();
        node.abort();
        node.open().unwrap();
        node.receive(pose_at!(2.0, 0.0, 0.0)).unwrap();
        node.close().unwrap();
        let out = out.borrow();
        // the pending sample of the aborted session is gone
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].position.x, 2.0);
        assert_eq!(node.filter().opened, 2);
    }

    #[test]
    fn test_strict_double_open_reports_and_restarts() {
        let out = collector();
        let mut node = FilterNode::new(Decimate::default()).with_sink(out.clone());
        node.open().unwrap();
        node.receive(pose_at!(1.0, 0.0, 0.0)).unwrap();
        let err = node.open().unwrap_err();
        assert_eq!(
            err,
            PoseStreamError::protocol("decimate", ProtocolViolation::DoubleOpen)
        );
        // one open is enough to get a usable stage back
        assert_eq!(node.session_state(), SessionState::Open);
        node.receive(pose_at!(2.0, 0.0, 0.0)).unwrap();
        node.receive(pose_at!(3.0, 0.0, 0.0)).unwrap();
        node.close().unwrap();

        assert_eq!(node.filter().opened, 2);
        let out = out.borrow();
        // the sample held back by the first session is dropped with it
        assert_eq!(out.positions(), vec![glam::Vec3::new(3.0, 0.0, 0.0)]);
        assert_eq!(out.opens(), 2);
        assert_eq!(out.aborts(), 1);
        assert_eq!(out.closes(), 1);
        assert!(!out.is_open());
    }

    /// Refuses every sample but still follows the session calls.
    #[derive(Default)]
    struct Refusing {
        opens: usize,
        closes: usize,
    }

    impl PoseSink for Refusing {
        fn open(&mut self) -> PsResult<()> {
            self.opens += 1;
            Ok(())
        }

        fn receive(&mut self, _pose: Pose) -> PsResult<()> {
            Err(PoseStreamError::protocol("refusing", ProtocolViolation::ReceiveAfterClose))
        }

        fn close(&mut self) -> PsResult<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_close_reaches_downstream_when_flush_fails() {
        let refusing = Rc::new(RefCell::new(Refusing::default()));
        let mut node = FilterNode::new(Decimate::default()).with_sink(refusing.clone());
        node.open().unwrap();
        node.receive(pose_at!(1.0, 0.0, 0.0)).unwrap();
        let err = node.close().unwrap_err();
        assert_eq!(
            err,
            PoseStreamError::protocol("refusing", ProtocolViolation::ReceiveAfterClose)
        );
        assert_eq!(refusing.borrow().opens, 1);
        assert_eq!(refusing.borrow().closes, 1);
        assert_eq!(node.session_state(), SessionState::Closed);
    }

    #[test]
    fn test_lenient_double_open_restarts() {
        let out = collector();
        let mut node = FilterNode::new(Decimate::default())
            .with_policy(SessionPolicy::Lenient)
            .with_sink(out.clone());
        node.receive(Pose::IDENTITY).unwrap();
        node.open().unwrap();
        node.receive(pose_at!(1.0, 0.0, 0.0)).unwrap();
        node.open().unwrap();
        node.close().unwrap();
        node.close().unwrap();
        let out = out.borrow();
        assert!(out.is_empty());
        assert_eq!(out.opens(), 2);
        assert_eq!(out.closes(), 1);
        assert_eq!(out.aborts(), 1);
    }

    #[test]
    fn test_multicast_preserves_order_per_sink() {
        let first = collector();
        let second = collector();
        let mut source = Multicast::new();
        source.subscribe(first.clone());
        source.subscribe(second.clone());
        source.open().unwrap();
        for i in 0..3 {
            source.send(pose_at!(0.0, i as f32, 0.0)).unwrap();
        }
        source.close().unwrap();
        assert_eq!(first.borrow().poses(), second.borrow().poses());
        assert_eq!(first.borrow()[2].position.y, 2.0);
    }

    #[test]
    fn test_multicast_reports_first_error_but_reaches_all_sinks() {
        let healthy = collector();
        let mut closed_node = FilterNode::new(Decimate::default());
        closed_node.open().unwrap();
        closed_node.close().unwrap();

        let mut source = Multicast::new();
        source.subscribe(closed_node);
        source.subscribe(healthy.clone());
        healthy.borrow_mut().open().unwrap();
        assert!(source.send(Pose::IDENTITY).is_err());
        assert_eq!(healthy.borrow().len(), 1);
    }

    #[test]
    fn test_pipeline_chains_in_order() {
        let out = collector();
        let mut chain = Pipeline::new()
            .filter(Decimate::default())
            .filter(Decimate::default())
            .into_sink(out.clone());
        chain.open().unwrap();
        for i in 0..8 {
            chain.receive(pose_at!(i as f32, 0.0, 0.0)).unwrap();
        }
        chain.close().unwrap();
        let xs: Vec<f32> = out.borrow().poses().iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![3.0, 7.0]);
    }

    #[test]
    fn test_pipeline_fan_out() {
        let left = collector();
        let right = collector();
        let mut chain = Pipeline::new().fan_out(vec![
            Box::new(left.clone()) as Box<dyn PoseSink>,
            Box::new(right.clone()),
        ]);
        chain.open().unwrap();
        chain.receive(Pose::IDENTITY).unwrap();
        chain.close().unwrap();
        assert_eq!(left.borrow().len(), 1);
        assert_eq!(right.borrow().len(), 1);
    }
}
