//! Terminal sinks collecting the output of a chain.

use crate::error::PsResult;
use crate::pose::Pose;
use crate::ringbuffer::RingBuffer;
use crate::session::{OpenAction, Session, SessionPolicy};
use crate::stream::PoseSink;
use glam::Vec3;
use std::ops::Index;

/// Keeps every pose it receives, across sessions, in arrival order.
#[derive(Debug, Clone)]
pub struct PoseCollector {
    poses: Vec<Pose>,
    session: Session,
    opens: usize,
    closes: usize,
    aborts: usize,
}

impl Default for PoseCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseCollector {
    pub fn new() -> Self {
        Self {
            poses: Vec::new(),
            session: Session::new("collector", SessionPolicy::Strict),
            opens: 0,
            closes: 0,
            aborts: 0,
        }
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.poses.iter().map(|p| p.position).collect()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn first(&self) -> Option<&Pose> {
        self.poses.first()
    }

    pub fn last(&self) -> Option<&Pose> {
        self.poses.last()
    }

    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    pub fn aborts(&self) -> usize {
        self.aborts
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }
}

impl Index<usize> for PoseCollector {
    type Output = Pose;

    fn index(&self, index: usize) -> &Self::Output {
        &self.poses[index]
    }
}

impl PoseSink for PoseCollector {
    fn open(&mut self) -> PsResult<()> {
        let opened = self.session.open();
        if !matches!(opened, Ok(OpenAction::Start)) {
            // the running session was dropped without a close
            self.aborts += 1;
        }
        self.opens += 1;
        opened.map(|_| ())
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        if self.session.admit_receive()? {
            self.poses.push(pose);
        }
        Ok(())
    }

    fn close(&mut self) -> PsResult<()> {
        self.session.close()?;
        self.closes += 1;
        Ok(())
    }

    fn abort(&mut self) {
        if self.session.abort() {
            self.aborts += 1;
        }
    }
}

/// Fixed capacity trail of positions for line rendering.
///
/// Keeps the most recent `capacity` positions of the current session.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    points: RingBuffer<Vec3>,
    session: Session,
}

impl PointBuffer {
    pub fn new(capacity: usize) -> PsResult<Self> {
        Ok(Self {
            points: RingBuffer::new(capacity)?,
            session: Session::new("point_buffer", SessionPolicy::Strict),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }

    /// Oldest to newest.
    pub fn points(&self) -> Vec<Vec3> {
        self.points.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<Vec3> {
        self.points.last().copied()
    }
}

impl PoseSink for PointBuffer {
    fn open(&mut self) -> PsResult<()> {
        let opened = self.session.open();
        self.points.clear();
        opened.map(|_| ())
    }

    fn receive(&mut self, pose: Pose) -> PsResult<()> {
        if self.session.admit_receive()? {
            self.points.add(pose.position);
        }
        Ok(())
    }

    fn close(&mut self) -> PsResult<()> {
        self.session.close()?;
        Ok(())
    }

    fn abort(&mut self) {
        self.session.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_at;

    #[test]
    fn test_collector_counts_sessions() {
        let mut collector = PoseCollector::new();
        for session in 0..2 {
            collector.open().unwrap();
            collector.receive(pose_at!(session as f32, 0.0, 0.0)).unwrap();
            collector.close().unwrap();
        }
        assert_eq!(collector.opens(), 2);
        assert_eq!(collector.closes(), 2);
        assert_eq!(collector.len(), 2);
        assert_eq!(collector[1].position.x, 1.0);
    }

    #[test]
    fn test_collector_enforces_protocol() {
        let mut collector = PoseCollector::new();
        assert!(collector.receive(Pose::IDENTITY).is_err());
        collector.open().unwrap();
        collector.receive(Pose::IDENTITY).unwrap();
        assert!(collector.open().is_err());
        // the second open restarted the session
        assert!(collector.is_open());
        collector.receive(Pose::IDENTITY).unwrap();
        collector.close().unwrap();
        assert_eq!(collector.opens(), 2);
        assert_eq!(collector.aborts(), 1);
        assert_eq!(collector.closes(), 1);
    }

    #[test]
    fn test_point_buffer_keeps_latest() {
        let mut buffer = PointBuffer::new(3).unwrap();
        buffer.open().unwrap();
        for i in 0..5 {
            buffer.receive(pose_at!(i as f32, 0.0, 0.0)).unwrap();
        }
        buffer.close().unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.points()[0], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(buffer.latest(), Some(Vec3::new(4.0, 0.0, 0.0)));

        buffer.open().unwrap();
        assert!(buffer.is_empty());
    }
}
