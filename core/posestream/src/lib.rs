//! Streaming filter pipeline for rigid-body pose samples.
//!
//! A tracking source produces one [`Pose`] per tick; a chain of stateful
//! filters smooths, resamples, simplifies, gates or re-expresses those poses
//! before they reach a renderer or a motion driver. Every link of the chain
//! speaks the same session protocol: `open`, any number of `receive`, `close`.
//!
//! This crate holds the pieces every filter shares: the pose algebra, the
//! sliding [`RingBuffer`], the stream protocol ([`PoseSink`], [`PoseFilter`],
//! [`Multicast`], [`FilterNode`], [`Pipeline`]), the per-tick [`TickDriver`]
//! and the component configuration. The filters themselves live in the
//! `ps-*` component crates.

pub mod config;
pub mod driver;
pub mod error;
pub mod pose;
pub mod ringbuffer;
pub mod session;
pub mod sinks;
pub mod stream;
pub mod test_utils;
pub mod units;

pub use config::{ComponentConfig, FromConfig, FromValue, Value};
pub use driver::{PoseTracker, TickDriver, TickOutcome};
pub use error::{PoseStreamError, ProtocolViolation, PsResult};
pub use pose::Pose;
pub use ringbuffer::RingBuffer;
pub use session::{Session, SessionPolicy, SessionState};
pub use sinks::{PointBuffer, PoseCollector};
pub use stream::{FilterNode, Multicast, Pipeline, PoseFilter, PoseSink};

pub mod prelude {
    pub use crate::config::{ComponentConfig, FromConfig};
    pub use crate::driver::{PoseTracker, TickDriver, TickOutcome};
    pub use crate::error::{PoseStreamError, ProtocolViolation, PsResult};
    pub use crate::pose::{
        angle_between, look_rotation, project_on_plane, rotation_angle, signed_angle, Pose,
    };
    pub use crate::ringbuffer::RingBuffer;
    pub use crate::session::SessionPolicy;
    pub use crate::sinks::{PointBuffer, PoseCollector};
    pub use crate::stream::{FilterNode, Multicast, Pipeline, PoseFilter, PoseSink};
    pub use crate::units::{degrees_to_radians, meters_to_centimeters, radians_to_degrees};
    pub use glam::{Quat, Vec3};
}
