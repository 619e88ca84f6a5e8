//! Guard enforcing the Open/Send*/Close contract for one stage.

use crate::error::{PoseStreamError, ProtocolViolation, PsResult};
use log::warn;
use serde::{Deserialize, Serialize};

/// How a stage reacts to a caller breaking the session contract.
///
/// A double open is always an implicit reset of the running session, whatever
/// the policy: the stage restarts and the new session is live.
///
/// - `Strict` (default) returns a `ProtocolViolation` error for every breach,
///   including the double open it already recovered from.
/// - `Lenient` logs a warning instead; stray receives and closes are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPolicy {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Closed,
}

/// What the owner of the guard must do after an accepted open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Reset the stage and open downstream.
    Start,
    /// Downstream still has a live session: abort it first, then start.
    Restart,
}

/// What the owner of the guard must do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Flush buffered samples, then close downstream.
    Flush,
    /// Nothing was open (lenient only).
    Ignore,
}

#[derive(Debug, Clone)]
pub struct Session {
    stage: String,
    policy: SessionPolicy,
    state: SessionState,
    opened: u64,
}

impl Session {
    pub fn new(stage: &str, policy: SessionPolicy) -> Self {
        Self {
            stage: stage.to_string(),
            policy,
            state: SessionState::Idle,
            opened: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SessionPolicy) {
        self.policy = policy;
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Number of sessions started so far, including implicit restarts.
    pub fn sessions_opened(&self) -> u64 {
        self.opened
    }

    fn violation(&self, violation: ProtocolViolation) -> PoseStreamError {
        PoseStreamError::protocol(&self.stage, violation)
    }

    /// Starts a session. The only error is a strict double open, after which
    /// the new session is open all the same and the owner must restart.
    pub fn open(&mut self) -> PsResult<OpenAction> {
        match self.state {
            SessionState::Idle | SessionState::Closed => {
                self.state = SessionState::Open;
                self.opened += 1;
                Ok(OpenAction::Start)
            }
            SessionState::Open => match self.policy {
                SessionPolicy::Strict => {
                    self.opened += 1;
                    Err(self.violation(ProtocolViolation::DoubleOpen))
                }
                SessionPolicy::Lenient => {
                    warn!(
                        "{}: open while a session is running, restarting the session",
                        self.stage
                    );
                    self.opened += 1;
                    Ok(OpenAction::Restart)
                }
            },
        }
    }

    /// Returns `Ok(false)` when a lenient stage should silently drop the sample.
    pub fn admit_receive(&mut self) -> PsResult<bool> {
        let violation = match self.state {
            SessionState::Open => return Ok(true),
            SessionState::Idle => ProtocolViolation::ReceiveBeforeOpen,
            SessionState::Closed => ProtocolViolation::ReceiveAfterClose,
        };
        match self.policy {
            SessionPolicy::Strict => Err(self.violation(violation)),
            SessionPolicy::Lenient => {
                warn!("{}: {violation}, sample dropped", self.stage);
                Ok(false)
            }
        }
    }

    pub fn close(&mut self) -> PsResult<CloseAction> {
        match self.state {
            SessionState::Open => {
                self.state = SessionState::Closed;
                Ok(CloseAction::Flush)
            }
            SessionState::Idle | SessionState::Closed => match self.policy {
                SessionPolicy::Strict => Err(self.violation(ProtocolViolation::CloseWithoutOpen)),
                SessionPolicy::Lenient => {
                    warn!("{}: close without a matching open, ignored", self.stage);
                    Ok(CloseAction::Ignore)
                }
            },
        }
    }

    /// Drops the running session without a close. Returns true if one was live.
    pub fn abort(&mut self) -> bool {
        let was_live = self.state == SessionState::Open;
        self.state = SessionState::Idle;
        was_live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_session() {
        let mut session = Session::new("stage", SessionPolicy::Strict);
        assert_eq!(session.open().unwrap(), OpenAction::Start);
        assert!(session.admit_receive().unwrap());
        assert_eq!(session.close().unwrap(), CloseAction::Flush);
        assert_eq!(session.state(), SessionState::Closed);
        // sessions can follow each other
        assert_eq!(session.open().unwrap(), OpenAction::Start);
        assert_eq!(session.sessions_opened(), 2);
    }

    #[test]
    fn test_strict_violations() {
        let mut session = Session::new("stage", SessionPolicy::Strict);
        assert!(session.admit_receive().unwrap_err().is_protocol_violation());
        assert!(session.close().is_err());

        session.open().unwrap();
        session.close().unwrap();
        let err = session.admit_receive().unwrap_err();
        assert_eq!(
            err,
            PoseStreamError::protocol("stage", ProtocolViolation::ReceiveAfterClose)
        );
    }

    #[test]
    fn test_strict_double_open_reports_and_restarts() {
        let mut session = Session::new("stage", SessionPolicy::Strict);
        session.open().unwrap();
        assert_eq!(
            session.open().unwrap_err(),
            PoseStreamError::protocol("stage", ProtocolViolation::DoubleOpen)
        );
        // the second open still started a session
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.sessions_opened(), 2);
        assert!(session.admit_receive().unwrap());
        assert_eq!(session.close().unwrap(), CloseAction::Flush);
    }

    #[test]
    fn test_lenient_recovers() {
        let mut session = Session::new("stage", SessionPolicy::Lenient);
        assert!(!session.admit_receive().unwrap());
        assert_eq!(session.close().unwrap(), CloseAction::Ignore);
        session.open().unwrap();
        assert_eq!(session.open().unwrap(), OpenAction::Restart);
        assert!(session.is_open());
    }

    #[test]
    fn test_abort() {
        let mut session = Session::new("stage", SessionPolicy::Strict);
        assert!(!session.abort());
        session.open().unwrap();
        assert!(session.abort());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.open().unwrap(), OpenAction::Start);
    }
}
