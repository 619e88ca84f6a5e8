use std::fmt;
use thiserror::Error;

/// The ways a caller can break the Open/Send/Close session contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    ReceiveBeforeOpen,
    ReceiveAfterClose,
    DoubleOpen,
    CloseWithoutOpen,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProtocolViolation::ReceiveBeforeOpen => "receive before open",
            ProtocolViolation::ReceiveAfterClose => "receive after close",
            ProtocolViolation::DoubleOpen => "open while a session is already open",
            ProtocolViolation::CloseWithoutOpen => "close without a matching open",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseStreamError {
    #[error("Protocol violation in stage '{stage}': {violation}")]
    ProtocolViolation {
        stage: String,
        violation: ProtocolViolation,
    },

    #[error("Invalid configuration for '{component}': {reason}")]
    InvalidConfig { component: String, reason: String },

    #[error("Missing required config key '{key}' for '{component}'")]
    MissingConfig { component: String, key: String },

    #[error("Config key '{key}' should be {expected}, found {found}")]
    ConfigType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Could not parse configuration: {0}")]
    ConfigParse(String),
}

impl PoseStreamError {
    pub fn protocol(stage: &str, violation: ProtocolViolation) -> Self {
        PoseStreamError::ProtocolViolation {
            stage: stage.to_string(),
            violation,
        }
    }

    pub fn invalid_config(component: &str, reason: impl Into<String>) -> Self {
        PoseStreamError::InvalidConfig {
            component: component.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_config(component: &str, key: &str) -> Self {
        PoseStreamError::MissingConfig {
            component: component.to_string(),
            key: key.to_string(),
        }
    }

    /// True for errors raised by the session guard rather than by configuration.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, PoseStreamError::ProtocolViolation { .. })
    }
}

pub type PsResult<T> = Result<T, PoseStreamError>;
