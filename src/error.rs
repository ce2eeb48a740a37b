//! Error types

use thiserror::Error;

/// Unparseable payload, raised through the `error` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid JSON
    #[error("invalid JSON payload: {message}")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

/// A collaborator (throttle, validator) could not produce an answer.
#[derive(Error, Debug, Clone)]
#[error("{service} unavailable: {reason}")]
pub struct ServiceError {
    pub service: &'static str,
    pub reason: String,
}

impl ServiceError {
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self {
            service,
            reason: reason.into(),
        }
    }
}

/// MQTT wire codec failure
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("MQTT codec error: {0}")]
    Codec(#[from] mqttrs::Error),

    #[error("malformed remaining length")]
    MalformedLength,

    #[error("packet of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("incomplete MQTT packet")]
    Incomplete,
}
