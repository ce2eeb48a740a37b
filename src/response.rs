//! Response messages published back to clients
//!
//! Every response for a public key goes to `<root>/<public>/<response>` with
//! QoS 0 and no retain flag; responses are feedback, not state.

use crate::config::TopicConfig;
use crate::mqtt::response_topic;
use crate::throttle::RateStatus;
use crate::transport::OutboundMessage;
use serde::Serialize;

pub const MISSING_PRIVATE_KEY: &str = "Missing private key";
pub const INVALID_KEYS: &str = "Invalid keys";
pub const STREAM_CLEARED: &str = "Stream cleared";
pub const NO_DATA_SENT: &str = "No data sent";
pub const DATA_NOT_AN_OBJECT: &str = "Data must be a JSON object";
pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";
pub const SERVICE_UNAVAILABLE: &str = "Service unavailable";
pub const SUCCESS: &str = "Success";

/// Outcome of one dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    pub success: bool,
    pub message: String,
    /// Present once a rate check has happened
    pub rate: Option<RateStatus>,
}

impl ResponseOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            rate: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            rate: None,
        }
    }

    pub fn with_rate(mut self, rate: RateStatus) -> Self {
        self.rate = Some(rate);
        self
    }
}

/// Wire form of a response
#[derive(Debug, Serialize)]
struct ResponseBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_reset: Option<u64>,
}

impl<'a> From<&'a ResponseOutcome> for ResponseBody<'a> {
    fn from(outcome: &'a ResponseOutcome) -> Self {
        Self {
            success: outcome.success,
            message: &outcome.message,
            rate_used: outcome.rate.as_ref().map(|r| r.used),
            rate_limit: outcome.rate.as_ref().map(|r| r.limit),
            rate_reset: outcome.rate.as_ref().map(|r| r.reset),
        }
    }
}

/// Builds outbound response messages
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    root: String,
    subtopic: String,
}

impl ResponseFormatter {
    pub fn new(topics: &TopicConfig) -> Self {
        Self {
            root: topics.root.clone(),
            subtopic: topics.response.clone(),
        }
    }

    pub fn format(&self, public_key: &str, outcome: &ResponseOutcome) -> OutboundMessage {
        let body = ResponseBody::from(outcome);

        OutboundMessage {
            topic: response_topic(&self.root, public_key, &self.subtopic),
            // A struct of bools, strings and integers always serializes
            payload: serde_json::to_vec(&body).unwrap_or_default(),
            qos: 0,
            retain: false,
        }
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new(&TopicConfig::default())
    }
}
