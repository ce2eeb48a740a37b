//! Transport seam between the dispatcher and whatever carries MQTT messages
//!
//! The embedded [`Broker`](crate::broker::Broker) is one implementation;
//! tests and embedding applications supply their own.

use tracing::debug;

/// A message a client published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A message to publish back through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
}

/// Outbound half of the transport
pub trait Transport: Send + Sync {
    /// Fire-and-forget publish
    fn publish(&self, message: OutboundMessage);
}

/// Transport that drops everything it is given
#[derive(Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn publish(&self, message: OutboundMessage) {
        debug!(topic = %message.topic, "No transport configured, dropping response");
    }
}
