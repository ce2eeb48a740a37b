//! MQTT input for data streams
//!
//! Clients publish stream commands over MQTT and get a JSON response on a
//! per-stream response topic:
//!
//! - **Write**: `input/<public key>/write/<private key>` (or `.../input/...`)
//!   with a JSON object payload
//! - **Clear**: `input/<public key>/clear/<private key>`
//! - **Response**: `input/<public key>/response`
//!
//! Each command passes key validation, then (for writes) throttling and
//! field validation. Accepted writes and clears are emitted as events for
//! the embedding application to persist.
//!
//! # Architecture
//!
//! [`Dispatcher`] owns the pipeline and depends only on the
//! [`Transport`](transport::Transport), [`KeyAuthority`](keychain::KeyAuthority),
//! [`Throttle`](throttle::Throttle) and [`FieldValidator`](validation::FieldValidator)
//! traits. [`Broker`](broker::Broker) is a small embedded MQTT listener
//! implementing the transport.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "broker": { "port": 1883 },
//!   "keychain": { "secret": "change-me" },
//!   "throttle": { "enabled": true, "limit": 100, "window-secs": 900 },
//!   "validation": {
//!     "enabled": true,
//!     "streams": { "weather": { "fields": ["temp", "humidity"] } }
//!   }
//! }
//! ```

pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod keychain;
pub mod mqtt;
pub mod response;
pub mod throttle;
pub mod transport;
pub mod validation;

/// A stream record: field name to value
pub type DataRecord = serde_json::Map<String, serde_json::Value>;

// Re-export main types
pub use config::MqttInputConfig;
pub use dispatcher::Dispatcher;
pub use events::InputEvent;
pub use keychain::StreamIdentity;
