//! Configuration types for the MQTT stream input
//!
//! Provides JSON-serializable configuration for the topic grammar, the
//! embedded broker, the keychain, throttling, field validation and general
//! failure policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// MQTT Stream Input Configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct MqttInputConfig {
    /// Command topic grammar
    pub topics: TopicConfig,

    /// Embedded broker settings
    pub broker: BrokerConfig,

    /// Public/private key authority
    pub keychain: KeychainConfig,

    /// Per-public-key write throttling
    pub throttle: ThrottleConfig,

    /// Stream field validation
    pub validation: ValidationConfig,

    /// General settings
    pub general: GeneralConfig,
}

// ============================================================================
// Topic Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TopicConfig {
    /// First topic level of every stream command (`<root>/<public>/<action>`)
    pub root: String,

    /// Level appended under `<root>/<public>/` for responses
    pub response: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            response: default_response_subtopic(),
        }
    }
}

// ============================================================================
// Broker Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrokerConfig {
    /// Address to bind
    pub bind: String,

    /// TCP port to listen on
    pub port: u16,

    /// Largest accepted MQTT packet (bytes, fixed header included)
    pub max_packet_size: usize,

    /// Inbound PUBLISH packets allowed per connection per second (0 = unlimited)
    pub max_messages_per_second: u32,

    /// Burst allowance for the per-connection limit
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: default_port(),
            max_packet_size: default_max_packet_size(),
            max_messages_per_second: 0,
            burst: default_burst(),
        }
    }
}

// ============================================================================
// Keychain Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KeychainConfig {
    /// HMAC secret used to sign private keys. Without a secret every
    /// non-empty key pair is accepted.
    pub secret: Option<String>,

    /// Number of HMAC bytes embedded in a private key
    pub tag_bytes: usize,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            secret: None,
            tag_bytes: default_tag_bytes(),
        }
    }
}

// ============================================================================
// Throttle Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThrottleConfig {
    /// Enable throttling (disabled = every write permitted)
    pub enabled: bool,

    /// Writes allowed per public key in one window
    pub limit: u64,

    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: default_throttle_limit(),
            window_secs: default_window_secs(),
        }
    }
}

// ============================================================================
// Validation Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct ValidationConfig {
    /// Enable field validation (disabled = every record accepted)
    pub enabled: bool,

    /// Declared streams, keyed by stream identity
    #[serde(default)]
    pub streams: HashMap<String, StreamSchemaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamSchemaConfig {
    /// Field names a record must carry (empty = any field set)
    pub fields: Vec<String>,

    /// Inline JSON schema applied after the field check, to the record as
    /// sent (without the injected `timestamp`)
    pub json_schema: Option<serde_json::Value>,

    /// JSON schema loaded from a file
    pub json_schema_file: Option<PathBuf>,
}

// ============================================================================
// General Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeneralConfig {
    /// Proceed when the throttle or validator fails (true) or reject the
    /// write with "Service unavailable" (false)
    pub fail_open: bool,

    /// Log every inbound packet (verbose)
    pub log_packets: bool,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_root() -> String {
    "input".to_string()
}

fn default_response_subtopic() -> String {
    "response".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_max_packet_size() -> usize {
    256 * 1024 // 256KB
}

fn default_burst() -> u32 {
    10
}

fn default_tag_bytes() -> usize {
    10
}

fn default_throttle_limit() -> u64 {
    100
}

fn default_window_secs() -> u64 {
    15 * 60
}
