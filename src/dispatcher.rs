//! Stream command dispatcher
//!
//! Turns published MQTT messages into stream commands and runs each one
//! through its gates, cheapest first:
//!
//! 1. topic grammar (unrecognized topics are ignored)
//! 2. payload decode (unparseable JSON goes to the `error` event)
//! 3. public key present (otherwise dropped, there is nowhere to answer)
//! 4. private key present
//! 5. key pair valid
//! 6. `clear` ends here
//! 7. payload is a non-empty JSON object
//! 8. throttle
//! 9. field validation
//!
//! Every command that gets past step 3 produces exactly one response.

use crate::config::{GeneralConfig, MqttInputConfig, TopicConfig};
use crate::error::DecodeError;
use crate::events::EventListeners;
use crate::keychain::{HmacKeychain, KeyAuthority, OpenKeychain, StreamIdentity};
use crate::mqtt::{Action, CommandTopic};
use crate::response::{
    ResponseFormatter, ResponseOutcome, DATA_NOT_AN_OBJECT, INVALID_KEYS, MISSING_PRIVATE_KEY,
    NO_DATA_SENT, RATE_LIMIT_EXCEEDED, SERVICE_UNAVAILABLE, STREAM_CLEARED, SUCCESS,
};
use crate::throttle::{RateStatus, Throttle, Unthrottled, WindowThrottle};
use crate::transport::{InboundMessage, NullTransport, Transport};
use crate::validation::{
    AcceptAllFields, FieldCheck, FieldValidator, StreamFieldValidator, TIMESTAMP_FIELD,
};
use crate::DataRecord;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A decoded stream command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub public_key: String,
    /// `None` when the topic had no private key level or it was empty
    pub private_key: Option<String>,
    pub payload: Payload,
}

/// A parsed command payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Nothing sent, or a falsy JSON value (`null`, `false`, `0`, `""`)
    Empty,
    /// Field/value mapping with `timestamp` already set
    Record(DataRecord),
    /// Any other JSON value; acceptable for `clear`, rejected for `write`
    NotARecord { kind: &'static str },
}

/// What decoding an inbound message produced
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Not a stream command
    Ignored,
    /// Recognized command whose payload could not be decoded
    Failed(DecodeError),
    Command(Command),
}

/// Current instant as an ISO-8601 UTC string with milliseconds
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Decode a payload; only unparseable JSON is an error
fn decode_payload(payload: &[u8]) -> Result<Payload, DecodeError> {
    if payload.is_empty() {
        return Ok(Payload::Empty);
    }

    Ok(match serde_json::from_slice::<Value>(payload)? {
        Value::Object(mut record) => {
            record.insert(TIMESTAMP_FIELD.to_string(), Value::String(timestamp_now()));
            Payload::Record(record)
        }
        value if is_falsy(&value) => Payload::Empty,
        other => Payload::NotARecord {
            kind: json_kind(&other),
        },
    })
}

/// Stream command dispatcher
pub struct Dispatcher {
    topics: TopicConfig,
    general: GeneralConfig,
    formatter: ResponseFormatter,
    transport: Arc<dyn Transport>,
    keychain: Arc<dyn KeyAuthority>,
    validator: Arc<dyn FieldValidator>,
    throttle: Arc<dyn Throttle>,
    listeners: EventListeners,
}

impl Dispatcher {
    /// Start building a dispatcher with permissive collaborators
    pub fn builder(config: MqttInputConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Build a dispatcher whose collaborators come from configuration
    pub fn from_config(config: MqttInputConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let keychain: Arc<dyn KeyAuthority> = match HmacKeychain::from_config(&config.keychain)? {
            Some(keychain) => Arc::new(keychain),
            None => {
                warn!("No keychain secret configured, accepting every non-empty key pair");
                Arc::new(OpenKeychain)
            }
        };

        let throttle: Arc<dyn Throttle> = if config.throttle.enabled {
            Arc::new(WindowThrottle::new(&config.throttle))
        } else {
            Arc::new(Unthrottled)
        };

        let validator: Arc<dyn FieldValidator> = if config.validation.enabled {
            let validator = StreamFieldValidator::new(&config.validation)?;
            info!(streams = validator.stream_count(), "Field validation enabled");
            Arc::new(validator)
        } else {
            Arc::new(AcceptAllFields)
        };

        Ok(Self::builder(config)
            .transport(transport)
            .keychain(keychain)
            .throttle(throttle)
            .validator(validator)
            .build())
    }

    /// Event listener registry
    pub fn events(&self) -> &EventListeners {
        &self.listeners
    }

    /// Whether `topic` lies under the command root
    ///
    /// Topics under the root may carry private keys and are never relayed.
    pub fn owns_topic(&self, topic: &str) -> bool {
        topic.split('/').next() == Some(self.topics.root.as_str())
    }

    /// Decode an inbound message into a command
    pub fn decode(&self, msg: &InboundMessage) -> Decoded {
        let Some(topic) = CommandTopic::parse(&self.topics.root, &msg.topic) else {
            return Decoded::Ignored;
        };

        let payload = match decode_payload(&msg.payload) {
            Ok(payload) => payload,
            Err(err) => return Decoded::Failed(err),
        };

        Decoded::Command(Command {
            action: topic.action,
            public_key: topic.public_key.to_string(),
            private_key: topic
                .private_key
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            payload,
        })
    }

    /// Handle one published message
    ///
    /// Results surface only as events and published responses.
    pub async fn handle(&self, msg: InboundMessage) {
        if self.general.log_packets {
            debug!(topic = %msg.topic, size = msg.payload.len(), "Inbound message");
        }

        let command = match self.decode(&msg) {
            Decoded::Ignored => return,
            Decoded::Failed(err) => {
                warn!(topic = %msg.topic, error = %err, "Failed to decode payload");
                self.listeners.emit_error(&err);
                return;
            }
            Decoded::Command(command) => command,
        };

        if command.public_key.is_empty() {
            debug!(topic = %msg.topic, "Command without public key, dropping");
            return;
        }

        let public_key = command.public_key.clone();
        let outcome = self.dispatch(command).await;

        if !outcome.success {
            info!(public_key = %public_key, reason = %outcome.message, "Command rejected");
        }

        self.transport.publish(self.formatter.format(&public_key, &outcome));
    }

    /// Gates from private key presence onward
    async fn dispatch(&self, command: Command) -> ResponseOutcome {
        let Some(private_key) = command.private_key.as_deref() else {
            return ResponseOutcome::failure(MISSING_PRIVATE_KEY);
        };

        let Some(identity) = self.authorize(&command.public_key, private_key) else {
            return ResponseOutcome::failure(INVALID_KEYS);
        };

        match command.action {
            Action::Clear => {
                debug!(identity = %identity, "Clearing stream");
                self.listeners.emit_clear(&identity);
                ResponseOutcome::success(STREAM_CLEARED)
            }
            Action::Write => match command.payload {
                Payload::Record(record) => self.write(&command.public_key, identity, record).await,
                Payload::Empty => ResponseOutcome::failure(NO_DATA_SENT),
                Payload::NotARecord { kind } => {
                    debug!(identity = %identity, kind, "Write payload is not an object");
                    ResponseOutcome::failure(DATA_NOT_AN_OBJECT)
                }
            },
        }
    }

    fn authorize(&self, public_key: &str, private_key: &str) -> Option<StreamIdentity> {
        if !self.keychain.validate(public_key, private_key) {
            debug!(
                public_key = %public_key,
                keychain = %self.keychain.name(),
                "Key pair rejected"
            );
            return None;
        }

        self.keychain.identity_from_private_key(private_key)
    }

    async fn write(
        &self,
        public_key: &str,
        identity: StreamIdentity,
        record: DataRecord,
    ) -> ResponseOutcome {
        let rate = match self.throttle.available(public_key).await {
            Ok(rate) => rate,
            Err(err) if self.general.fail_open => {
                warn!(public_key = %public_key, error = %err, "Throttle failed, permitting write");
                RateStatus::unmetered()
            }
            Err(err) => {
                warn!(public_key = %public_key, error = %err, "Throttle failed, rejecting write");
                return ResponseOutcome::failure(SERVICE_UNAVAILABLE);
            }
        };

        if !rate.permitted {
            return ResponseOutcome::failure(RATE_LIMIT_EXCEEDED).with_rate(rate);
        }

        let check = match self.validator.fields(&identity, &record).await {
            Ok(check) => check,
            Err(err) if self.general.fail_open => {
                warn!(identity = %identity, error = %err, "Validator failed, accepting record");
                FieldCheck::valid()
            }
            Err(err) => {
                warn!(identity = %identity, error = %err, "Validator failed, rejecting record");
                return ResponseOutcome::failure(SERVICE_UNAVAILABLE).with_rate(rate);
            }
        };

        if !check.valid {
            let message = check.error.unwrap_or_else(|| "Invalid data".to_string());
            return ResponseOutcome::failure(message).with_rate(rate);
        }

        debug!(identity = %identity, "Record accepted");
        self.listeners.emit_data(&identity, record);
        ResponseOutcome::success(SUCCESS).with_rate(rate)
    }
}

/// Builder wiring collaborators into a [`Dispatcher`]
pub struct DispatcherBuilder {
    config: MqttInputConfig,
    transport: Arc<dyn Transport>,
    keychain: Arc<dyn KeyAuthority>,
    validator: Arc<dyn FieldValidator>,
    throttle: Arc<dyn Throttle>,
}

impl DispatcherBuilder {
    fn new(config: MqttInputConfig) -> Self {
        Self {
            config,
            transport: Arc::new(NullTransport),
            keychain: Arc::new(OpenKeychain),
            validator: Arc::new(AcceptAllFields),
            throttle: Arc::new(Unthrottled),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn keychain(mut self, keychain: Arc<dyn KeyAuthority>) -> Self {
        self.keychain = keychain;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            formatter: ResponseFormatter::new(&self.config.topics),
            topics: self.config.topics,
            general: self.config.general,
            transport: self.transport,
            keychain: self.keychain,
            validator: self.validator,
            throttle: self.throttle,
            listeners: EventListeners::new(),
        }
    }
}
