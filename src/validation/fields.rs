//! Declared field sets per stream

use super::{FieldCheck, FieldValidator, SchemaValidator, TIMESTAMP_FIELD};
use crate::config::{StreamSchemaConfig, ValidationConfig};
use crate::error::ServiceError;
use crate::keychain::StreamIdentity;
use crate::DataRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// One declared stream
struct StreamSchema {
    fields: Vec<String>,
    schema: Option<SchemaValidator>,
}

impl StreamSchema {
    fn from_config(config: &StreamSchemaConfig) -> Result<Self> {
        let schema = match (&config.json_schema, &config.json_schema_file) {
            (Some(inline), _) => Some(SchemaValidator::from_value(inline)?),
            (None, Some(path)) => Some(SchemaValidator::from_file(path)?),
            (None, None) => None,
        };

        Ok(Self {
            fields: config.fields.clone(),
            schema,
        })
    }

    fn expected(&self) -> String {
        self.fields.join(", ")
    }

    fn check(&self, record: &DataRecord) -> FieldCheck {
        if !self.fields.is_empty() {
            let unknown = record
                .keys()
                .filter(|key| key.as_str() != TIMESTAMP_FIELD)
                .find(|key| !self.fields.contains(key));
            if let Some(key) = unknown {
                return FieldCheck::invalid(format!(
                    "{key} is not a valid field for this stream. expected: {}",
                    self.expected()
                ));
            }

            let missing = self
                .fields
                .iter()
                .filter(|field| field.as_str() != TIMESTAMP_FIELD)
                .find(|field| !record.contains_key(field.as_str()));
            if let Some(field) = missing {
                return FieldCheck::invalid(format!(
                    "{field} missing from sent data. expected: {}",
                    self.expected()
                ));
            }
        }

        if let Some(ref schema) = self.schema {
            let mut sent = record.clone();
            sent.remove(TIMESTAMP_FIELD);
            if let Err(errors) = schema.validate(&Value::Object(sent)) {
                return FieldCheck::invalid(errors.join("; "));
            }
        }

        FieldCheck::valid()
    }
}

/// Validator backed by the streams declared in configuration
pub struct StreamFieldValidator {
    streams: HashMap<StreamIdentity, StreamSchema>,
}

impl StreamFieldValidator {
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        let mut streams = HashMap::with_capacity(config.streams.len());

        for (id, stream_config) in &config.streams {
            let schema = StreamSchema::from_config(stream_config)
                .with_context(|| format!("Invalid schema for stream '{id}'"))?;
            streams.insert(StreamIdentity::new(id.as_str()), schema);
        }

        Ok(Self { streams })
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

#[async_trait]
impl FieldValidator for StreamFieldValidator {
    async fn fields(
        &self,
        identity: &StreamIdentity,
        record: &DataRecord,
    ) -> Result<FieldCheck, ServiceError> {
        let Some(stream) = self.streams.get(identity) else {
            debug!(identity = %identity, "No schema declared for stream");
            return Ok(FieldCheck::invalid(format!("stream {identity} not found")));
        };

        Ok(stream.check(record))
    }
}
