//! JSON schema validation of stream records

use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Compiled JSON schema for one stream
#[derive(Clone)]
pub struct SchemaValidator {
    validator: Arc<JSONSchema>,
}

impl SchemaValidator {
    /// Load and compile a schema file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("cannot read schema {}", path.display()))?;
        let schema: Value = serde_json::from_slice(&raw)
            .with_context(|| format!("schema {} is not JSON", path.display()))?;

        Self::from_value(&schema)
    }

    /// Compile a schema value
    pub fn from_value(schema: &Value) -> Result<Self> {
        JSONSchema::compile(schema)
            .map(|validator| Self {
                validator: Arc::new(validator),
            })
            .map_err(|e| anyhow!("invalid JSON schema: {e}"))
    }

    /// Validate a record, returning every violation found
    pub fn validate(&self, record: &Value) -> Result<(), Vec<String>> {
        self.validator.validate(record).map_err(|errors| {
            errors
                .map(|e| match e.instance_path.to_string() {
                    path if path.is_empty() => e.to_string(),
                    path => format!("{e} at {path}"),
                })
                .collect()
        })
    }
}
