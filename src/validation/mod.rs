//! Field validation module
//!
//! Checks a record against the fields its stream declares.

mod fields;
mod schema;

pub use fields::StreamFieldValidator;
pub use schema::SchemaValidator;

use crate::error::ServiceError;
use crate::keychain::StreamIdentity;
use crate::DataRecord;
use async_trait::async_trait;

/// Field injected by the input itself, never declared by a stream
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Validation verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub valid: bool,
    /// Human readable reason, sent verbatim to the client
    pub error: Option<String>,
}

impl FieldCheck {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Field validator trait
#[async_trait]
pub trait FieldValidator: Send + Sync {
    async fn fields(
        &self,
        identity: &StreamIdentity,
        record: &DataRecord,
    ) -> Result<FieldCheck, ServiceError>;
}

/// Validator that accepts every record
#[derive(Debug, Default)]
pub struct AcceptAllFields;

#[async_trait]
impl FieldValidator for AcceptAllFields {
    async fn fields(
        &self,
        _identity: &StreamIdentity,
        _record: &DataRecord,
    ) -> Result<FieldCheck, ServiceError> {
        Ok(FieldCheck::valid())
    }
}
