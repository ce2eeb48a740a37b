//! Key authority module
//!
//! Validates public/private key pairs and resolves the stream a private key
//! belongs to.

mod signed;

pub use signed::HmacKeychain;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical handle for a stream, independent of its keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamIdentity(String);

impl StreamIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Key authority trait
pub trait KeyAuthority: Send + Sync {
    /// Whether `private_key` grants write/clear authority over `public_key`
    fn validate(&self, public_key: &str, private_key: &str) -> bool;

    /// Stream a private key belongs to, if it names one
    fn identity_from_private_key(&self, private_key: &str) -> Option<StreamIdentity>;

    /// Authority name for logging
    fn name(&self) -> &str;
}

/// Authority that accepts every non-empty key pair
///
/// The private key doubles as the stream identity.
#[derive(Debug, Default)]
pub struct OpenKeychain;

impl KeyAuthority for OpenKeychain {
    fn validate(&self, public_key: &str, private_key: &str) -> bool {
        !public_key.is_empty() && !private_key.is_empty()
    }

    fn identity_from_private_key(&self, private_key: &str) -> Option<StreamIdentity> {
        (!private_key.is_empty()).then(|| StreamIdentity::from(private_key))
    }

    fn name(&self) -> &str {
        "open"
    }
}
