//! Write throttling module
//!
//! Decides per public key whether another write is currently permitted.

mod window;

pub use window::WindowThrottle;

use crate::error::ServiceError;
use async_trait::async_trait;

/// Result of a rate check, echoed back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateStatus {
    pub permitted: bool,
    /// Writes counted in the current window
    pub used: u64,
    /// Writes allowed per window
    pub limit: u64,
    /// Unix time (seconds) at which the window resets
    pub reset: u64,
}

impl RateStatus {
    /// Permitted with nothing counted
    pub fn unmetered() -> Self {
        Self {
            permitted: true,
            ..Default::default()
        }
    }
}

/// Throttle gate consulted before every write
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn available(&self, public_key: &str) -> Result<RateStatus, ServiceError>;
}

/// Throttle that permits everything
#[derive(Debug, Default)]
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    async fn available(&self, _public_key: &str) -> Result<RateStatus, ServiceError> {
        Ok(RateStatus::unmetered())
    }
}
