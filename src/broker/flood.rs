//! Per-connection PUBLISH flood guard

use crate::config::BrokerConfig;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;

/// Token bucket over inbound PUBLISH packets of one connection
pub(crate) struct FloodGuard {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl FloodGuard {
    /// `None` when the limit is disabled (0 messages per second)
    pub(crate) fn new(config: &BrokerConfig) -> Option<Self> {
        let per_second = NonZeroU32::new(config.max_messages_per_second)?;
        let burst = NonZeroU32::new(config.burst).unwrap_or(nonzero!(1u32));

        Some(Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
        })
    }

    pub(crate) fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        assert!(FloodGuard::new(&BrokerConfig::default()).is_none());
    }

    #[test]
    fn test_burst_then_deny() {
        let config = BrokerConfig {
            max_messages_per_second: 1,
            burst: 2,
            ..Default::default()
        };
        let guard = FloodGuard::new(&config).unwrap();

        assert!(guard.allow());
        assert!(guard.allow());
        assert!(!guard.allow());
    }
}
