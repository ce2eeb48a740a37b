//! Fixed-window write counter per public key

use super::{RateStatus, Throttle};
use crate::config::ThrottleConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Windows are swept once the map grows past this many keys, at most once
/// per window length
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: u64,
    used: u64,
}

/// In-memory fixed-window throttle
///
/// Each public key gets `limit` writes per `window_secs`. A rejected write
/// does not count; a permitted one counts even if the record is later
/// rejected by validation.
pub struct WindowThrottle {
    limit: u64,
    window_secs: u64,
    windows: DashMap<String, Window>,
    /// Unix time of the last threshold sweep
    last_sweep: AtomicU64,
}

impl WindowThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            limit: config.limit,
            window_secs: config.window_secs.max(1),
            windows: DashMap::new(),
            last_sweep: AtomicU64::new(0),
        }
    }

    /// Count a write for `public_key` at unix time `now`
    pub fn check_at(&self, public_key: &str, now: u64) -> RateStatus {
        if self.windows.len() > SWEEP_THRESHOLD {
            self.sweep_if_due(now);
        }

        let mut window = self
            .windows
            .entry(public_key.to_string())
            .or_insert(Window { started: now, used: 0 });

        if now >= window.started + self.window_secs {
            *window = Window { started: now, used: 0 };
        }

        let permitted = window.used < self.limit;
        if permitted {
            window.used += 1;
        } else {
            debug!(public_key = %public_key, used = window.used, "Write window exhausted");
        }

        RateStatus {
            permitted,
            used: window.used,
            limit: self.limit,
            reset: window.started + self.window_secs,
        }
    }

    /// Sweep unless another sweep ran within the last window
    fn sweep_if_due(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now < last.saturating_add(self.window_secs) {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep(now);
            debug!(tracked = self.windows.len(), "Throttle windows swept");
        }
    }

    /// Drop windows that have expired by `now`
    pub fn sweep(&self, now: u64) {
        let window_secs = self.window_secs;
        self.windows.retain(|_, w| now < w.started + window_secs);
    }

    /// Number of keys with a live window
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl Throttle for WindowThrottle {
    async fn available(&self, public_key: &str) -> Result<RateStatus, ServiceError> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        Ok(self.check_at(public_key, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(limit: u64, window_secs: u64) -> WindowThrottle {
        WindowThrottle::new(&ThrottleConfig {
            enabled: true,
            limit,
            window_secs,
        })
    }

    #[test]
    fn test_limit_within_window() {
        let throttle = throttle(2, 60);

        let first = throttle.check_at("pub", 1_000);
        assert!(first.permitted);
        assert_eq!(first.used, 1);
        assert_eq!(first.limit, 2);
        assert_eq!(first.reset, 1_060);

        assert!(throttle.check_at("pub", 1_010).permitted);

        let third = throttle.check_at("pub", 1_020);
        assert!(!third.permitted);
        assert_eq!(third.used, 2, "Rejected writes are not counted");
        assert_eq!(third.reset, 1_060);
    }

    #[test]
    fn test_window_resets() {
        let throttle = throttle(1, 60);

        assert!(throttle.check_at("pub", 1_000).permitted);
        assert!(!throttle.check_at("pub", 1_059).permitted);

        let next = throttle.check_at("pub", 1_060);
        assert!(next.permitted);
        assert_eq!(next.used, 1);
        assert_eq!(next.reset, 1_120);
    }

    #[test]
    fn test_keys_are_independent() {
        let throttle = throttle(1, 60);

        assert!(throttle.check_at("a", 1_000).permitted);
        assert!(throttle.check_at("b", 1_000).permitted);
        assert!(!throttle.check_at("a", 1_001).permitted);
        assert!(!throttle.check_at("b", 1_001).permitted);
    }

    #[test]
    fn test_sweep_drops_expired_windows() {
        let throttle = throttle(5, 60);

        throttle.check_at("old", 1_000);
        throttle.check_at("fresh", 1_050);
        throttle.sweep(1_070);

        assert_eq!(throttle.tracked_keys(), 1);
    }

    #[test]
    fn test_threshold_sweep_runs_once_per_window() {
        let throttle = throttle(5, 60);

        for i in 0..=SWEEP_THRESHOLD {
            throttle.check_at(&format!("key-{i}"), 1_000);
        }
        assert_eq!(throttle.last_sweep.load(Ordering::Relaxed), 0);

        // Over the threshold: sweeps, but every window is live
        throttle.check_at("trigger", 1_000);
        assert_eq!(throttle.last_sweep.load(Ordering::Relaxed), 1_000);
        assert_eq!(throttle.tracked_keys(), SWEEP_THRESHOLD + 2);

        // Still over the threshold, but a sweep already ran this window
        throttle.check_at("again", 1_030);
        assert_eq!(throttle.last_sweep.load(Ordering::Relaxed), 1_000);
        assert_eq!(throttle.tracked_keys(), SWEEP_THRESHOLD + 3);

        // One window later the keys from 1_000 have expired
        throttle.check_at("late", 1_060);
        assert_eq!(throttle.last_sweep.load(Ordering::Relaxed), 1_060);
        assert_eq!(throttle.tracked_keys(), 2, "\"again\" and \"late\" remain");
    }

    #[tokio::test]
    async fn test_available_uses_wall_clock() {
        let throttle = throttle(10, 900);
        let status = throttle.available("pub").await.unwrap();
        let now = u64::try_from(Utc::now().timestamp()).unwrap();

        assert!(status.permitted);
        assert!(status.reset > now && status.reset <= now + 900);
    }
}
