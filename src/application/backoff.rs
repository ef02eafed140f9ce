//! Capped exponential backoff for failed polling ticks
//!
//! Off by default: the live page retries at its normal cadence forever. When
//! enabled, each consecutive failure pushes the next tick out by
//! `min(base * multiplier^(n-1), max)` plus optional jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub enabled: bool,
    /// Delay after the first failure (ms)
    pub base_delay_ms: u64,
    /// Upper bound on the delay (ms)
    pub max_delay_ms: u64,
    /// Growth factor between consecutive failures
    pub multiplier: f64,
    /// Random extra delay in `0..=jitter_range_ms`
    pub jitter_range_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter_range_ms: 0,
        }
    }
}

impl BackoffPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn exponential(base_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            enabled: true,
            base_delay_ms,
            max_delay_ms,
            multiplier,
            jitter_range_ms: 0,
        }
    }

    /// Extra delay before the next tick after `consecutive_failures` failures.
    ///
    /// Zero when disabled or when the last tick succeeded.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if !self.enabled || consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let raw = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let capped = raw.min(self.max_delay_ms as f64);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let capped_ms = capped as u64;

        let jitter = if self.jitter_range_ms > 0 {
            fastrand::u64(0..=self.jitter_range_ms)
        } else {
            0
        };

        Duration::from_millis(capped_ms.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_policy_never_delays() {
        let policy = BackoffPolicy::disabled();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let policy = BackoffPolicy::exponential(100, 1_000, 2.0);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy {
            jitter_range_ms: 50,
            ..BackoffPolicy::exponential(100, 1_000, 2.0)
        };
        for _ in 0..32 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_huge_cap_with_jitter_saturates() {
        let policy = BackoffPolicy {
            jitter_range_ms: 1_000,
            ..BackoffPolicy::exponential(u64::MAX, u64::MAX, 2.0)
        };
        assert_eq!(policy.delay_for(3), Duration::from_millis(u64::MAX));
    }
}
