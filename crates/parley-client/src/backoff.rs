//! Reconnect backoff policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Exponential backoff between reconnection attempts.
///
/// Serialized with the option names `baseDelayMs`, `capDelayMs` and `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub cap_delay_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            cap_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.cap_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Reject policies that would spin or never retry
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config("baseDelayMs must be positive".into()));
        }
        if self.cap_delay_ms < self.base_delay_ms {
            return Err(Error::Config(
                "capDelayMs must not be smaller than baseDelayMs".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config("multiplier must be at least 1".into()));
        }
        Ok(())
    }
}
