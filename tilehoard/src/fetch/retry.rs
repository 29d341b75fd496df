//! Retry policy for transient fetch failures.

use std::time::Duration;

use crate::config::DownloadSettings;

/// Exponential backoff: `min(base × 2^(attempt−1), cap)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of HTTP attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Delay never exceeds this.
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            cap,
        }
    }

    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.backoff_base(),
            settings.backoff_cap(),
        )
    }

    /// Delay to wait after `attempt` failed attempts (1-based).
    ///
    /// Returns `None` once `attempt` has used up the attempt budget.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }
}
