//! Download settings shared by every region.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::ConfigError;

/// Tunables for a download run.
///
/// Every field has a default so a config file only needs to list what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Root directory; tiles land in `{output_dir}/{region}/{z}/{x}/{y}.{ext}`.
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub failure_exclusion_threshold: u32,
    pub cool_down_ms: u64,
    pub tile_file_extension: String,
    pub request_timeout_secs: u64,
    /// Abort the run if no server becomes eligible within this time.
    pub server_wait_timeout_ms: Option<u64>,
    /// Abort once `failed / finished` exceeds this ratio.
    pub abort_failure_ratio: Option<f64>,
    pub abort_min_samples: u64,
    /// 0 disables periodic progress logging.
    pub progress_log_interval: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
            failure_exclusion_threshold: DEFAULT_FAILURE_EXCLUSION_THRESHOLD,
            cool_down_ms: DEFAULT_COOL_DOWN_MS,
            tile_file_extension: DEFAULT_TILE_FILE_EXTENSION.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            server_wait_timeout_ms: None,
            abort_failure_ratio: None,
            abort_min_samples: DEFAULT_ABORT_MIN_SAMPLES,
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DownloadSettings {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn server_wait_timeout(&self) -> Option<Duration> {
        self.server_wait_timeout_ms.map(Duration::from_millis)
    }

    /// Checks value ranges, naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidSetting {
                key: key.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.failure_exclusion_threshold == 0 {
            return Err(invalid("failure_exclusion_threshold", "must be at least 1"));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(invalid(
                "backoff_cap_ms",
                "must not be smaller than backoff_base_ms",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        if self.tile_file_extension.is_empty()
            || !self
                .tile_file_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(invalid(
                "tile_file_extension",
                "must be a non-empty alphanumeric extension without a dot",
            ));
        }
        if let Some(ratio) = self.abort_failure_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(invalid("abort_failure_ratio", "must be in (0, 1]"));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
