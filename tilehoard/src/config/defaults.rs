//! Default values for all download settings.

/// Root directory for downloaded tiles.
pub const DEFAULT_OUTPUT_DIR: &str = "tiles";

/// Number of concurrent fetch workers.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Total HTTP attempts per tile, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First retry delay; doubles on each further attempt.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Upper bound on a single retry delay.
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 30_000;

/// Consecutive failures after which a server is excluded.
pub const DEFAULT_FAILURE_EXCLUSION_THRESHOLD: u32 = 5;

/// How long an excluded server sits out before a half-open probe.
pub const DEFAULT_COOL_DOWN_MS: u64 = 30_000;

pub const DEFAULT_TILE_FILE_EXTENSION: &str = "png";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Minimum finished tiles before the failure ratio can abort a run.
pub const DEFAULT_ABORT_MIN_SAMPLES: u64 = 50;

/// Emit a progress log line every N finished tiles.
pub const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 100;

pub const DEFAULT_USER_AGENT: &str = concat!("tilehoard/", env!("CARGO_PKG_VERSION"));

/// Config file name looked up in the working and config directories.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Application directory under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "tilehoard";
