//! Task and result types exchanged between the orchestrator and workers.

use std::fmt;

use thiserror::Error;

use crate::coord::TileCoord;
use crate::pool::PoolError;
use crate::provider::ProviderError;

/// One tile to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTask {
    pub coordinate: TileCoord,
    /// HTTP attempts made so far.
    pub attempt: u32,
}

impl DownloadTask {
    pub fn new(coordinate: TileCoord) -> Self {
        Self {
            coordinate,
            attempt: 0,
        }
    }
}

/// Final state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// Why a tile could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transient failures used up every attempt.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ProviderError },

    /// The server refused the request in a way retrying won't fix.
    #[error("permanent failure: {0}")]
    Permanent(ProviderError),

    /// 2xx response that is not a usable tile.
    #[error("invalid tile from {url}: {reason}")]
    InvalidBody { url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no server available: {0}")]
    Pool(#[from] PoolError),
}

impl FetchError {
    /// Failures recorded without any retry.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FetchError::Permanent(_) | FetchError::InvalidBody { .. }
        )
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, FetchError::Storage(_))
    }
}

/// Produced exactly once per task; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub coordinate: TileCoord,
    pub outcome: Outcome,
    pub bytes_written: u64,
    pub error: Option<FetchError>,
    /// Server that answered the final attempt.
    pub server: Option<String>,
    /// HTTP attempts made.
    pub attempts: u32,
    /// The provider has no such tile (404/410); counts as success.
    pub absent: bool,
}

impl DownloadResult {
    pub fn skipped(coordinate: TileCoord) -> Self {
        Self {
            coordinate,
            outcome: Outcome::Skipped,
            bytes_written: 0,
            error: None,
            server: None,
            attempts: 0,
            absent: false,
        }
    }

    pub fn success(coordinate: TileCoord, bytes: u64, server: &str, attempts: u32) -> Self {
        Self {
            coordinate,
            outcome: Outcome::Success,
            bytes_written: bytes,
            error: None,
            server: Some(server.to_string()),
            attempts,
            absent: false,
        }
    }

    pub fn absent(coordinate: TileCoord, server: &str, attempts: u32) -> Self {
        Self {
            absent: true,
            ..Self::success(coordinate, 0, server, attempts)
        }
    }

    pub fn failed(
        coordinate: TileCoord,
        error: FetchError,
        server: Option<&str>,
        attempts: u32,
    ) -> Self {
        Self {
            coordinate,
            outcome: Outcome::Failed,
            bytes_written: 0,
            error: Some(error),
            server: server.map(str::to_string),
            attempts,
            absent: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_zero_byte_success() {
        let result = DownloadResult::absent(TileCoord { z: 3, x: 1, y: 1 }, "osm", 1);
        assert!(result.is_success());
        assert!(result.absent);
        assert_eq!(result.bytes_written, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_error_kinds() {
        let rejected = FetchError::Permanent(ProviderError::Status {
            status: 403,
            url: "u".into(),
        });
        assert!(rejected.is_permanent());
        assert!(!FetchError::Storage("disk full".into()).is_permanent());
        assert!(FetchError::Storage("disk full".into()).is_storage());
        assert_eq!(
            FetchError::Exhausted {
                attempts: 3,
                last: ProviderError::Timeout { url: "u".into() }
            }
            .to_string(),
            "gave up after 3 attempts: request to u timed out"
        );
    }
}
