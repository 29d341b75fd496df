//! Run state machine and run-level errors.
//!
//! ```text
//! Planning --> Running --> Completed
//!                  \-----> Aborted(reason)
//! ```

use std::fmt;
use std::time::Duration;

use crate::coord::CoordError;
use crate::pool::PoolError;
use crate::store::StorageError;

/// Lifecycle of a download run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Expanding the region into tiles and checking what is already on disk.
    Planning,
    /// Workers are fetching.
    Running,
    /// Every queued tile has a result.
    Completed,
    /// Stopped early; tiles already written remain valid.
    Aborted(AbortReason),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Planning => write!(f, "planning"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// The failure ratio crossed the configured threshold.
    FailureRatio {
        failed: u64,
        finished: u64,
        threshold: f64,
    },
    /// No server became eligible within the wait timeout.
    ServerWaitTimeout { waited: Duration },
    /// Every storage write failed.
    StorageUnavailable { failures: u64 },
    /// The caller cancelled the run.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::FailureRatio {
                failed,
                finished,
                threshold,
            } => write!(
                f,
                "{} of {} fetched tiles failed, above the {:.0}% limit",
                failed,
                finished,
                threshold * 100.0
            ),
            AbortReason::ServerWaitTimeout { waited } => write!(
                f,
                "no tile server available after waiting {:.1}s",
                waited.as_secs_f64()
            ),
            AbortReason::StorageUnavailable { failures } => {
                write!(f, "all {} tile writes failed", failures)
            }
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors that prevent a run from starting or finishing.
#[derive(Debug)]
pub enum RunError {
    /// The region could not be expanded into tiles.
    Grid(CoordError),
    /// Planning could not inspect the output directory.
    Storage(StorageError),
    /// The server pool could not be built.
    Pool(PoolError),
    /// A worker or the producer task died.
    Internal(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Grid(e) => write!(f, "Failed to enumerate tiles: {}", e),
            RunError::Storage(e) => write!(f, "Storage error during planning: {}", e),
            RunError::Pool(e) => write!(f, "Server pool error: {}", e),
            RunError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Grid(e) => Some(e),
            RunError::Storage(e) => Some(e),
            RunError::Pool(e) => Some(e),
            RunError::Internal(_) => None,
        }
    }
}

impl From<CoordError> for RunError {
    fn from(e: CoordError) -> Self {
        RunError::Grid(e)
    }
}

impl From<StorageError> for RunError {
    fn from(e: StorageError) -> Self {
        RunError::Storage(e)
    }
}

impl From<PoolError> for RunError {
    fn from(e: PoolError) -> Self {
        RunError::Pool(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::Planning.to_string(), "planning");
        assert_eq!(RunState::Running.to_string(), "running");
        assert_eq!(RunState::Completed.to_string(), "completed");
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::FailureRatio {
            failed: 30,
            finished: 50,
            threshold: 0.5,
        };
        assert_eq!(
            reason.to_string(),
            "30 of 50 fetched tiles failed, above the 50% limit"
        );
        assert_eq!(
            RunState::Aborted(AbortReason::Cancelled).to_string(),
            "aborted (cancelled)"
        );
    }

    #[test]
    fn test_run_error_source() {
        use std::error::Error;
        let err = RunError::from(PoolError::NoServers);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Server pool error: server pool has no servers");
    }
}
