//! Progress tracking for a download run.
//!
//! Counters are atomics so a snapshot can be taken from any task while the
//! run is collecting results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::fetch::{DownloadResult, Outcome};

/// Progress callback invoked after planning and after every finished tile.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Tiles in the region across all zoom levels.
    pub total: u64,
    /// Tiles with a final result, skipped ones included.
    pub done: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub absent: u64,
    pub bytes_written: u64,
}

impl ProgressSnapshot {
    /// Completion as a percentage (100 for an empty run).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.done as f64 / self.total as f64) * 100.0
        }
    }

    /// Tiles that needed a fetch and got a final result.
    pub fn fetched(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Shared counters for one run.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    absent: AtomicU64,
    bytes_written: AtomicU64,
}

impl ProgressCounters {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            ..Default::default()
        }
    }

    /// Counts one worker result.
    pub fn record(&self, result: &DownloadResult) {
        match result.outcome {
            Outcome::Success => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                self.bytes_written
                    .fetch_add(result.bytes_written, Ordering::SeqCst);
                if result.absent {
                    self.absent.fetch_add(1, Ordering::SeqCst);
                }
            }
            Outcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            Outcome::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let skipped = self.skipped.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            done: succeeded + skipped + failed,
            succeeded,
            skipped,
            failed,
            absent: self.absent.load(Ordering::SeqCst),
            bytes_written: self.bytes_written.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::fetch::FetchError;

    const T: TileCoord = TileCoord { z: 1, x: 0, y: 0 };

    #[test]
    fn test_counters_new() {
        let counters = ProgressCounters::new(10);
        let snap = counters.snapshot();
        assert_eq!(snap.total, 10);
        assert_eq!(snap.done, 0);
        assert_eq!(snap.percent(), 0.0);
    }

    #[test]
    fn test_record_outcomes() {
        let counters = ProgressCounters::new(5);
        counters.record(&DownloadResult::skipped(T));
        counters.record(&DownloadResult::success(T, 100, "a", 1));
        counters.record(&DownloadResult::absent(T, "a", 1));
        counters.record(&DownloadResult::skipped(T));
        counters.record(&DownloadResult::failed(
            T,
            FetchError::Storage("disk full".into()),
            None,
            1,
        ));

        let snap = counters.snapshot();
        assert_eq!(snap.done, 5);
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.absent, 1);
        assert_eq!(snap.skipped, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.bytes_written, 100);
        assert_eq!(snap.fetched(), 3);
        assert_eq!(snap.percent(), 100.0);
    }

    #[test]
    fn test_empty_run_is_complete() {
        assert_eq!(ProgressSnapshot::default().percent(), 100.0);
    }
}
