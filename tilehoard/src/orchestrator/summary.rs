//! Final report of a download run.

use std::collections::BTreeMap;
use std::time::Duration;

use super::state::RunState;
use crate::coord::TileCoord;
use crate::fetch::{DownloadResult, FetchError, Outcome};
use crate::pool::ServerHealth;

/// A tile that ended `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTile {
    pub coordinate: TileCoord,
    pub error: FetchError,
}

/// Per-server results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerTally {
    pub succeeded: u64,
    pub absent: u64,
    pub failed: u64,
    pub bytes_written: u64,
}

/// Aggregated counts for a run.
///
/// For a completed run `requested == skipped + succeeded + failed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub region: String,
    pub requested: u64,
    pub skipped: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Successes where the provider had no tile (404/410).
    pub absent: u64,
    pub bytes_written: u64,
    /// Sorted by zoom, then x, then y.
    pub failed_coordinates: Vec<FailedTile>,
    pub by_server: BTreeMap<String, ServerTally>,
    pub server_health: Vec<ServerHealth>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(region: impl Into<String>, requested: u64) -> Self {
        Self {
            region: region.into(),
            requested,
            ..Default::default()
        }
    }

    /// Folds one worker result into the totals.
    pub fn record(&mut self, result: &DownloadResult) {
        let tally = result
            .server
            .as_ref()
            .map(|name| self.by_server.entry(name.clone()).or_default());

        match result.outcome {
            Outcome::Success => {
                self.succeeded += 1;
                self.bytes_written += result.bytes_written;
                if result.absent {
                    self.absent += 1;
                }
                if let Some(tally) = tally {
                    tally.succeeded += 1;
                    tally.bytes_written += result.bytes_written;
                    if result.absent {
                        tally.absent += 1;
                    }
                }
            }
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => {
                self.failed += 1;
                if let Some(tally) = tally {
                    tally.failed += 1;
                }
                if let Some(error) = &result.error {
                    self.failed_coordinates.push(FailedTile {
                        coordinate: result.coordinate,
                        error: error.clone(),
                    });
                }
            }
        }
    }

    /// Tiles that have not produced a result (non-zero only after an abort).
    pub fn unfinished(&self) -> u64 {
        self.requested
            .saturating_sub(self.skipped + self.succeeded + self.failed)
    }
}

/// Outcome of [`DownloadOrchestrator::run`](super::DownloadOrchestrator::run).
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// `Completed` or `Aborted`.
    pub state: RunState,
    pub summary: RunSummary,
}

impl RunReport {
    /// Completed with no failed tiles.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed && self.summary.failed == 0
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, RunState::Aborted(_))
    }
}
