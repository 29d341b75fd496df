//! Region download orchestration
//!
//! Drives one run for one region: walks the region's tiles lazily, drops the
//! ones already on disk, feeds the rest through a bounded queue to a fixed
//! pool of [`FetchWorker`]s and folds their results into a [`RunSummary`].
//! Memory use does not grow with the size of the region.
//!
//! Runs are restartable. Every run re-derives its work from the disk, so an
//! interrupted run simply resumes where the files stop.

mod progress;
mod state;
mod summary;

pub use progress::{ProgressCallback, ProgressCounters, ProgressSnapshot};
pub use state::{AbortReason, RunError, RunState};
pub use summary::{FailedTile, RunReport, RunSummary, ServerTally};

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DownloadSettings, Region};
use crate::coord::TileCoord;
use crate::fetch::{DownloadResult, DownloadTask, FetchError, FetchWorker, RetryPolicy};
use crate::grid::{RegionTiles, TileGrid};
use crate::pool::{PoolConfig, PoolError, ServerPool};
use crate::provider::{AsyncHttpClient, ServerEndpoint};
use crate::store::TileStore;

/// Queue slots per worker.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Concurrent existence checks ahead of the work queue.
const EXISTENCE_CHECK_CONCURRENCY: usize = 64;

/// Storage failures (with zero successful writes) needed before a run is
/// declared storage-dead.
const MIN_STORAGE_FAILURES: u64 = 3;

/// Settings for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub output_dir: PathBuf,
    pub tile_extension: String,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub pool: PoolConfig,
    pub abort_failure_ratio: Option<f64>,
    pub abort_min_samples: u64,
    /// Log progress every N finished tiles; 0 disables.
    pub progress_log_interval: u64,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            tile_extension: settings.tile_file_extension.clone(),
            concurrency: settings.concurrency.max(1),
            retry: RetryPolicy::from_settings(settings),
            pool: PoolConfig {
                failure_exclusion_threshold: settings.failure_exclusion_threshold,
                cool_down: settings.cool_down(),
                wait_timeout: settings.server_wait_timeout(),
            },
            abort_failure_ratio: settings.abort_failure_ratio,
            abort_min_samples: settings.abort_min_samples,
            progress_log_interval: settings.progress_log_interval,
        }
    }
}

/// Runs region downloads against a fixed set of servers.
///
/// Server health starts fresh on every run.
pub struct DownloadOrchestrator<C> {
    client: Arc<C>,
    servers: Vec<ServerEndpoint>,
    config: OrchestratorConfig,
    state: Mutex<RunState>,
}

impl<C: AsyncHttpClient + 'static> DownloadOrchestrator<C> {
    pub fn new(client: Arc<C>, servers: Vec<ServerEndpoint>, config: OrchestratorConfig) -> Self {
        Self {
            client,
            servers,
            config,
            state: Mutex::new(RunState::Planning),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// State of the current or most recent run.
    pub fn state(&self) -> RunState {
        self.state.lock().clone()
    }

    fn transition(&self, region: &str, next: RunState) {
        let mut state = self.state.lock();
        debug!(region, from = %*state, to = %next, "Run state change");
        *state = next;
    }

    /// Downloads every missing tile of `region`.
    ///
    /// Cancelling `cancel` stops the run: in-flight fetches are abandoned and
    /// the report comes back `Aborted(Cancelled)`.
    pub async fn run(
        &self,
        region: &Region,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let name = region.name();
        self.transition(name, RunState::Planning);

        // Planning
        let requested = TileGrid::count(region.bbox(), region.zoom_levels())?;
        let tiles = TileGrid::tiles(region.bbox(), region.zoom_levels())?;
        info!(
            region = name,
            tiles = requested,
            zooms = ?region.zoom_levels(),
            "Planning download"
        );

        let store = TileStore::new(
            &self.config.output_dir,
            name,
            self.config.tile_extension.as_str(),
        );
        let purged = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.purge_partials())
                .await
                .map_err(|e| RunError::Internal(format!("partial cleanup task failed: {}", e)))??
        };
        if purged > 0 {
            info!(region = name, purged, "Removed partial files from an earlier run");
        }

        let mut summary = RunSummary::new(name, requested);
        let counters = ProgressCounters::new(requested);
        if let Some(callback) = &progress {
            callback(&counters.snapshot());
        }

        let pool = Arc::new(ServerPool::new(
            self.servers.clone(),
            self.config.pool.clone(),
        )?);

        // Running
        self.transition(name, RunState::Running);
        let abort = if requested == 0 || cancel.is_cancelled() {
            cancel.is_cancelled().then_some(AbortReason::Cancelled)
        } else {
            self.execute(
                name,
                &store,
                &pool,
                tiles,
                requested,
                &cancel,
                &counters,
                progress.as_ref(),
                &mut summary,
            )
            .await?
        };

        summary
            .failed_coordinates
            .sort_by_key(|failed| failed.coordinate);
        summary.server_health = pool.health();
        summary.elapsed = Instant::now().duration_since(started);

        let final_state = match abort {
            Some(reason) => {
                warn!(
                    region = name,
                    reason = %reason,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    unfinished = summary.unfinished(),
                    "Download aborted"
                );
                RunState::Aborted(reason)
            }
            None => {
                info!(
                    region = name,
                    requested = summary.requested,
                    succeeded = summary.succeeded,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    absent = summary.absent,
                    bytes = summary.bytes_written,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Download completed"
                );
                RunState::Completed
            }
        };
        self.transition(name, final_state.clone());

        Ok(RunReport {
            state: final_state,
            summary,
        })
    }

    /// Runs the worker pool over `tiles`. Returns the abort reason, if any.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        region: &str,
        store: &TileStore,
        pool: &Arc<ServerPool>,
        tiles: RegionTiles,
        requested: u64,
        cancel: &CancellationToken,
        counters: &ProgressCounters,
        progress: Option<&ProgressCallback>,
        summary: &mut RunSummary,
    ) -> Result<Option<AbortReason>, RunError> {
        // Child token: aborting the run must not cancel the caller's token
        let run_token = cancel.child_token();
        let workers = usize::try_from(requested)
            .map_or(self.config.concurrency, |n| self.config.concurrency.min(n))
            .max(1);

        let (task_tx, task_rx) = mpsc::channel(workers * QUEUE_DEPTH_PER_WORKER);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(tokio::sync::Mutex::new(task_rx));

        // Producer: existence checks run ahead of the queue. Tiles already on
        // disk go straight to the results as skipped.
        let producer = {
            let token = run_token.clone();
            let store = store.clone();
            let skipped_tx = result_tx.clone();
            tokio::spawn(async move {
                let checks = stream::iter(tiles)
                    .map(move |tile| is_stored(store.clone(), tile))
                    .buffered(EXISTENCE_CHECK_CONCURRENCY);
                tokio::pin!(checks);

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        next = checks.next() => next,
                    };
                    let Some((coordinate, present)) = next else { break };

                    if present {
                        if skipped_tx.send(DownloadResult::skipped(coordinate)).is_err() {
                            break;
                        }
                        continue;
                    }

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        sent = task_tx.send(DownloadTask::new(coordinate)) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = FetchWorker::new(
                    id,
                    Arc::clone(&self.client),
                    Arc::clone(pool),
                    store.clone(),
                    self.config.retry.clone(),
                    run_token.clone(),
                );
                tokio::spawn(worker.run(Arc::clone(&queue), result_tx.clone()))
            })
            .collect();
        drop(result_tx);

        info!(region, workers, "Workers started");

        let mut abort: Option<AbortReason> = None;
        let mut guard = AbortGuard::new(&self.config, workers);
        let interval = self.config.progress_log_interval;

        while let Some(result) = result_rx.recv().await {
            counters.record(&result);
            summary.record(&result);

            let snapshot = counters.snapshot();
            if let Some(callback) = progress {
                callback(&snapshot);
            }
            if interval > 0 && snapshot.done % interval == 0 {
                info!(
                    region,
                    done = snapshot.done,
                    total = snapshot.total,
                    percent = format!("{:.1}", snapshot.percent()),
                    failed = snapshot.failed,
                    "Download progress"
                );
            }

            if abort.is_none() {
                if let Some(reason) = guard.check(&result, &snapshot) {
                    warn!(region, reason = %reason, "Aborting download");
                    abort = Some(reason);
                    run_token.cancel();
                }
            }
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                return Err(RunError::Internal(format!("fetch worker failed: {}", e)));
            }
        }
        if let Err(e) = producer.await {
            return Err(RunError::Internal(format!("task producer failed: {}", e)));
        }

        if abort.is_none() && cancel.is_cancelled() {
            abort = Some(AbortReason::Cancelled);
        }
        Ok(abort)
    }
}

/// Existence check for one tile. A failed check counts as missing.
async fn is_stored(store: TileStore, tile: TileCoord) -> (TileCoord, bool) {
    match store.exists(&tile).await {
        Ok(present) => (tile, present),
        Err(e) => {
            warn!(z = tile.z, x = tile.x, y = tile.y, error = %e, "Existence check failed, will fetch");
            (tile, false)
        }
    }
}

/// Tracks the abort conditions while results come in.
struct AbortGuard {
    failure_ratio: Option<f64>,
    min_samples: u64,
    storage_threshold: u64,
    storage_failures: u64,
    writes_ok: u64,
}

impl AbortGuard {
    fn new(config: &OrchestratorConfig, workers: usize) -> Self {
        Self {
            failure_ratio: config.abort_failure_ratio,
            min_samples: config.abort_min_samples.max(1),
            storage_threshold: (workers as u64).max(MIN_STORAGE_FAILURES),
            storage_failures: 0,
            writes_ok: 0,
        }
    }

    fn check(&mut self, result: &DownloadResult, snapshot: &ProgressSnapshot) -> Option<AbortReason> {
        if let Some(FetchError::Pool(PoolError::WaitTimeout { waited })) = &result.error {
            return Some(AbortReason::ServerWaitTimeout { waited: *waited });
        }

        match &result.error {
            Some(error) if error.is_storage() => self.storage_failures += 1,
            None if result.is_success() && !result.absent => self.writes_ok += 1,
            _ => {}
        }
        if self.writes_ok == 0 && self.storage_failures >= self.storage_threshold {
            return Some(AbortReason::StorageUnavailable {
                failures: self.storage_failures,
            });
        }

        if let Some(threshold) = self.failure_ratio {
            let finished = snapshot.fetched();
            if finished >= self.min_samples {
                let ratio = snapshot.failed as f64 / finished as f64;
                if ratio > threshold {
                    return Some(AbortReason::FailureRatio {
                        failed: snapshot.failed,
                        finished,
                        threshold,
                    });
                }
            }
        }

        None
    }
}
