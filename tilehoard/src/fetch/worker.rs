//! Fetch worker: pulls tasks, downloads tiles, stores them.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::retry::RetryPolicy;
use super::types::{DownloadResult, DownloadTask, FetchError};
use crate::pool::ServerPool;
use crate::provider::AsyncHttpClient;
use crate::store::TileStore;

/// Work queue shared by all workers of a run.
///
/// The receiver is serialized behind an async mutex so each task is handed to
/// exactly one worker.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<DownloadTask>>>;

/// One member of the worker pool.
pub struct FetchWorker<C> {
    id: usize,
    client: Arc<C>,
    pool: Arc<ServerPool>,
    store: TileStore,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<C: AsyncHttpClient> FetchWorker<C> {
    pub fn new(
        id: usize,
        client: Arc<C>,
        pool: Arc<ServerPool>,
        store: TileStore,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            pool,
            store,
            retry,
            cancel,
        }
    }

    /// Processes tasks until the queue is closed and drained, or the run is
    /// cancelled.
    ///
    /// A task interrupted by cancellation produces no result.
    pub async fn run(self, queue: SharedQueue, results: mpsc::UnboundedSender<DownloadResult>) {
        trace!(worker = self.id, "Fetch worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                task = next_task(&queue) => task,
            };
            let Some(task) = next else { break };

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.process(task) => result,
            };

            if results.send(result).is_err() {
                break;
            }
        }

        trace!(worker = self.id, "Fetch worker stopped");
    }

    /// Runs one task to its final result.
    pub async fn process(&self, mut task: DownloadTask) -> DownloadResult {
        let coord = task.coordinate;

        match self.store.exists(&coord).await {
            Ok(true) => {
                debug!(z = coord.z, x = coord.x, y = coord.y, "Tile present, skipping");
                return DownloadResult::skipped(coord);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(z = coord.z, x = coord.x, y = coord.y, error = %e, "Existence check failed, fetching anyway");
            }
        }

        loop {
            let server = match self.pool.select().await {
                Ok(server) => server,
                Err(e) => {
                    return DownloadResult::failed(coord, FetchError::Pool(e), None, task.attempt)
                }
            };
            task.attempt += 1;

            let url = server.endpoint().url_for(&coord);
            let response = self
                .client
                .get_with_headers(&url, server.endpoint().headers())
                .await;

            match response {
                Ok(body) => {
                    if let Err(reason) = check_tile_body(&body) {
                        self.pool.release(&server);
                        warn!(
                            z = coord.z, x = coord.x, y = coord.y,
                            server = server.name(),
                            reason = %reason,
                            "Server returned an unusable tile"
                        );
                        return DownloadResult::failed(
                            coord,
                            FetchError::InvalidBody { url, reason },
                            Some(server.name()),
                            task.attempt,
                        );
                    }

                    let stored = self.store.write(&coord, &body, self.id).await;
                    // The server delivered a good tile either way
                    self.pool.report_success(&server);

                    return match stored {
                        Ok(bytes) => {
                            debug!(
                                z = coord.z, x = coord.x, y = coord.y,
                                server = server.name(),
                                attempt = task.attempt,
                                half_open = server.is_probe(),
                                bytes,
                                "Tile downloaded"
                            );
                            DownloadResult::success(coord, bytes, server.name(), task.attempt)
                        }
                        Err(e) => {
                            warn!(z = coord.z, x = coord.x, y = coord.y, error = %e, "Failed to store tile");
                            DownloadResult::failed(
                                coord,
                                FetchError::Storage(e.to_string()),
                                Some(server.name()),
                                task.attempt,
                            )
                        }
                    };
                }

                Err(e) if e.is_tile_absent() => {
                    self.pool.release(&server);
                    debug!(
                        z = coord.z, x = coord.x, y = coord.y,
                        server = server.name(),
                        status = ?e.status(),
                        "Tile absent at provider"
                    );
                    return DownloadResult::absent(coord, server.name(), task.attempt);
                }

                Err(e) if e.is_transient() => {
                    self.pool.report_failure(&server);
                    match self.retry.delay_for_attempt(task.attempt) {
                        Some(delay) => {
                            warn!(
                                z = coord.z, x = coord.x, y = coord.y,
                                server = server.name(),
                                attempt = task.attempt,
                                half_open = server.is_probe(),
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "Transient fetch failure, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            warn!(
                                z = coord.z, x = coord.x, y = coord.y,
                                server = server.name(),
                                attempts = task.attempt,
                                error = %e,
                                "Giving up on tile"
                            );
                            return DownloadResult::failed(
                                coord,
                                FetchError::Exhausted {
                                    attempts: task.attempt,
                                    last: e,
                                },
                                Some(server.name()),
                                task.attempt,
                            );
                        }
                    }
                }

                Err(e) => {
                    self.pool.release(&server);
                    warn!(
                        z = coord.z, x = coord.x, y = coord.y,
                        server = server.name(),
                        error = %e,
                        "Permanent fetch failure"
                    );
                    return DownloadResult::failed(
                        coord,
                        FetchError::Permanent(e),
                        Some(server.name()),
                        task.attempt,
                    );
                }
            }
        }
    }
}

async fn next_task(queue: &SharedQueue) -> Option<DownloadTask> {
    queue.lock().await.recv().await
}

/// Rejects bodies that cannot be a raster tile.
fn check_tile_body(body: &[u8]) -> Result<(), String> {
    if body.is_empty() {
        return Err("empty response body".to_string());
    }
    image::guess_format(body)
        .map(|_| ())
        .map_err(|_| "unrecognised image format".to_string())
}
