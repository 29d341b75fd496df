//! Tile fetching.
//!
//! [`FetchWorker`]s pull [`DownloadTask`]s from a shared queue, pick a server
//! from the [`ServerPool`](crate::pool::ServerPool), download, classify the
//! response and hand good tiles to the [`TileStore`](crate::store::TileStore).
//! Each task yields exactly one [`DownloadResult`].
//!
//! | Response | Result | Server health |
//! |----------|--------|---------------|
//! | 2xx with an image body | `Success`, file written | success |
//! | 404 / 410 | `Success`, no file | untouched |
//! | 5xx, 408, 429, timeout, connection or body error | retried with backoff, then `Failed` | failure |
//! | other 4xx, empty or non-image body | `Failed`, not retried | untouched |
//! | write error | `Failed` | success |

mod retry;
mod types;
mod worker;

pub use retry::RetryPolicy;
pub use types::{DownloadResult, DownloadTask, FetchError, Outcome};
pub use worker::{FetchWorker, SharedQueue};
