//! TileHoard - bulk map tile downloader.
//!
//! Expands named geographic regions into slippy-map tile coordinates and
//! fetches every missing tile from a weighted pool of tile servers into a
//! `{root}/{region}/{z}/{x}/{y}.{ext}` tree. Runs are resumable: tiles
//! already on disk are skipped and writes are atomic.
//!
//! The main pieces:
//! - [`grid::TileGrid`] enumerates tiles for a bounding box and zoom set
//! - [`pool::ServerPool`] picks servers by weight and excludes failing ones
//! - [`store::TileStore`] writes tiles atomically
//! - [`fetch::FetchWorker`] downloads one tile with retries
//! - [`orchestrator::DownloadOrchestrator`] runs a region end to end
//! - [`app::TileHoard`] wires configuration to the orchestrator

pub mod app;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod grid;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod provider;
pub mod store;

pub use app::{AppConfig, AppError, TileHoard};
pub use coord::{BoundingBox, TileCoord};
pub use orchestrator::{
    AbortReason, DownloadOrchestrator, ProgressCallback, ProgressSnapshot, RunReport, RunState,
    RunSummary,
};
