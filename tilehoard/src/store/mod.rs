//! On-disk tile storage.
//!
//! Tiles live at `{root}/{region}/{z}/{x}/{y}.{ext}`, the layout slippy-map
//! viewers read directly. A final path either does not exist or holds a
//! complete tile: bytes go to a sibling temp file that is fsynced and then
//! renamed over the final path.
//!
//! Because of that, file existence doubles as the resume ledger between runs.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::coord::TileCoord;

/// Suffix of in-progress temp files.
pub const PARTIAL_SUFFIX: &str = "part";

/// Errors from tile storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from} into place: {source}")]
    Rename {
        from: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to check {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan for partial files: {0}")]
    Scan(String),
}

/// Tile files for one region.
#[derive(Debug, Clone)]
pub struct TileStore {
    region_dir: PathBuf,
    extension: String,
    seq: Arc<AtomicU64>,
}

impl TileStore {
    /// Creates a store rooted at `{root}/{region}`.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl AsRef<Path>, region: &str, extension: impl Into<String>) -> Self {
        Self {
            region_dir: root.as_ref().join(region),
            extension: extension.into(),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn region_dir(&self) -> &Path {
        &self.region_dir
    }

    /// Final path of a tile.
    pub fn path(&self, tile: &TileCoord) -> PathBuf {
        self.region_dir
            .join(tile.z.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.{}", tile.y, self.extension))
    }

    /// Whether a complete tile is already stored.
    pub async fn exists(&self, tile: &TileCoord) -> Result<bool, StorageError> {
        let path = self.path(tile);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StorageError::Stat { path, source })
    }

    /// Atomically stores a tile, returning the number of bytes written.
    ///
    /// The temp file name is unique per worker and write, so concurrent writers
    /// of the same tile never share a temp file; the last rename wins.
    pub async fn write(
        &self,
        tile: &TileCoord,
        bytes: &[u8],
        worker_id: usize,
    ) -> Result<u64, StorageError> {
        let path = self.path(tile);
        let Some(parent) = path.parent() else {
            return Err(StorageError::CreateDir {
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "tile path has no parent"),
            });
        };

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent.join(format!(
            "{}.{}.{}-{}.{}",
            tile.y, self.extension, worker_id, seq, PARTIAL_SUFFIX
        ));

        if let Err(source) = write_synced(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Write {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Rename {
                from: temp_path,
                source,
            });
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Tile stored");
        Ok(bytes.len() as u64)
    }

    /// Deletes temp files left behind by an interrupted run.
    ///
    /// Blocking; call from a blocking context. Returns how many were removed.
    pub fn purge_partials(&self) -> Result<usize, StorageError> {
        let base = glob::Pattern::escape(&self.region_dir.to_string_lossy());
        let pattern = format!("{}/*/*/*.{}", base, PARTIAL_SUFFIX);

        let entries = glob::glob(&pattern).map_err(|e| StorageError::Scan(e.to_string()))?;

        let mut removed = 0;
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry during partial cleanup");
                    continue;
                }
            };
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial file"),
            }
        }

        if removed > 0 {
            debug!(removed, dir = %self.region_dir.display(), "Removed stale partial files");
        }
        Ok(removed)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
