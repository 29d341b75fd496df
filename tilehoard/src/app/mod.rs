//! Application facade.
//!
//! [`TileHoard`] ties the validated configuration to an HTTP client and
//! runs one [`DownloadOrchestrator`] per requested region.
//!
//! ```text
//! config.json ──► AppConfig ──► TileHoard ──► DownloadOrchestrator ──► RunReport
//!                                  │
//!                                  └── AsyncReqwestClient (shared by all runs)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilehoard::app::{AppConfig, TileHoard};
//! use tokio_util::sync::CancellationToken;
//!
//! let app = TileHoard::new(AppConfig::load(None)?)?;
//! let report = app.download_region("qatar", CancellationToken::new(), None).await?;
//! println!("{} tiles written", report.summary.succeeded);
//! ```

mod config;
mod error;

pub use config::AppConfig;
pub use error::AppError;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{DownloadSettings, Region};
use crate::orchestrator::{DownloadOrchestrator, OrchestratorConfig, ProgressCallback, RunReport};
use crate::provider::{AsyncHttpClient, AsyncReqwestClient};

/// Entry point for library users and the CLI.
pub struct TileHoard<C = AsyncReqwestClient> {
    config: AppConfig,
    client: Arc<C>,
}

impl TileHoard<AsyncReqwestClient> {
    /// Creates the application with a reqwest client built from the settings.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let settings = &config.config.settings;
        let client = AsyncReqwestClient::new(settings.request_timeout(), &settings.user_agent)
            .map_err(AppError::HttpClient)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }
}

impl<C: AsyncHttpClient + 'static> TileHoard<C> {
    pub fn with_client(config: AppConfig, client: Arc<C>) -> Self {
        Self { config, client }
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.config.config.settings
    }

    /// Configured regions, sorted by name.
    pub fn list_regions(&self) -> Vec<&Region> {
        self.config.config.regions.values().collect()
    }

    /// Looks up a region by name.
    pub fn region(&self, name: &str) -> Result<&Region, AppError> {
        self.config
            .config
            .regions
            .get(name)
            .ok_or_else(|| AppError::UnknownRegion {
                name: name.to_string(),
                available: self.config.config.regions.keys().cloned().collect(),
            })
    }

    /// Downloads every missing tile of the named region.
    ///
    /// An aborted run still returns `Ok`; inspect [`RunReport::state`].
    pub async fn download_region(
        &self,
        name: &str,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<RunReport, AppError> {
        let region = self.region(name)?;
        let orchestrator = DownloadOrchestrator::new(
            Arc::clone(&self.client),
            self.config.config.servers.clone(),
            OrchestratorConfig::from_settings(self.settings()),
        );

        info!(
            region = region.name(),
            servers = self.config.config.servers.len(),
            concurrency = self.settings().concurrency,
            "Starting region download"
        );

        Ok(orchestrator.run(region, cancel, progress).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::orchestrator::RunState;
    use crate::provider::MockHttpClient;
    use tempfile::TempDir;

    fn app(output: &TempDir) -> TileHoard<MockHttpClient> {
        let json = r#"{
            "servers": [{ "name": "osm", "url": "https://t.test/{z}/{x}/{y}.png" }],
            "regions": {
                "qatar": { "bbox": [50.0, 24.4, 52.0, 26.2], "zoom_levels": [3] },
                "doha": { "bbox": [51.4, 25.2, 51.6, 25.4], "min_zoom": 1, "max_zoom": 2 }
            }
        }"#;
        let validated = ConfigFile::from_json(json).unwrap().validate().unwrap();
        let config = AppConfig::from_validated(validated)
            .with_output_dir(output.path())
            .with_concurrency(1);
        TileHoard::with_client(config, Arc::new(MockHttpClient::always_ok()))
    }

    #[test]
    fn test_list_regions_sorted() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let names: Vec<&str> = app.list_regions().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["doha", "qatar"]);
    }

    #[tokio::test]
    async fn test_unknown_region() {
        let dir = TempDir::new().unwrap();
        let err = app(&dir)
            .download_region("atlantis", CancellationToken::new(), None)
            .await
            .unwrap_err();
        match err {
            AppError::UnknownRegion { name, available } => {
                assert_eq!(name, "atlantis");
                assert_eq!(available, vec!["doha", "qatar"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_download_region_writes_tiles() {
        let dir = TempDir::new().unwrap();
        let report = app(&dir)
            .download_region("qatar", CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.summary.requested, 1);
        assert_eq!(report.summary.succeeded, 1);
        assert!(dir.path().join("qatar/3/5/3.png").exists());
    }
}
