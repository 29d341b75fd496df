//! Application configuration with command-line overrides.

use std::path::{Path, PathBuf};

use super::error::AppError;
use crate::config::{resolve_config_path, ConfigFile, ValidatedConfig};

/// Validated configuration plus the path it came from.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: Option<PathBuf>,
    pub config: ValidatedConfig,
}

impl AppConfig {
    /// Resolves, loads and validates the configuration file.
    ///
    /// See [`resolve_config_path`] for the lookup order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        let path = resolve_config_path(explicit);
        let config = ConfigFile::load(&path)?.validate()?;
        Ok(Self {
            source: Some(path),
            config,
        })
    }

    pub fn from_validated(config: ValidatedConfig) -> Self {
        Self {
            source: None,
            config,
        }
    }

    /// Overrides the number of workers (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.settings.concurrency = concurrency.max(1);
        self
    }

    /// Overrides the tile output root.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.settings.output_dir = dir.into();
        self
    }
}
