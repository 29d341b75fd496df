//! Application error types.

use std::fmt;

use crate::config::ConfigError;
use crate::orchestrator::RunError;
use crate::provider::ProviderError;

/// Errors surfaced by the [`TileHoard`](super::TileHoard) facade.
#[derive(Debug)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    Config(ConfigError),

    /// The HTTP client could not be created.
    HttpClient(ProviderError),

    /// No region with this name is configured.
    UnknownRegion { name: String, available: Vec<String> },

    /// The run failed before it could produce a report.
    Run(RunError),
}

impl AppError {
    /// Errors caused by configuration or user input rather than the run.
    pub fn is_config_error(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::UnknownRegion { .. })
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            AppError::UnknownRegion { name, available } => {
                if available.is_empty() {
                    write!(f, "Region '{}' not found; no regions are configured", name)
                } else {
                    write!(
                        f,
                        "Region '{}' not found. Available regions: {}",
                        name,
                        available.join(", ")
                    )
                }
            }
            AppError::Run(e) => write!(f, "Download failed: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::HttpClient(e) => Some(e),
            AppError::UnknownRegion { .. } => None,
            AppError::Run(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<RunError> for AppError {
    fn from(e: RunError) -> Self {
        AppError::Run(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_region_lists_available() {
        let err = AppError::UnknownRegion {
            name: "atlantis".to_string(),
            available: vec!["doha".to_string(), "qatar".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Region 'atlantis' not found. Available regions: doha, qatar"
        );
        assert!(err.is_config_error());
    }

    #[test]
    fn test_app_error_from_config_error() {
        let app_err: AppError = ConfigError::NoServers.into();
        assert!(matches!(app_err, AppError::Config(_)));
        assert!(app_err.to_string().contains("Configuration error"));
    }
}
