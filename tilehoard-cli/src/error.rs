//! CLI error handling with user-friendly messages.
//!
//! Exit codes: `1` when a run failed or was aborted, `2` for configuration
//! and usage problems.

use std::fmt;
use std::process;

use tilehoard::{AppError, RunState};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration or usage error
    Config(String),
    /// Error from the library
    App(AppError),
    /// Failed to start the async runtime or signal handler
    Runtime(String),
    /// The run finished but not every tile was downloaded
    Incomplete { state: RunState, failed: u64 },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::App(e) if e.is_config_error() => 2,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::App(AppError::Config(_)) = self {
            eprintln!();
            eprintln!("The configuration is read from, in order:");
            eprintln!("  1. the path given with --config");
            eprintln!("  2. ./config.json");
            eprintln!("  3. the user config directory (tilehoard/config.json)");
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Incomplete { state, failed } => match state {
                RunState::Aborted(reason) => write!(f, "Download aborted: {}", reason),
                _ => write!(f, "Download finished with {} failed tiles", failed),
            },
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilehoard::AbortReason;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("bad".into()).exit_code(), 2);
        let unknown = CliError::App(AppError::UnknownRegion {
            name: "x".into(),
            available: vec![],
        });
        assert_eq!(unknown.exit_code(), 2);
        let aborted = CliError::Incomplete {
            state: RunState::Aborted(AbortReason::Cancelled),
            failed: 0,
        };
        assert_eq!(aborted.exit_code(), 1);
        assert_eq!(aborted.to_string(), "Download aborted: cancelled");
    }

    #[test]
    fn test_incomplete_display() {
        let err = CliError::Incomplete {
            state: RunState::Completed,
            failed: 4,
        };
        assert_eq!(err.to_string(), "Download finished with 4 failed tiles");
        assert_eq!(err.exit_code(), 1);
    }
}
