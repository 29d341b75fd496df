//! Provider error types and response classification.

use thiserror::Error;

/// Errors that can occur while fetching a tile from an upstream server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Request exceeded the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection could not be established or was reset.
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// Headers arrived but the body could not be read.
    #[error("failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },

    /// The HTTP client itself could not be built or the request was malformed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ProviderError {
    /// Status code of the response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The provider does not have this tile (e.g. open ocean).
    ///
    /// This is an expected answer, not a server fault.
    pub fn is_tile_absent(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }

    /// Worth retrying, possibly on another server.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderError::Timeout { .. }
            | ProviderError::Connection { .. }
            | ProviderError::Body { .. } => true,
            ProviderError::Client(_) => false,
        }
    }
}
