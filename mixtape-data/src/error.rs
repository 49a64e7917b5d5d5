//! Error types for dataset loading
//!
//! Every failure surfaces to the caller with its underlying cause attached.
//! Nothing here is retried or recovered.

use std::path::PathBuf;

use thiserror::Error;

use crate::dta::DtaError;
use crate::snapshot::SnapshotError;

/// Errors returned by the loader and the free `load_*` functions
#[derive(Debug, Error)]
pub enum MixtapeError {
    #[error("Filename must not be empty")]
    InvalidFilename,

    #[error("Request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {origin} as Stata data: {source}")]
    Parse {
        origin: String,
        #[source]
        source: DtaError,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl MixtapeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the network side (transport or HTTP status)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, MixtapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = MixtapeError::Status {
            url: "https://example.test/castle.dta".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "https://example.test/castle.dta returned HTTP 404"
        );
        assert!(err.is_network());
    }

    #[test]
    fn test_io_keeps_source() {
        use std::error::Error as _;

        let err = MixtapeError::io(
            "/nope/cache",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/nope/cache"));
        assert!(err.source().is_some());
        assert!(!err.is_network());
    }
}
