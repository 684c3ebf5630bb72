//! Error types for scanning operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::node::ErrorReason;

/// Errors that stop a scan from producing a usable tree.
///
/// Failures below the root never surface here; they become error nodes.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for the root path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Root path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid options.
    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }

    /// Reason recorded on the root error node for this failure.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::PermissionDenied { .. } => ErrorReason::PermissionDenied,
            Self::NotFound { .. } => ErrorReason::VanishedDuringScan,
            Self::Io { .. } | Self::NotADirectory { .. } | Self::InvalidOptions { .. } => {
                ErrorReason::Unreadable
            }
        }
    }
}
