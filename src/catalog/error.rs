//! Error types for the catalog store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, saving or rebuilding the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No persisted catalog exists yet.
    #[error("no catalog at {path}")]
    NotFound {
        /// Expected catalog location.
        path: PathBuf,
    },

    /// The persisted catalog cannot be read as a versioned snapshot.
    #[error("corrupt catalog cache at {path}: {reason}\n  Suggestion: regenerate the catalog")]
    Corrupt {
        /// Catalog location.
        path: PathBuf,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The persisted catalog was written by an incompatible format version.
    #[error("catalog at {path} has format version {found}, expected {expected}")]
    VersionMismatch {
        /// Catalog location.
        path: PathBuf,
        /// Version tag found on disk.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// The remote index document could not be parsed.
    #[error("invalid remote index: {reason}")]
    Index {
        /// Underlying parser message.
        reason: String,
    },

    /// File system error while reading or writing the catalog.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot serialization failed.
    #[error("catalog serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CatalogError {
    /// Creates a corrupt-cache error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an index parse error.
    pub fn index(reason: impl Into<String>) -> Self {
        Self::Index {
            reason: reason.into(),
        }
    }

    /// Returns true when the only sensible recovery is a full regeneration.
    #[must_use]
    pub fn requires_regeneration(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Corrupt { .. } | Self::VersionMismatch { .. }
        )
    }
}
