//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the disk cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory or file could not be prepared
    #[error("Setup failed for {}: {reason}", path.display())]
    Setup { path: PathBuf, reason: String },

    /// Namespace name cannot be mapped to a cache file
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Value could not be encoded, or a cached value does not fit the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Producer passed to a compute-on-miss call failed
    #[error("Producer failed: {0}")]
    Invocation(String),

    /// Flushing a cache file to disk failed
    #[error("Write failed for {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub(crate) fn setup(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CacheError::Setup {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Write {
            path: path.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, CacheError>;
