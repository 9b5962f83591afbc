use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading shard, blob and overflow files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not present in the shard.
    #[error("key {key} not found in {}", path.display())]
    NotFound { key: String, path: PathBuf },

    /// The file could not be opened or read.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is structurally invalid.
    #[error("corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The file uses a format option this reader does not handle.
    #[error("unsupported file {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    /// A thread panicked while holding a shared lock.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        StoreError::NotFound {
            key: key.into(),
            path: path.into(),
        }
    }

    /// True for a missing key, as opposed to a failed read.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
