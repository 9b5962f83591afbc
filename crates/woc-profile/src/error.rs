use std::path::PathBuf;

use thiserror::Error;

/// Errors from building, loading or saving a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid profile JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// No profile file was found in any search location.
    #[error("no profile found; searched {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NotFound(Vec<PathBuf>),

    /// The descriptor parsed but violates a profile invariant.
    #[error("invalid profile: {0}")]
    Invalid(String),
}

impl ProfileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProfileError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;
