use thiserror::Error;
use woc_codec::CodecError;
use woc_profile::ProfileError;
use woc_store::StoreError;

/// Broad category of a query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The key is absent from every consulted version.
    NotFound,
    /// Unknown name, unmatched version, malformed key or profile.
    Configuration,
    /// The record exists but cannot be decoded.
    Decode,
    /// A shard file could not be opened or read.
    StorageIo,
}

#[derive(Debug, Error)]
pub enum WocError {
    #[error("key {key} not found in {name}")]
    NotFound { name: String, key: String },

    #[error("unknown map or object: {0}")]
    UnknownName(String),

    #[error("no version of {name} matches {requested}")]
    VersionNotFound { name: String, requested: String },

    #[error("invalid key for {name}: {reason}")]
    InvalidKey { name: String, reason: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("decode error: {0}")]
    Codec(#[from] CodecError),
}

impl WocError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WocError::NotFound { .. } => ErrorKind::NotFound,
            WocError::Store(e) if e.is_not_found() => ErrorKind::NotFound,
            WocError::Store(_) => ErrorKind::StorageIo,
            WocError::Codec(_) => ErrorKind::Decode,
            WocError::UnknownName(_)
            | WocError::VersionNotFound { .. }
            | WocError::InvalidKey { .. }
            | WocError::Unsupported(_)
            | WocError::Profile(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type WocResult<T> = Result<T, WocError>;
