//! Integrity check of every file a profile references.

use std::fmt;
use std::path::PathBuf;

use crate::digest::sample_digest;
use crate::model::{Profile, ShardFile};

/// Why a file failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Unreadable(String),
    SizeMismatch { expected: u64, actual: u64 },
    DigestMismatch { expected: String, actual: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unreadable(e) => write!(f, "unreadable: {e}"),
            FailureReason::SizeMismatch { expected, actual } => {
                write!(f, "size {actual}, expected {expected}")
            }
            FailureReason::DigestMismatch { expected, actual } => {
                write!(f, "digest {actual}, expected {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
}

fn check(file: &ShardFile) -> Option<FailureReason> {
    let actual = match std::fs::metadata(&file.path) {
        Ok(m) => m.len(),
        Err(e) => return Some(FailureReason::Unreadable(e.to_string())),
    };
    if actual != file.size {
        return Some(FailureReason::SizeMismatch {
            expected: file.size,
            actual,
        });
    }
    let expected = file.digest.as_ref()?;
    match sample_digest(&file.path) {
        Ok(actual) if &actual == expected => None,
        Ok(actual) => Some(FailureReason::DigestMismatch {
            expected: expected.clone(),
            actual,
        }),
        Err(e) => Some(FailureReason::Unreadable(e.to_string())),
    }
}

/// Check size, and digest where recorded, of every shard and overflow file.
///
/// An empty result means the archive matches the profile.
pub fn verify(profile: &Profile) -> Vec<VerifyFailure> {
    let mut failures = Vec::new();
    let mut checked = 0usize;
    for file in profile.files() {
        checked += 1;
        if let Some(reason) = check(file) {
            tracing::error!(path = %file.path.display(), %reason, "verification failed");
            failures.push(VerifyFailure {
                path: file.path.clone(),
                reason,
            });
        }
    }
    tracing::info!(checked, failed = failures.len(), "verification complete");
    failures
}

impl Profile {
    /// See [`verify`].
    pub fn verify(&self) -> Vec<VerifyFailure> {
        verify(self)
    }
}
