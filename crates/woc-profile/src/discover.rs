//! Locating a profile descriptor when none is given explicitly.

use std::path::PathBuf;

use crate::error::{ProfileError, ProfileResult};
use crate::model::Profile;

/// Environment variable naming a profile descriptor.
pub const PROFILE_ENV: &str = "WOC_PROFILE";

/// Descriptor file name searched in the working and home directories.
pub const PROFILE_FILE: &str = "wocprofile.json";

/// Search locations in priority order.
pub fn candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = std::env::var_os(PROFILE_ENV).filter(|p| !p.is_empty()) {
        paths.push(PathBuf::from(p));
    }
    paths.push(PathBuf::from(PROFILE_FILE));
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        paths.push(PathBuf::from(home).join(format!(".{PROFILE_FILE}")));
    }
    paths.push(PathBuf::from("/etc").join(PROFILE_FILE));
    paths
}

/// First existing candidate.
pub fn discover() -> ProfileResult<PathBuf> {
    let paths = candidates();
    match paths.iter().find(|p| p.is_file()) {
        Some(p) => {
            tracing::debug!(path = %p.display(), "using profile");
            Ok(p.clone())
        }
        None => Err(ProfileError::NotFound(paths)),
    }
}

impl Profile {
    /// Load the first profile found by [`discover`].
    pub fn discover() -> ProfileResult<Self> {
        Profile::load(discover()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_order() {
        let paths = candidates();
        assert_eq!(paths.last().unwrap(), &PathBuf::from("/etc/wocprofile.json"));
        assert!(paths.contains(&PathBuf::from("wocprofile.json")));
    }

    #[test]
    fn not_found_lists_candidates() {
        let err = ProfileError::NotFound(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(err.to_string(), "no profile found; searched /a, /b");
    }
}
