//! Baseline settings merged into every profile descriptor.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

const URL_PREFIXES: &[(&str, &str)] = &[
    ("bitbucket.org", "bitbucket.org"),
    ("gitlab.com", "gitlab.com"),
    ("android.googlesource.com", "android.googlesource.com"),
    ("bioconductor.org", "bioconductor.org"),
    ("drupal.com", "git.drupal.org"),
    ("git.eclipse.org", "git.eclipse.org"),
    ("git.kernel.org", "git.kernel.org"),
    ("git.postgresql.org", "git.postgresql.org"),
    ("git.savannah.gnu.org", "git.savannah.gnu.org"),
    ("git.zx2c4.com", "git.zx2c4.com"),
    ("gitlab.gnome.org", "gitlab.gnome.org"),
    ("kde.org", "anongit.kde.org"),
    ("repo.or.cz", "repo.or.cz"),
    ("salsa.debian.org", "salsa.debian.org"),
    ("sourceforge.net", "git.code.sf.net/p"),
];

const IGNORED_AUTHORS: &[&str] = &["GitHub Merge Button <merge-button@github.com>"];

/// URL-prefix table, ignored-author list and any extra top-level keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Project-name prefix → clone host, for non-GitHub forges.
    pub url_prefixes: BTreeMap<String, String>,
    /// Authors excluded from author-centric relations.
    pub ignored_authors: Vec<String>,
    /// Unknown keys are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            url_prefixes: URL_PREFIXES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ignored_authors: IGNORED_AUTHORS.iter().map(|a| a.to_string()).collect(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Preset {
    /// Load a preset file. Keys it omits keep their built-in values.
    pub fn load(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;
        let mut preset: Preset = serde_json::from_str(&json).map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        // Descriptor sections never come from a preset.
        preset.extra.remove("maps");
        preset.extra.remove("objects");
        Ok(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = Preset::default();
        assert_eq!(p.url_prefixes["sourceforge.net"], "git.code.sf.net/p");
        assert_eq!(p.url_prefixes["kde.org"], "anongit.kde.org");
        assert_eq!(p.url_prefixes.len(), 15);
        assert_eq!(p.ignored_authors.len(), 1);
    }

    #[test]
    fn load_overrides_and_keeps_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(
            &path,
            r#"{"ignored_authors": ["bot <bot@example.com>"], "maps": {}, "mirror": "x"}"#,
        )
        .unwrap();
        let p = Preset::load(&path).unwrap();
        assert_eq!(p.ignored_authors, vec!["bot <bot@example.com>"]);
        assert_eq!(p.url_prefixes, Preset::default().url_prefixes);
        assert_eq!(p.extra.len(), 1);
        assert_eq!(p.extra["mirror"], "x");
    }

    #[test]
    fn load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(Preset::load(&path), Err(ProfileError::Json { .. })));
    }
}
