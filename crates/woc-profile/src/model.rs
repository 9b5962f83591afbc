//! The profile: every relation map and content store of an archive.
//!
//! A [`Profile`] is built once (by [`crate::scan`] or from a saved
//! descriptor) and never changes afterwards. Its JSON form is:
//!
//! ```text
//! {
//!   "url_prefixes": {...}, "ignored_authors": [...],
//!   "maps":    { "c2p": [ {version, sharding_bits, shards, larges, dtypes}, ... ] },
//!   "objects": { "commit.tch": {sharding_bits, shards, alias?} }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use woc_codec::Dtype;

use crate::error::{ProfileError, ProfileResult};
use crate::preset::Preset;
use crate::version::compare_versions;

/// One physical file of the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFile {
    pub path: PathBuf,
    #[serde(default)]
    pub size: u64,
    /// Sampled digest, when computed at scan time.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ShardFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            digest: None,
        }
    }
}

/// Access to a dense, power-of-two shard array.
pub trait Sharded {
    fn sharding_bits(&self) -> u8;

    fn shards(&self) -> &[ShardFile];

    /// Mask selecting a shard index from a routing hash.
    fn shard_mask(&self) -> u64 {
        (1u64 << self.sharding_bits()) - 1
    }

    /// Shard a routing hash lands in.
    fn shard_for(&self, hash: u64) -> Option<&ShardFile> {
        self.shards().get((hash & self.shard_mask()) as usize)
    }
}

/// A content store such as `commit.tch` or `blob.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStore {
    #[serde(skip)]
    pub name: String,
    pub sharding_bits: u8,
    pub shards: Vec<ShardFile>,
    /// Short name used by `show_content`, e.g. `commit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Sharded for ContentStore {
    fn sharding_bits(&self) -> u8 {
        self.sharding_bits
    }

    fn shards(&self) -> &[ShardFile] {
        &self.shards
    }
}

/// One version of a relation map such as `c2p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMap {
    #[serde(skip)]
    pub name: String,
    pub version: String,
    pub sharding_bits: u8,
    pub shards: Vec<ShardFile>,
    /// Overflow files keyed by hex key fingerprint.
    #[serde(default)]
    pub larges: BTreeMap<String, ShardFile>,
    #[serde(rename = "dtypes")]
    pub dtype: Dtype,
}

impl Sharded for RelationMap {
    fn sharding_bits(&self) -> u8 {
        self.sharding_bits
    }

    fn shards(&self) -> &[ShardFile] {
        &self.shards
    }
}

#[derive(Serialize, Deserialize)]
struct Descriptor {
    #[serde(flatten)]
    preset: Preset,
    #[serde(default)]
    maps: BTreeMap<String, Vec<RelationMap>>,
    #[serde(default)]
    objects: BTreeMap<String, ContentStore>,
}

/// Immutable registry of an archive's relation maps and content stores.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    maps: BTreeMap<String, Vec<RelationMap>>,
    objects: BTreeMap<String, ContentStore>,
    preset: Preset,
}

fn check_dense(what: &str, bits: u8, shards: &[ShardFile]) -> ProfileResult<()> {
    if bits >= 32 {
        return Err(ProfileError::Invalid(format!(
            "{what}: sharding_bits {bits} out of range"
        )));
    }
    let expected = 1usize << bits;
    if shards.len() != expected {
        return Err(ProfileError::Invalid(format!(
            "{what}: {} shards, expected {expected} for {bits} bits",
            shards.len()
        )));
    }
    Ok(())
}

impl Profile {
    /// Build a profile, checking that every shard array is dense.
    ///
    /// Map versions are ordered newest first.
    pub fn new(
        maps: BTreeMap<String, Vec<RelationMap>>,
        objects: BTreeMap<String, ContentStore>,
        preset: Preset,
    ) -> ProfileResult<Self> {
        let mut maps = maps;
        let mut objects = objects;
        for (name, versions) in maps.iter_mut() {
            if versions.is_empty() {
                return Err(ProfileError::Invalid(format!("map {name} has no versions")));
            }
            for m in versions.iter_mut() {
                m.name.clone_from(name);
                let what = format!("map {name} version {}", m.version);
                check_dense(&what, m.sharding_bits, &m.shards)?;
            }
            versions.sort_by(|a, b| compare_versions(&b.version, &a.version));
        }
        for (name, obj) in objects.iter_mut() {
            obj.name.clone_from(name);
            check_dense(&format!("object {name}"), obj.sharding_bits, &obj.shards)?;
        }
        Ok(Self {
            maps,
            objects,
            preset,
        })
    }

    /// Parse a descriptor.
    pub fn from_json(json: &str) -> ProfileResult<Self> {
        let d: Descriptor = serde_json::from_str(json)?;
        Self::new(d.maps, d.objects, d.preset)
    }

    /// Load a descriptor file.
    pub fn load(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;
        let profile = Self::from_json(&json).map_err(|e| match e {
            ProfileError::Parse(source) => ProfileError::Json {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            maps = profile.maps.len(),
            objects = profile.objects.len(),
            "loaded profile"
        );
        Ok(profile)
    }

    /// Serialize to a descriptor.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Descriptor {
            preset: self.preset.clone(),
            maps: self.maps.clone(),
            objects: self.objects.clone(),
        })
    }

    /// Write the descriptor to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> ProfileResult<()> {
        let path = path.as_ref();
        let json = self.to_json().map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|e| ProfileError::io(path, e))
    }

    /// Versions of a relation map, newest first.
    pub fn map_versions(&self, name: &str) -> Option<&[RelationMap]> {
        self.maps.get(name).map(Vec::as_slice)
    }

    /// Every map version in the profile.
    pub fn maps(&self) -> impl Iterator<Item = &RelationMap> {
        self.maps.values().flatten()
    }

    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    /// A content store by name (`commit.tch`) or alias (`commit`).
    pub fn object(&self, name: &str) -> Option<&ContentStore> {
        self.objects.get(name).or_else(|| {
            self.objects
                .values()
                .find(|o| o.alias.as_deref() == Some(name))
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &ContentStore> {
        self.objects.values()
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Every file the profile references, overflow files included.
    pub fn files(&self) -> impl Iterator<Item = &ShardFile> {
        self.maps()
            .flat_map(|m| m.shards.iter().chain(m.larges.values()))
            .chain(self.objects().flat_map(|o| o.shards.iter()))
    }
}
