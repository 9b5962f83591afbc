//! Build a [`Profile`] by walking archive directories.
//!
//! Every candidate file is classified by [`FileName::parse`] and grouped:
//! relation shards by `(src2dst, version)`, overflow files into the owning
//! version's `larges`, content shards by `name.ext`. Groups are then
//! densified into `2^sharding_bits` slots, where `sharding_bits` is the
//! bit length of the largest index seen.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;
use woc_codec::{infer_dtype, Dtype};

use crate::digest::sample_digest;
use crate::error::{ProfileError, ProfileResult};
use crate::grammar::{bit_length, is_candidate, FileName};
use crate::model::{ContentStore, Profile, RelationMap, ShardFile};
use crate::preset::Preset;

/// Directory whose `sha1.blob_*` files duplicate the main blob index.
const LEGACY_BLOB_DIR: &str = "All.sha1";

/// Per-node mounts whose real paths are preferred over symlinks.
static NODE_MOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/da[0-9]+").expect("valid mount pattern"));

/// Options for [`scan`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Only keep relation shards of this version.
    pub version: Option<String>,
    /// Drop map versions and objects with missing shards.
    pub strict: bool,
    /// Compute a sampled digest for every file.
    pub with_digest: bool,
    /// Preset file merged into the profile; built-in defaults otherwise.
    pub preset: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            version: None,
            strict: true,
            with_digest: false,
            preset: None,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_digest(mut self, with_digest: bool) -> Self {
        self.with_digest = with_digest;
        self
    }

    pub fn preset(mut self, path: impl Into<PathBuf>) -> Self {
        self.preset = Some(path.into());
        self
    }
}

struct MapGroup {
    src: String,
    dst: String,
    sharding_bits: u8,
    shards: BTreeMap<u64, PathBuf>,
    larges: BTreeMap<String, PathBuf>,
    dtype: Dtype,
}

struct ObjectGroup {
    stem: String,
    ext: String,
    sharding_bits: u8,
    shards: BTreeMap<u64, PathBuf>,
}

#[derive(Default)]
struct Collector {
    maps: BTreeMap<String, BTreeMap<String, MapGroup>>,
    objects: BTreeMap<String, ObjectGroup>,
}

impl Collector {
    fn add(&mut self, dir: &Path, file: &str, version: Option<&str>) {
        let path = dir.join(file);
        match FileName::parse(file) {
            Some(FileName::RelationShard {
                src,
                dst,
                version: ver,
                index,
            }) => self.add_map(path, src, dst, ver, index, None, version),
            Some(FileName::Overflow {
                src,
                dst,
                version: ver,
                index,
                fingerprint,
            }) => self.add_map(path, src, dst, ver, index, Some(fingerprint), version),
            Some(FileName::ContentShard { name, index, ext }) => {
                if dir.to_string_lossy().ends_with(LEGACY_BLOB_DIR) {
                    return;
                }
                tracing::debug!(file, index, "found object shard");
                let group = self
                    .objects
                    .entry(format!("{name}.{ext}"))
                    .or_insert_with(|| ObjectGroup {
                        stem: name,
                        ext,
                        sharding_bits: 0,
                        shards: BTreeMap::new(),
                    });
                group.sharding_bits = group.sharding_bits.max(bit_length(index));
                group.shards.insert(index, path);
            }
            None => tracing::warn!(file, "unrecognized file"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_map(
        &mut self,
        path: PathBuf,
        src: String,
        dst: String,
        ver: String,
        index: Option<u64>,
        fingerprint: Option<String>,
        wanted: Option<&str>,
    ) {
        if wanted.is_some_and(|w| w != ver) {
            tracing::info!(path = %path.display(), version = %ver, "skipping map of another version");
            return;
        }
        let name = format!("{src}2{dst}");
        let index = index.unwrap_or(0);

        let versions = self.maps.entry(name.clone()).or_default();
        let group = match versions.entry(ver) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let dtype = match infer_dtype(&name) {
                    Ok(d) => d,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "cannot infer map types");
                        return;
                    }
                };
                e.insert(MapGroup {
                    src,
                    dst,
                    sharding_bits: 0,
                    shards: BTreeMap::new(),
                    larges: BTreeMap::new(),
                    dtype,
                })
            }
        };
        group.sharding_bits = group.sharding_bits.max(bit_length(index));
        match fingerprint {
            None => {
                tracing::debug!(path = %path.display(), index, "found map shard");
                group.shards.insert(index, path);
            }
            Some(fp) => {
                tracing::debug!(path = %path.display(), fingerprint = %fp, "found overflow file");
                group.larges.insert(fp, path);
            }
        }
    }
}

/// Lay `found` out in `2^bits` slots. Missing slots are filled by `sibling`
/// unless `strict`, in which case `None` is returned.
fn densify(
    what: &str,
    bits: u8,
    found: &BTreeMap<u64, PathBuf>,
    strict: bool,
    sibling: impl Fn(&Path, u64) -> PathBuf,
) -> Option<Vec<PathBuf>> {
    let slots = 1u64 << bits;
    let missing: Vec<u64> = (0..slots).filter(|i| !found.contains_key(i)).collect();
    if !missing.is_empty() {
        let list = missing
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if strict {
            tracing::warn!("cannot find shards {list} in {what}, skipping");
            return None;
        }
        tracing::warn!("cannot find shards {list} in {what}, keeping expected paths");
    }
    // A group always has at least one shard or overflow file; overflow-only
    // groups fall back to an empty directory.
    let dir = found
        .values()
        .next()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Some(
        (0..slots)
            .map(|i| found.get(&i).cloned().unwrap_or_else(|| sibling(&dir, i)))
            .collect(),
    )
}

/// Prefer the real path of files reached through a node mount symlink.
fn resolve_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(real) if real != path && NODE_MOUNT_RE.is_match(&real.to_string_lossy()) => {
            tracing::warn!(from = %path.display(), to = %real.display(), "resolved node mount");
            real
        }
        _ => path.to_path_buf(),
    }
}

fn shard_file(path: &Path, with_digest: bool) -> ProfileResult<ShardFile> {
    // Slots kept for missing shards have no file behind them.
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ShardFile::new(path, 0));
        }
        Err(e) => return Err(ProfileError::io(path, e)),
    };
    if meta.is_dir() {
        return Err(ProfileError::io(path, std::io::Error::other("is a directory")));
    }
    let mut file = ShardFile::new(resolve_path(path), meta.len());
    if with_digest {
        file.digest = Some(sample_digest(path).map_err(|e| ProfileError::io(path, e))?);
    }
    Ok(file)
}

/// Stat every file of a group. One unreadable file drops the whole group.
fn stat_group<K: Ord>(
    what: &str,
    paths: impl IntoIterator<Item = (K, PathBuf)>,
    with_digest: bool,
) -> Option<BTreeMap<K, ShardFile>> {
    let mut files = BTreeMap::new();
    for (key, path) in paths {
        match shard_file(&path, with_digest) {
            Ok(file) => {
                files.insert(key, file);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot read {what}, skipping");
                return None;
            }
        }
    }
    Some(files)
}

fn alias_for(object: &str) -> Option<&'static str> {
    match object {
        "tree.tch" => Some("tree"),
        "commit.tch" => Some("commit"),
        "sha1.blob.tch" => Some("blob"),
        _ => None,
    }
}

/// Walk `roots` and build a profile.
///
/// Unrecognized files, incomplete groups and groups with an unreadable file
/// are logged and skipped. Only an unreadable preset is an error.
pub fn scan<P: AsRef<Path>>(roots: &[P], opts: &ScanOptions) -> ProfileResult<Profile> {
    let preset = match &opts.preset {
        Some(path) => Preset::load(path)?,
        None => Preset::default(),
    };

    let mut collector = Collector::default();
    for root in roots {
        for entry in WalkDir::new(root.as_ref()).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot walk directory entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(file) = entry.file_name().to_str() else {
                tracing::warn!(path = %entry.path().display(), "non UTF-8 file name");
                continue;
            };
            if !is_candidate(file) {
                continue;
            }
            let dir = entry.path().parent().unwrap_or(Path::new(""));
            collector.add(dir, file, opts.version.as_deref());
        }
    }

    let mut maps = BTreeMap::new();
    for (name, versions) in collector.maps {
        let mut kept = Vec::new();
        for (ver, group) in versions {
            let what = format!("map {name} version {ver}");
            let sibling =
                |dir: &Path, i: u64| dir.join(format!("{}2{}Full{ver}.{i}.tch", group.src, group.dst));
            let Some(paths) = densify(&what, group.sharding_bits, &group.shards, opts.strict, sibling)
            else {
                continue;
            };
            let Some(shards) = stat_group(&what, paths.into_iter().enumerate(), opts.with_digest)
            else {
                continue;
            };
            let Some(larges) = stat_group(&what, group.larges, opts.with_digest) else {
                continue;
            };
            kept.push(RelationMap {
                name: name.clone(),
                version: ver,
                sharding_bits: group.sharding_bits,
                shards: shards.into_values().collect(),
                larges,
                dtype: group.dtype,
            });
        }
        if !kept.is_empty() {
            maps.insert(name, kept);
        }
    }

    let mut objects = BTreeMap::new();
    for (name, group) in collector.objects {
        let what = format!("object {name}");
        let sibling = |dir: &Path, i: u64| dir.join(format!("{}_{i}.{}", group.stem, group.ext));
        let Some(paths) = densify(&what, group.sharding_bits, &group.shards, opts.strict, sibling)
        else {
            continue;
        };
        let Some(shards) = stat_group(&what, paths.into_iter().enumerate(), opts.with_digest)
        else {
            continue;
        };
        objects.insert(
            name.clone(),
            ContentStore {
                alias: alias_for(&name).map(str::to_string),
                name,
                sharding_bits: group.sharding_bits,
                shards: shards.into_values().collect(),
            },
        );
    }

    let profile = Profile::new(maps, objects, preset)?;
    tracing::info!(
        maps = profile.maps().count(),
        objects = profile.objects().count(),
        "scan complete"
    );
    Ok(profile)
}

impl Profile {
    /// Shorthand for [`scan`].
    pub fn scan<P: AsRef<Path>>(roots: &[P], opts: &ScanOptions) -> ProfileResult<Self> {
        scan(roots, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woc_codec::ValueKind;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }

    fn versions(p: &Profile, name: &str) -> Vec<String> {
        p.map_versions(name)
            .map(|vs| vs.iter().map(|m| m.version.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn groups_and_sorts_versions() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["c2pFullT.0.tch", "c2pFullT.1.tch", "c2pFullU.0.tch", "c2pFullU.1.tch", "c2pFullAA.tch"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new()).unwrap();
        assert_eq!(versions(&p, "c2p"), vec!["AA", "U", "T"]);
        let newest = &p.map_versions("c2p").unwrap()[0];
        assert_eq!(newest.sharding_bits, 0);
        assert_eq!(newest.shards.len(), 1);
        assert_eq!(newest.dtype.value, ValueKind::CompressedTexts);
        let u = &p.map_versions("c2p").unwrap()[1];
        assert_eq!(u.sharding_bits, 1);
        assert_eq!(u.shards[1].path, dir.path().join("c2pFullU.1.tch"));
        assert_eq!(u.shards[1].size, "c2pFullU.1.tch".len() as u64);
    }

    #[test]
    fn strict_drops_incomplete_version() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["c2pFullU.0.tch", "c2pFullU.1.tch", "c2pFullU.3.tch", "c2pFullT.0.tch"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new()).unwrap();
        assert_eq!(versions(&p, "c2p"), vec!["T"]);
    }

    #[test]
    fn lenient_fills_missing_slots() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["c2pFullU.0.tch", "c2pFullU.1.tch", "c2pFullU.3.tch"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new().strict(false)).unwrap();
        let m = &p.map_versions("c2p").unwrap()[0];
        assert_eq!(m.shards.len(), 4);
        assert_eq!(m.shards[2].path, dir.path().join("c2pFullU.2.tch"));
        assert_eq!(m.shards[2].size, 0);
    }

    #[test]
    fn version_filter() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["c2pFullU.tch", "c2pFullV.tch", "a2cFullV.tch"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new().version("U")).unwrap();
        assert_eq!(versions(&p, "c2p"), vec!["U"]);
        assert!(p.map_versions("a2c").is_none());
    }

    #[test]
    fn overflow_files_go_to_larges() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["A2cFullU.0.tch", "A2cFullU.1.tch", "A2cFullU.1.tch.large.59016a4f"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new()).unwrap();
        let m = &p.map_versions("A2c").unwrap()[0];
        assert_eq!(m.shards.len(), 2);
        assert_eq!(
            m.larges["59016a4f"].path,
            dir.path().join("A2cFullU.1.tch.large.59016a4f")
        );
    }

    #[test]
    fn objects_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["commit_0.tch", "commit_1.tch", "sha1.blob_0.tch", "blob_0.bin", "notes.tch.txt", "pack-1.idx"] {
            touch(dir.path(), f);
        }
        let p = scan(&[dir.path()], &ScanOptions::new()).unwrap();
        assert_eq!(p.object("commit").unwrap().sharding_bits, 1);
        assert_eq!(p.object("blob").unwrap().name, "sha1.blob.tch");
        assert!(p.object("blob.bin").unwrap().alias.is_none());
        assert_eq!(p.objects().count(), 3);
    }

    #[test]
    fn skips_legacy_blob_dir() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("All.sha1");
        std::fs::create_dir(&legacy).unwrap();
        touch(&legacy, "sha1.blob_0.tch");
        touch(dir.path(), "tree_0.tch");
        let p = scan(&[dir.path()], &ScanOptions::new()).unwrap();
        assert!(p.object("blob").is_none());
        assert!(p.object("tree").is_some());
    }

    #[test]
    fn digests_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "c2pFullU.tch");
        let p = scan(&[dir.path()], &ScanOptions::new().with_digest(true)).unwrap();
        let digest = p.map_versions("c2p").unwrap()[0].shards[0].digest.clone();
        assert_eq!(digest.unwrap().len(), 16);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_drops_only_its_group() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "c2rFullU.tch");
        touch(dir.path(), "commit_0.tch");
        let elsewhere = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("c2pFullU.tch")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("tree_0.tch")).unwrap();

        for with_digest in [false, true] {
            let opts = ScanOptions::new().with_digest(with_digest);
            let p = scan(&[dir.path()], &opts).unwrap();
            assert!(p.map_versions("c2p").is_none());
            assert_eq!(versions(&p, "c2r"), vec!["U"]);
            assert!(p.object("tree").is_none());
            assert!(p.object("commit").is_some());
        }
    }

    #[test]
    fn multiple_roots() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch(a.path(), "c2pFullU.0.tch");
        touch(b.path(), "c2pFullU.1.tch");
        let p = scan(&[a.path(), b.path()], &ScanOptions::new()).unwrap();
        let m = &p.map_versions("c2p").unwrap()[0];
        assert_eq!(m.shards[1].path, b.path().join("c2pFullU.1.tch"));
    }
}
