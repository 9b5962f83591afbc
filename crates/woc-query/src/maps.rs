//! [`WocMaps`]: lookups over a profile.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use woc_codec::{
    ber, decode_overflow_text, decode_text, decode_value, lzf, CodecError, Commit, KeyKind, Tag,
    TreeEntry, Value, ValueKind,
};
use woc_profile::{ContentStore, Profile, ProfileError, RelationMap, ShardFile, Sharded};
use woc_store::{
    read_overflow_text, read_span, recover_text_key, HandleCache, KeyIter, OverflowHashes,
    ShardTable, StoreError,
};

use crate::content::{Content, ObjectKind};
use crate::error::{WocError, WocResult};
use crate::key::Key;
use crate::options::QueryOptions;
use crate::router::{fingerprint, route, RoutedKey};

/// Content store holding blob bytes, addressed by `sha1.blob.tch` offsets.
const BLOB_DATA_STORE: &str = "blob.bin";

enum Target<'p> {
    /// Versions to consult, newest first.
    Map(Vec<&'p RelationMap>),
    Object(&'p ContentStore),
}

/// Read access to every map and content store of a profile.
///
/// Shard files are opened on first use and shared by all later queries,
/// including queries from other threads.
pub struct WocMaps {
    profile: Profile,
    options: QueryOptions,
    cache: HandleCache,
}

impl WocMaps {
    pub fn new(profile: Profile) -> Self {
        Self::with_options(profile, QueryOptions::default())
    }

    pub fn with_options(profile: Profile, options: QueryOptions) -> Self {
        Self::with_cache(profile, options, HandleCache::new())
    }

    /// Use a caller-provided handle cache.
    pub fn with_cache(profile: Profile, options: QueryOptions, cache: HandleCache) -> Self {
        Self {
            profile,
            options,
            cache,
        }
    }

    /// Load the profile at `path`, or the first one discovered.
    pub fn open(path: Option<&Path>, options: QueryOptions) -> WocResult<Self> {
        let profile = match path {
            Some(p) => Profile::load(p)?,
            None => Profile::discover()?,
        };
        Ok(Self::with_options(profile, options))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Map versions visible under the version filter.
    pub fn maps(&self) -> Vec<&RelationMap> {
        self.profile
            .map_names()
            .filter_map(|name| self.select_versions(name).ok())
            .flatten()
            .collect()
    }

    pub fn objects(&self) -> Vec<&ContentStore> {
        self.profile.objects().collect()
    }

    fn select_versions(&self, name: &str) -> WocResult<Vec<&RelationMap>> {
        let versions = self
            .profile
            .map_versions(name)
            .ok_or_else(|| WocError::UnknownName(name.to_string()))?;
        let selected: Vec<&RelationMap> = match &self.options.version {
            None => versions.iter().take(1).collect(),
            Some(filter) => versions.iter().filter(|m| filter.matches(&m.version)).collect(),
        };
        if selected.is_empty() {
            return Err(WocError::VersionNotFound {
                name: name.to_string(),
                requested: self
                    .options
                    .version
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            });
        }
        Ok(selected)
    }

    fn resolve(&self, name: &str) -> WocResult<Target<'_>> {
        if self.profile.map_versions(name).is_some() {
            return self.select_versions(name).map(Target::Map);
        }
        self.profile
            .object(name)
            .map(Target::Object)
            .ok_or_else(|| WocError::UnknownName(name.to_string()))
    }

    /// Swap unknown names and malformed keys for `empty` unless configured
    /// to raise.
    fn lenient<T>(&self, result: WocResult<T>, empty: impl FnOnce() -> T) -> WocResult<T> {
        match result {
            Err(e @ (WocError::UnknownName(_) | WocError::InvalidKey { .. })) => {
                if self.options.strict() {
                    Err(e)
                } else {
                    tracing::debug!(error = %e, "ignoring bad query");
                    Ok(empty())
                }
            }
            other => other,
        }
    }

    fn table(&self, file: &ShardFile) -> WocResult<Arc<dyn ShardTable>> {
        Ok(self.cache.get(&file.path)?)
    }

    fn shard_file<'t>(
        &self,
        target: &'t impl Sharded,
        name: &str,
        index: usize,
    ) -> WocResult<&'t ShardFile> {
        target.shards().get(index).ok_or_else(|| {
            WocError::Profile(ProfileError::Invalid(format!("{name} has no shard {index}")))
        })
    }

    /// Raw record for `routed` in its shard.
    fn read_record(
        &self,
        target: &impl Sharded,
        name: &str,
        routed: &RoutedKey,
        key: Key<'_>,
    ) -> WocResult<Vec<u8>> {
        let file = self.shard_file(target, name, routed.shard(target.sharding_bits()))?;
        self.table(file)?
            .get(&routed.bytes)?
            .ok_or_else(|| StoreError::not_found(key.to_string(), &file.path).into())
    }

    /// Overflow file serving `routed`, if overflow is enabled and one exists.
    fn overflow_for<'m>(&self, map: &'m RelationMap, routed: &RoutedKey) -> Option<&'m ShardFile> {
        if !self.options.include_large() {
            return None;
        }
        map.larges.get(&routed.fingerprint)
    }

    fn read_overflow(
        &self,
        map: &RelationMap,
        routed: &RoutedKey,
        file: &ShardFile,
    ) -> WocResult<Value> {
        tracing::debug!(map = %map.name, path = %file.path.display(), "reading overflow file");
        if map.dtype.value == ValueKind::Hashes {
            let hashes = OverflowHashes::open(&file.path, routed.bytes.len())?
                .map(|h| h.map(hex::encode))
                .collect::<Result<Vec<_>, StoreError>>()?;
            return Ok(Value::Hashes(hashes));
        }
        let (_, body) = read_overflow_text(&file.path)?;
        Ok(decode_overflow_text(map.dtype.value, &body)?)
    }

    fn lookup_version(&self, map: &RelationMap, key: Key<'_>) -> WocResult<Value> {
        let routed = route(&map.name, map.dtype.key, key)?;
        if let Some(file) = self.overflow_for(map, &routed) {
            return self.read_overflow(map, &routed, file);
        }
        let raw = self.read_record(map, &map.name, &routed, key)?;
        Ok(decode_value(map.dtype.value, &raw)?)
    }

    fn lookup(&self, name: &str, key: Key<'_>) -> WocResult<Value> {
        match self.resolve(name)? {
            Target::Map(versions) => {
                for map in versions {
                    match self.lookup_version(map, key) {
                        Err(e) if e.is_not_found() => {
                            tracing::debug!(map = name, version = %map.version, %key, "key not in version");
                        }
                        other => return other,
                    }
                }
                Err(WocError::NotFound {
                    name: name.to_string(),
                    key: key.to_string(),
                })
            }
            Target::Object(store) => {
                let kind = match store.name.as_str() {
                    "commit.tch" => ObjectKind::Commit,
                    "tree.tch" => ObjectKind::Tree,
                    other => {
                        return Err(WocError::Unsupported(format!(
                            "{other} cannot be read with get_values; use show_content"
                        )))
                    }
                };
                Ok(self.content(kind, store, key)?.into())
            }
        }
    }

    /// Decoded value of `key` in the map `name`.
    ///
    /// Versions are tried newest first; a key missing from all of them is
    /// [`WocError::NotFound`]. `commit.tch` and `tree.tch` are accepted as
    /// names and return the flattened object.
    pub fn get_values<'k>(&self, name: &str, key: impl Into<Key<'k>>) -> WocResult<Value> {
        let key = key.into();
        self.lenient(self.lookup(name, key), || Value::Texts(Vec::new()))
    }

    /// Like [`get_values`](Self::get_values), but yields the value in pieces.
    ///
    /// The granularity depends on where the value is stored. A key backed by
    /// a hash-list overflow file yields one [`Value::Hashes`] per hash, so a
    /// huge fan-out never sits in memory at once. Every other key, including
    /// text overflow keys, yields exactly one item holding the whole value.
    /// Concatenating the fields of all items gives the fields of
    /// `get_values` in either case.
    pub fn iter_values<'k>(&self, name: &str, key: impl Into<Key<'k>>) -> WocResult<ValueIter> {
        let key = key.into();
        let result = self.resolve(name).and_then(|target| match target {
            Target::Map(versions) => {
                for map in &versions {
                    let routed = route(&map.name, map.dtype.key, key)?;
                    if map.dtype.value == ValueKind::Hashes {
                        if let Some(file) = self.overflow_for(map, &routed) {
                            let hashes = OverflowHashes::open(&file.path, routed.bytes.len())?;
                            return Ok(ValueIter::Hashes(hashes));
                        }
                    }
                    match self.lookup_version(map, key) {
                        Err(e) if e.is_not_found() => continue,
                        other => return other.map(|v| ValueIter::Once(Some(v))),
                    }
                }
                Err(WocError::NotFound {
                    name: name.to_string(),
                    key: key.to_string(),
                })
            }
            Target::Object(_) => self.lookup(name, key).map(|v| ValueIter::Once(Some(v))),
        });
        self.lenient(result, || ValueIter::Once(None))
    }

    fn content_store(&self, kind: ObjectKind) -> WocResult<&ContentStore> {
        self.profile
            .object(kind.store_name())
            .or_else(|| self.profile.object(kind.as_str()))
            .ok_or_else(|| WocError::UnknownName(kind.to_string()))
    }

    /// Decompressed git object bytes; blobs are read from the blob store.
    fn object_bytes(
        &self,
        kind: ObjectKind,
        store: &ContentStore,
        key: Key<'_>,
    ) -> WocResult<Vec<u8>> {
        let routed = route(&store.name, KeyKind::Hash, key)?;
        let raw = self.read_record(store, &store.name, &routed, key)?;
        if kind != ObjectKind::Blob {
            return Ok(lzf::decompress(&raw)?);
        }
        let (offset, len) = match ber::decode(&raw)?.as_slice() {
            [offset, len, ..] => (*offset, *len),
            _ => {
                return Err(CodecError::Malformed {
                    what: "blob index",
                    reason: format!("expected offset and length, got {} bytes", raw.len()),
                }
                .into())
            }
        };
        let data_store = self
            .profile
            .object(BLOB_DATA_STORE)
            .ok_or_else(|| WocError::UnknownName(BLOB_DATA_STORE.to_string()))?;
        let index = routed.shard(data_store.sharding_bits);
        let file = self.shard_file(data_store, BLOB_DATA_STORE, index)?;
        let data = read_span(&file.path, offset, len)?;
        Ok(lzf::decompress_or_raw(&data))
    }

    fn content(&self, kind: ObjectKind, store: &ContentStore, key: Key<'_>) -> WocResult<Content> {
        let body = self.object_bytes(kind, store, key)?;
        Ok(match kind {
            ObjectKind::Commit => Content::Commit(Commit::decode(&body)?),
            ObjectKind::Tree => Content::Tree {
                entries: TreeEntry::decode_all(&body)?,
            },
            ObjectKind::Tag => Content::Tag(Tag::decode(&body)?),
            ObjectKind::Blob => Content::Blob { data: body },
        })
    }

    /// Decoded git object: `kind` is `commit`, `tree`, `blob` or `tag`.
    pub fn show_content<'k>(&self, kind: &str, key: impl Into<Key<'k>>) -> WocResult<Content> {
        let kind: ObjectKind = kind.parse()?;
        let store = self.content_store(kind)?;
        self.content(kind, store, key.into())
    }

    /// Undecoded body of a git object, as git would hash it minus the header.
    pub fn raw_object<'k>(&self, kind: &str, key: impl Into<Key<'k>>) -> WocResult<Vec<u8>> {
        let kind: ObjectKind = kind.parse()?;
        let store = self.content_store(kind)?;
        self.object_bytes(kind, store, key.into())
    }

    /// Number of keys in `name`: shard record counts plus overflow files.
    ///
    /// Maps are counted in their newest selected version.
    pub fn count(&self, name: &str) -> WocResult<u64> {
        let result = self.resolve(name).and_then(|target| {
            let (shards, larges) = match target {
                Target::Map(versions) => {
                    let map = versions[0];
                    let larges = if self.options.include_large() {
                        map.larges.len() as u64
                    } else {
                        0
                    };
                    (map.shards.as_slice(), larges)
                }
                Target::Object(store) => {
                    check_keyed(store)?;
                    (store.shards.as_slice(), 0)
                }
            };
            let mut total = larges;
            for file in shards {
                total += self.table(file)?.len();
            }
            Ok(total)
        });
        self.lenient(result, || 0)
    }

    /// Every key of `name`, shard by shard, then overflow keys.
    ///
    /// Hash keys are returned as hex, text keys as text. Maps are listed in
    /// their newest selected version.
    pub fn all_keys(&self, name: &str) -> WocResult<AllKeys<'_>> {
        let result = self.resolve(name).and_then(|target| match target {
            Target::Map(versions) => {
                let map = versions[0];
                let larges = if self.options.include_large() {
                    map.larges.iter().collect()
                } else {
                    Vec::new()
                };
                Ok(AllKeys {
                    cache: &self.cache,
                    kind: map.dtype.key,
                    hash_list: map.dtype.value == ValueKind::Hashes,
                    shards: map.shards.iter(),
                    current: None,
                    larges: larges.into_iter(),
                    skip: if self.options.include_large() {
                        Some(&map.larges)
                    } else {
                        None
                    },
                })
            }
            Target::Object(store) => {
                check_keyed(store)?;
                Ok(AllKeys {
                    cache: &self.cache,
                    kind: KeyKind::Hash,
                    hash_list: false,
                    shards: store.shards.iter(),
                    current: None,
                    larges: Vec::new().into_iter(),
                    skip: None,
                })
            }
        });
        self.lenient(result, || AllKeys::empty(&self.cache))
    }
}

/// Positional data stores have no keys to count or list.
fn check_keyed(store: &ContentStore) -> WocResult<()> {
    if store.name.ends_with(".tch") {
        Ok(())
    } else {
        Err(WocError::Unsupported(format!("{} is not a keyed store", store.name)))
    }
}

/// Pieces of a value, from [`WocMaps::iter_values`].
///
/// `Once` yields a single whole value. `Hashes` yields one single-hash
/// value per entry of the overflow file.
pub enum ValueIter {
    /// A value decoded in one step; `None` once yielded or when empty.
    Once(Option<Value>),
    /// Hashes streamed from an overflow file.
    Hashes(OverflowHashes),
}

impl Iterator for ValueIter {
    type Item = WocResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ValueIter::Once(v) => v.take().map(Ok),
            ValueIter::Hashes(hashes) => hashes.next().map(|h| {
                h.map(|h| Value::Hashes(vec![hex::encode(h)]))
                    .map_err(WocError::from)
            }),
        }
    }
}

/// Lazy key listing, from [`WocMaps::all_keys`].
pub struct AllKeys<'a> {
    cache: &'a HandleCache,
    kind: KeyKind,
    hash_list: bool,
    shards: std::slice::Iter<'a, ShardFile>,
    current: Option<KeyIter>,
    larges: std::vec::IntoIter<(&'a String, &'a ShardFile)>,
    /// Overflow table whose keys are listed from the overflow files.
    skip: Option<&'a BTreeMap<String, ShardFile>>,
}

impl<'a> AllKeys<'a> {
    fn empty(cache: &'a HandleCache) -> Self {
        Self {
            cache,
            kind: KeyKind::Hash,
            hash_list: false,
            shards: Default::default(),
            current: None,
            larges: Vec::new().into_iter(),
            skip: None,
        }
    }

    fn format(&self, stored: &[u8]) -> String {
        match self.kind {
            KeyKind::Hash => hex::encode(stored),
            KeyKind::Text => decode_text(stored),
        }
    }

    fn overflow_key(&self, fp: &str, file: &ShardFile) -> WocResult<String> {
        match self.kind {
            KeyKind::Hash => Ok(fp.to_string()),
            KeyKind::Text => {
                let key = recover_text_key(&file.path, fp, self.hash_list)?;
                Ok(decode_text(&key))
            }
        }
    }
}

impl Iterator for AllKeys<'_> {
    type Item = WocResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(keys) = self.current.as_mut() {
                match keys.next() {
                    Some(Ok(stored)) => {
                        let kind = self.kind;
                        let shadowed = self
                            .skip
                            .is_some_and(|larges| larges.contains_key(&fingerprint(kind, &stored)));
                        if !shadowed {
                            return Some(Ok(self.format(&stored)));
                        }
                        continue;
                    }
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => self.current = None,
                }
            }
            if let Some(file) = self.shards.next() {
                match self.cache.get(&file.path) {
                    Ok(table) => self.current = Some(table.keys()),
                    Err(e) => return Some(Err(e.into())),
                }
                continue;
            }
            let (fp, file) = self.larges.next()?;
            return Some(self.overflow_key(fp, file));
        }
    }
}
