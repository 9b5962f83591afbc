//! Read-only Tokyo Cabinet hash database reader.
//!
//! Layout of a `.tch` file:
//!
//! ```text
//! [0, 256)            header: magic, type, apow, opts, bnum, rnum, fsiz, frec
//! [256, 256+bnum*w)   bucket array, w = 4 (or 8 with the large option);
//!                     each entry is a record offset >> apow
//! [frec, fsiz)        records and free blocks, aligned to 1 << apow
//! ```
//!
//! A bucket heads a binary tree of records ordered by a one-byte secondary
//! hash and then by key. Records are:
//!
//! ```text
//! 0xc8 hash left right psiz:u16 ksiz:vnum vsiz:vnum key value padding
//! ```
//!
//! All fixed-width integers are little-endian.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyIter, ShardTable};

pub(crate) const MAGIC: &[u8] = b"ToKyO CaBiNeT";
pub(crate) const HEADER_LEN: usize = 256;
pub(crate) const TYPE_OFF: usize = 32;
pub(crate) const APOW_OFF: usize = 34;
pub(crate) const FPOW_OFF: usize = 35;
pub(crate) const OPTS_OFF: usize = 36;
pub(crate) const BNUM_OFF: usize = 40;
pub(crate) const RNUM_OFF: usize = 48;
pub(crate) const FSIZ_OFF: usize = 56;
pub(crate) const FREC_OFF: usize = 64;

/// Database type byte of a hash database.
pub(crate) const TYPE_HASH: u8 = 0;

pub(crate) const OPT_LARGE: u8 = 1 << 0;
const OPT_DEFLATE: u8 = 1 << 1;
const OPT_BZIP: u8 = 1 << 2;
const OPT_TCBS: u8 = 1 << 3;
const OPT_EXCODEC: u8 = 1 << 4;

pub(crate) const REC_MAGIC: u8 = 0xc8;
pub(crate) const FREE_MAGIC: u8 = 0xb0;

/// Bucket index and secondary hash of a key.
pub(crate) fn bucket_hash(key: &[u8], bnum: u64) -> (u64, u8) {
    let mut idx: u64 = 19_780_211;
    let mut hash: u32 = 751;
    for (i, &b) in key.iter().enumerate() {
        idx = idx.wrapping_mul(37).wrapping_add(u64::from(b));
        hash = hash.wrapping_mul(31) ^ u32::from(key[key.len() - 1 - i]);
    }
    (idx % bnum, hash as u8)
}

/// Tokyo Cabinet key order: shorter keys first, then bytewise.
pub(crate) fn key_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Decode a TC variable-length number. Returns (value, bytes_consumed).
///
/// Groups are little-endian; a non-final byte holds `!group` (high bit set).
pub(crate) fn read_vnum(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut base: u64 = 1;
    for (i, &b) in data.iter().enumerate().take(10) {
        if (b as i8) >= 0 {
            return Some((value.checked_add(u64::from(b).checked_mul(base)?)?, i + 1));
        }
        value = value.checked_add(u64::from(!b).checked_mul(base)?)?;
        base = base.checked_shl(7)?;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    apow: u8,
    large: bool,
    bnum: u64,
    rnum: u64,
    fsiz: u64,
    frec: u64,
}

#[derive(Debug)]
struct Record {
    magic: u8,
    hash: u8,
    left: u64,
    right: u64,
    key_start: usize,
    ksiz: usize,
    vsiz: usize,
    /// Total on-disk size including header and padding.
    rsiz: u64,
}

/// A memory-mapped Tokyo Cabinet hash database opened read-only.
#[derive(Debug)]
pub struct TchReader {
    path: PathBuf,
    map: Mmap,
    header: Header,
}

impl TchReader {
    /// Open and validate a `.tch` file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let len = file.metadata().map_err(|e| StoreError::io(&path, e))?.len();
        if len < HEADER_LEN as u64 {
            return Err(StoreError::corrupt(
                &path,
                format!("{len} bytes is shorter than the {HEADER_LEN}-byte header"),
            ));
        }
        let map = unsafe { Mmap::map(&file) }.map_err(|e| StoreError::io(&path, e))?;
        let header = parse_header(&path, &map)?;
        tracing::debug!(
            path = %path.display(),
            bnum = header.bnum,
            rnum = header.rnum,
            "opened shard"
        );
        Ok(Self { path, map, header })
    }

    /// Look up `key`, borrowing the value from the mapping.
    pub fn get_ref(&self, key: &[u8]) -> StoreResult<Option<&[u8]>> {
        let (bucket, hash) = bucket_hash(key, self.header.bnum);
        let mut off = self.bucket(bucket)?;
        // Tree depth is bounded by the record count; anything deeper is a cycle.
        let mut steps = 0u64;
        while off != 0 {
            steps += 1;
            if steps > self.header.rnum.saturating_add(1) {
                return Err(self.corrupt(format!("cycle in bucket {bucket}")));
            }
            let rec = self.record(off)?;
            if rec.magic != REC_MAGIC {
                return Err(self.corrupt(format!("bucket {bucket} links to non-record at {off}")));
            }
            off = match hash.cmp(&rec.hash) {
                std::cmp::Ordering::Greater => rec.left,
                std::cmp::Ordering::Less => rec.right,
                std::cmp::Ordering::Equal => {
                    let stored = &self.map[rec.key_start..rec.key_start + rec.ksiz];
                    match key_cmp(key, stored) {
                        std::cmp::Ordering::Greater => rec.left,
                        std::cmp::Ordering::Less => rec.right,
                        std::cmp::Ordering::Equal => {
                            let start = rec.key_start + rec.ksiz;
                            return Ok(Some(&self.map[start..start + rec.vsiz]));
                        }
                    }
                }
            };
        }
        Ok(None)
    }

    /// Number of records stored.
    pub fn record_count(&self) -> u64 {
        self.header.rnum
    }

    fn width(&self) -> usize {
        if self.header.large {
            8
        } else {
            4
        }
    }

    fn read_offset(&self, at: usize) -> StoreResult<u64> {
        let raw = if self.header.large {
            self.bytes(at, 8)
                .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))?
        } else {
            self.bytes(at, 4)
                .map(|b| u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))?
        };
        raw.checked_shl(u32::from(self.header.apow))
            .ok_or_else(|| self.corrupt(format!("offset overflow at {at}")))
    }

    fn bucket(&self, index: u64) -> StoreResult<u64> {
        let at = HEADER_LEN + index as usize * self.width();
        self.read_offset(at)
    }

    fn bytes(&self, at: usize, len: usize) -> StoreResult<&[u8]> {
        at.checked_add(len)
            .and_then(|end| self.map.get(at..end))
            .ok_or_else(|| self.corrupt(format!("read of {len} bytes at {at} past end of file")))
    }

    fn record(&self, off: u64) -> StoreResult<Record> {
        let start = usize::try_from(off).map_err(|_| self.corrupt(format!("offset {off}")))?;
        let magic = self.bytes(start, 1)?[0];
        if magic == FREE_MAGIC {
            let b = self.bytes(start + 1, 4)?;
            let rsiz = u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
            if rsiz == 0 {
                return Err(self.corrupt(format!("empty free block at {off}")));
            }
            return Ok(Record {
                magic,
                hash: 0,
                left: 0,
                right: 0,
                key_start: start,
                ksiz: 0,
                vsiz: 0,
                rsiz,
            });
        }
        if magic != REC_MAGIC {
            return Err(self.corrupt(format!("bad record magic {magic:#04x} at {off}")));
        }
        let hash = self.bytes(start + 1, 1)?[0];
        let w = self.width();
        let left = self.read_offset(start + 2)?;
        let right = self.read_offset(start + 2 + w)?;
        let mut pos = start + 2 + 2 * w;
        let p = self.bytes(pos, 2)?;
        let psiz = u64::from(u16::from_le_bytes([p[0], p[1]]));
        pos += 2;

        let tail = self.map.get(pos..).unwrap_or_default();
        let (ksiz, n) = read_vnum(tail).ok_or_else(|| self.corrupt(format!("bad key size at {off}")))?;
        pos += n;
        let tail = self.map.get(pos..).unwrap_or_default();
        let (vsiz, n) =
            read_vnum(tail).ok_or_else(|| self.corrupt(format!("bad value size at {off}")))?;
        pos += n;

        let ksiz = usize::try_from(ksiz).map_err(|_| self.corrupt(format!("key size at {off}")))?;
        let vsiz = usize::try_from(vsiz).map_err(|_| self.corrupt(format!("value size at {off}")))?;
        self.bytes(pos, ksiz.saturating_add(vsiz))?;

        let rsiz = (pos - start) as u64 + ksiz as u64 + vsiz as u64 + psiz;
        Ok(Record {
            magic,
            hash,
            left,
            right,
            key_start: pos,
            ksiz,
            vsiz,
            rsiz,
        })
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::corrupt(&self.path, reason)
    }

    fn record_area_end(&self) -> u64 {
        self.header.fsiz.min(self.map.len() as u64)
    }
}

fn le_u64(map: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&map[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn parse_header(path: &Path, map: &[u8]) -> StoreResult<Header> {
    if !map.starts_with(MAGIC) {
        return Err(StoreError::corrupt(path, "missing Tokyo Cabinet magic"));
    }
    let kind = map[TYPE_OFF];
    if kind != TYPE_HASH {
        return Err(StoreError::Unsupported {
            path: path.to_path_buf(),
            reason: format!("database type {kind} is not a hash database"),
        });
    }
    let opts = map[OPTS_OFF];
    if opts & (OPT_DEFLATE | OPT_BZIP | OPT_TCBS | OPT_EXCODEC) != 0 {
        return Err(StoreError::Unsupported {
            path: path.to_path_buf(),
            reason: format!("record compression option {opts:#04x}"),
        });
    }
    let header = Header {
        apow: map[APOW_OFF],
        large: opts & OPT_LARGE != 0,
        bnum: le_u64(map, BNUM_OFF),
        rnum: le_u64(map, RNUM_OFF),
        fsiz: le_u64(map, FSIZ_OFF),
        frec: le_u64(map, FREC_OFF),
    };
    if header.bnum == 0 {
        return Err(StoreError::corrupt(path, "zero bucket count"));
    }
    if header.apow > 16 {
        return Err(StoreError::corrupt(path, format!("alignment power {}", header.apow)));
    }
    let width: u64 = if header.large { 8 } else { 4 };
    let buckets_end = header
        .bnum
        .checked_mul(width)
        .and_then(|n| n.checked_add(HEADER_LEN as u64));
    match buckets_end {
        Some(end) if end <= map.len() as u64 => Ok(header),
        _ => Err(StoreError::corrupt(
            path,
            format!("bucket array of {} entries exceeds file", header.bnum),
        )),
    }
}

impl ShardTable for TchReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.get_ref(key)?.map(<[u8]>::to_vec))
    }

    fn len(&self) -> u64 {
        self.header.rnum
    }

    fn keys(self: Arc<Self>) -> KeyIter {
        let pos = self.header.frec;
        let end = self.record_area_end();
        Box::new(TchKeys {
            reader: self,
            pos,
            end,
            failed: false,
        })
    }
}

/// Iterator over the keys of a shard in file order, skipping free blocks.
pub struct TchKeys {
    reader: Arc<TchReader>,
    pos: u64,
    end: u64,
    failed: bool,
}

impl Iterator for TchKeys {
    type Item = StoreResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.pos < self.end {
            let rec = match self.reader.record(self.pos) {
                Ok(rec) => rec,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            self.pos += rec.rsiz;
            if rec.magic == REC_MAGIC {
                let key = &self.reader.map[rec.key_start..rec.key_start + rec.ksiz];
                return Some(Ok(key.to_vec()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TchWriter;
    use proptest::prelude::*;

    fn write(dir: &Path, name: &str, build: impl FnOnce(&mut TchWriter)) -> PathBuf {
        let path = dir.join(name);
        let mut w = TchWriter::new();
        build(&mut w);
        w.write(&path).unwrap();
        path
    }

    #[test]
    fn vnum_examples() {
        assert_eq!(read_vnum(&[0x00]), Some((0, 1)));
        assert_eq!(read_vnum(&[0x7f]), Some((127, 1)));
        // 128 = group 0 (stored as !0) then group 1.
        assert_eq!(read_vnum(&[0xff, 0x01]), Some((128, 2)));
        assert_eq!(read_vnum(&[0xff]), None);
    }

    #[test]
    fn hash_is_deterministic() {
        let a = bucket_hash(b"e4af89166a17785c1d741b", 131_071);
        let b = bucket_hash(b"e4af89166a17785c1d741b", 131_071);
        assert_eq!(a, b);
        assert!(a.0 < 131_071);
    }

    #[test]
    fn get_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c2pFullU_0.tch", |w| {
            w.put(b"alpha", b"1");
            w.put(b"beta", b"two");
            w.put(b"", b"empty key");
        });
        let r = TchReader::open(&path).unwrap();
        assert_eq!(r.get_ref(b"alpha").unwrap(), Some(&b"1"[..]));
        assert_eq!(r.get_ref(b"beta").unwrap(), Some(&b"two"[..]));
        assert_eq!(r.get_ref(b"").unwrap(), Some(&b"empty key"[..]));
        assert_eq!(r.get_ref(b"gamma").unwrap(), None);
        assert_eq!(r.record_count(), 3);
    }

    #[test]
    fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.tch", |w| {
            w.put(b"k", b"old");
            w.put(b"k", b"new");
        });
        let r = TchReader::open(&path).unwrap();
        assert_eq!(r.get_ref(b"k").unwrap(), Some(&b"new"[..]));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn collisions_in_one_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let keys: Vec<Vec<u8>> = (0u32..200).map(|i| i.to_be_bytes().to_vec()).collect();
        let path = write(dir.path(), "t.tch", |w| {
            w.buckets(1);
            for k in &keys {
                w.put(k, k);
            }
        });
        let r = TchReader::open(&path).unwrap();
        for k in &keys {
            assert_eq!(r.get_ref(k).unwrap(), Some(&k[..]));
        }
        assert_eq!(r.get_ref(b"nope").unwrap(), None);
    }

    #[test]
    fn large_offsets_and_free_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.tch", |w| {
            w.large(true);
            w.put(b"a", b"1");
            w.free_block(64);
            w.put(b"b", &[7u8; 300]);
        });
        let r = Arc::new(TchReader::open(&path).unwrap());
        assert_eq!(r.get_ref(b"b").unwrap().map(<[u8]>::len), Some(300));
        let keys: Vec<Vec<u8>> = r.keys().collect::<StoreResult<_>>().unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn keys_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.tch", |w| {
            for k in ["z", "y", "x"] {
                w.put(k.as_bytes(), b"v");
            }
        });
        let r = Arc::new(TchReader::open(&path).unwrap());
        let keys: Vec<Vec<u8>> = r.keys().map(Result::unwrap).collect();
        assert_eq!(keys, vec![b"z".to_vec(), b"y".to_vec(), b"x".to_vec()]);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tch");
        std::fs::write(&path, vec![0u8; 512]).unwrap();
        assert!(matches!(
            TchReader::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.tch");
        std::fs::write(&path, b"ToKyO CaBiNeT").unwrap();
        assert!(matches!(
            TchReader::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn rejects_compressed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.tch", |w| { w.put(b"k", b"v"); });
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[OPTS_OFF] |= OPT_DEFLATE;
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            TchReader::open(&path),
            Err(StoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TchReader::open(dir.path().join("absent.tch")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.tch", |w| { w.put(b"key", &[1u8; 100]); });
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 64]).unwrap();
        let r = TchReader::open(&path).unwrap();
        assert!(matches!(r.get_ref(b"key"), Err(StoreError::Corrupt { .. })));
    }

    proptest! {
        #[test]
        fn every_written_key_is_found(
            entries in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 0..24),
                proptest::collection::vec(any::<u8>(), 0..64),
                1..40,
            ),
            bnum in 1u64..64,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = write(dir.path(), "p.tch", |w| {
                w.buckets(bnum);
                for (k, v) in &entries {
                    w.put(k, v);
                }
            });
            let r = TchReader::open(&path).unwrap();
            prop_assert_eq!(r.len(), entries.len() as u64);
            for (k, v) in &entries {
                prop_assert_eq!(r.get_ref(k).unwrap(), Some(&v[..]));
            }
        }
    }
}
