//! Readers for `.tch.large.<hex>` overflow files.
//!
//! A record too large for its shard is written to a standalone file holding
//! a bounded preview of the value:
//!
//! - hash-list relations: the raw key bytes, then at most
//!   [`MAX_OVERFLOW_HASHES`] 20-byte hashes
//! - every other relation: a gzip stream of the key, `\n`, then the
//!   decompressed value cut after [`MAX_OVERFLOW_FIELDS`] `;` fields

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use woc_codec::text_fingerprint;
use woc_types::OID_LEN;

use crate::error::{StoreError, StoreResult};

/// Hashes kept in a hash-list overflow file.
pub const MAX_OVERFLOW_HASHES: usize = 8;

/// `;`-separated fields kept in a text overflow file.
pub const MAX_OVERFLOW_FIELDS: usize = 3;

/// Cut `value` before its `fields`-th separator.
pub fn cap_fields(value: &[u8], fields: usize) -> &[u8] {
    match value
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b';')
        .nth(fields.saturating_sub(1))
    {
        Some((i, _)) => &value[..i],
        None => value,
    }
}

fn open(path: &Path) -> StoreResult<File> {
    File::open(path).map_err(|e| StoreError::io(path, e))
}

/// Streaming reader over the hashes of a hash-list overflow file.
pub struct OverflowHashes {
    path: PathBuf,
    reader: BufReader<File>,
    yielded: usize,
    done: bool,
}

impl OverflowHashes {
    /// Open `path`, skipping the `key_len` key bytes at its start.
    pub fn open(path: impl AsRef<Path>, key_len: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open(&path)?;
        file.seek(SeekFrom::Start(key_len as u64))
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            yielded: 0,
            done: false,
        })
    }
}

impl Iterator for OverflowHashes {
    type Item = StoreResult<[u8; OID_LEN]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.yielded == MAX_OVERFLOW_HASHES {
            return None;
        }
        let mut hash = [0u8; OID_LEN];
        let mut filled = 0;
        while filled < OID_LEN {
            match self.reader.read(&mut hash[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(StoreError::io(&self.path, e)));
                }
            }
        }
        match filled {
            0 => {
                self.done = true;
                None
            }
            OID_LEN => {
                self.yielded += 1;
                Some(Ok(hash))
            }
            n => {
                self.done = true;
                Some(Err(StoreError::corrupt(
                    &self.path,
                    format!("trailing {n} bytes after hash {}", self.yielded),
                )))
            }
        }
    }
}

fn read_key_line(reader: &mut impl BufRead, path: &Path) -> StoreResult<Vec<u8>> {
    let mut key = Vec::new();
    reader
        .read_until(b'\n', &mut key)
        .map_err(|e| StoreError::io(path, e))?;
    if key.pop() != Some(b'\n') {
        return Err(StoreError::corrupt(path, "no newline after key"));
    }
    Ok(key)
}

/// Read a gzip text overflow file. Returns (key, capped value).
pub fn read_overflow_text(path: impl AsRef<Path>) -> StoreResult<(Vec<u8>, Vec<u8>)> {
    let path = path.as_ref();
    let mut reader = BufReader::new(GzDecoder::new(open(path)?));
    let key = read_key_line(&mut reader, path)?;
    // Stop at the last kept separator; the rest of the stream is never inflated.
    let mut body = Vec::new();
    for field in 1..=MAX_OVERFLOW_FIELDS {
        let n = reader
            .read_until(b';', &mut body)
            .map_err(|e| StoreError::io(path, e))?;
        if n == 0 || body.last() != Some(&b';') {
            break;
        }
        if field == MAX_OVERFLOW_FIELDS {
            body.pop();
        }
    }
    Ok((key, body))
}

/// Recover the text key of an overflow file named by `fingerprint`.
///
/// Text overflow files start with the key line. Hash-list files store the
/// key without a delimiter, so every prefix length the hash cap allows is
/// tried until one hashes to the fingerprint.
pub fn recover_text_key(
    path: impl AsRef<Path>,
    fingerprint: &str,
    hash_list: bool,
) -> StoreResult<Vec<u8>> {
    let path = path.as_ref();
    if !hash_list {
        let mut reader = BufReader::new(GzDecoder::new(open(path)?));
        return read_key_line(&mut reader, path);
    }

    // Key plus at most MAX_OVERFLOW_HASHES hashes; small enough to read whole.
    let mut buf = Vec::new();
    open(path)?
        .read_to_end(&mut buf)
        .map_err(|e| StoreError::io(path, e))?;
    for n in 0..=MAX_OVERFLOW_HASHES {
        let Some(len) = buf.len().checked_sub(n * OID_LEN) else {
            break;
        };
        if text_fingerprint(&buf[..len]) == fingerprint {
            buf.truncate(len);
            return Ok(buf);
        }
    }
    Err(StoreError::corrupt(
        path,
        format!("no key prefix matches fingerprint {fingerprint}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_overflow_hashes, write_overflow_text};

    #[test]
    fn cap_at_third_separator() {
        assert_eq!(cap_fields(b"a;b;c;d;e", 3), b"a;b;c");
        assert_eq!(cap_fields(b"a;b", 3), b"a;b");
        assert_eq!(cap_fields(b"", 3), b"");
    }

    #[test]
    fn hashes_after_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a2cFullU.tch.large.1f2e");
        let hashes: Vec<[u8; 20]> = (0u8..3).map(|i| [i; 20]).collect();
        write_overflow_hashes(&path, b"Audris <a@b>", &hashes).unwrap();

        let read: Vec<[u8; 20]> = OverflowHashes::open(&path, 12)
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(read, hashes);
    }

    #[test]
    fn hashes_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.large");
        let mut raw = vec![0xaau8; 20];
        for i in 0..10u8 {
            raw.extend_from_slice(&[i; 20]);
        }
        std::fs::write(&path, raw).unwrap();
        let n = OverflowHashes::open(&path, 20).unwrap().count();
        assert_eq!(n, MAX_OVERFLOW_HASHES);
    }

    #[test]
    fn ragged_hash_tail_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.large");
        std::fs::write(&path, [1u8; 25]).unwrap();
        let items: Vec<_> = OverflowHashes::open(&path, 0).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c2pFullU.tch.large.e4af8916");
        write_overflow_text(&path, b"key", b"p1;p2;p3;p4;p5").unwrap();
        let (key, body) = read_overflow_text(&path).unwrap();
        assert_eq!(key, b"key");
        assert_eq!(body, b"p1;p2;p3");
    }

    #[test]
    fn text_file_short_and_exact_values() {
        let dir = tempfile::tempdir().unwrap();
        let cases: [(&[u8], &[u8]); 4] = [
            (b"a;b", b"a;b"),
            (b"a;b;c", b"a;b;c"),
            (b"a;b;c;", b"a;b;c"),
            (b"", b""),
        ];
        for (value, kept) in cases {
            let path = dir.path().join("c2pFullU.tch.large.0");
            write_overflow_text(&path, b"key", value).unwrap();
            assert_eq!(read_overflow_text(&path).unwrap().1, kept);
        }
    }

    #[test]
    fn text_file_with_huge_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b2cFullU.tch.large.0");
        // Written uncapped, as a file from an older generator could be.
        let value = (0..200_000).map(|i| format!("c{i}")).collect::<Vec<_>>().join(";");
        let mut gz = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        std::io::Write::write_all(&mut gz, format!("key\n{value}").as_bytes()).unwrap();
        gz.finish().unwrap();
        let (_, body) = read_overflow_text(&path).unwrap();
        assert_eq!(body, b"c0;c1;c2");
    }

    #[test]
    fn recover_key_from_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p2cFullU.tch.large.x");
        write_overflow_text(&path, b"user_proj", b"a;b").unwrap();
        let fp = text_fingerprint(b"user_proj");
        assert_eq!(recover_text_key(&path, &fp, false).unwrap(), b"user_proj");
    }

    #[test]
    fn recover_key_from_hash_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a2cFullU.tch.large.x");
        let key = b"Audris Mockus <audris@utk.edu>";
        write_overflow_hashes(&path, key, &[[1; 20], [2; 20]]).unwrap();
        let fp = text_fingerprint(key);
        assert_eq!(recover_text_key(&path, &fp, true).unwrap(), key);
        assert!(recover_text_key(&path, "0", true).is_err());
    }

    #[test]
    fn missing_file_is_io() {
        let err = read_overflow_text("/nonexistent/woc.large").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
