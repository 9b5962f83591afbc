//! Fixture writers producing files the readers in this crate accept.
//!
//! Only compiled for tests and under the `test-util` feature.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::overflow::{cap_fields, MAX_OVERFLOW_FIELDS, MAX_OVERFLOW_HASHES};
use crate::tch::{
    bucket_hash, key_cmp, APOW_OFF, BNUM_OFF, FPOW_OFF, FREC_OFF, FREE_MAGIC, FSIZ_OFF,
    HEADER_LEN, MAGIC, OPTS_OFF, OPT_LARGE, REC_MAGIC, RNUM_OFF, TYPE_HASH, TYPE_OFF,
};

const DEFAULT_BUCKETS: u64 = 131;
const DEFAULT_APOW: u8 = 4;
const DEFAULT_FPOW: u8 = 10;

enum Entry {
    Record { key: Vec<u8>, value: Vec<u8> },
    Free(u64),
}

/// Builds a Tokyo Cabinet hash database in memory and writes it out.
///
/// Records are laid out in insertion order; `put` on an existing key
/// replaces its value in place.
pub struct TchWriter {
    bnum: u64,
    large: bool,
    apow: u8,
    entries: Vec<Entry>,
    index: HashMap<Vec<u8>, usize>,
}

impl Default for TchWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_vnum(buf: &mut Vec<u8>, mut n: u64) {
    if n == 0 {
        buf.push(0);
        return;
    }
    while n > 0 {
        let rem = (n & 0x7f) as u8;
        n >>= 7;
        buf.push(if n > 0 { !rem } else { rem });
    }
}

fn align_up(n: u64, align: u64) -> u64 {
    n.div_ceil(align) * align
}

impl TchWriter {
    pub fn new() -> Self {
        Self {
            bnum: DEFAULT_BUCKETS,
            large: false,
            apow: DEFAULT_APOW,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Set the bucket count (at least 1).
    pub fn buckets(&mut self, bnum: u64) -> &mut Self {
        self.bnum = bnum.max(1);
        self
    }

    /// Use 64-bit record offsets.
    pub fn large(&mut self, large: bool) -> &mut Self {
        self.large = large;
        self
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> &mut Self {
        match self.index.get(key) {
            Some(&i) => {
                self.entries[i] = Entry::Record {
                    key: key.to_vec(),
                    value: value.to_vec(),
                }
            }
            None => {
                self.index.insert(key.to_vec(), self.entries.len());
                self.entries.push(Entry::Record {
                    key: key.to_vec(),
                    value: value.to_vec(),
                });
            }
        }
        self
    }

    /// Insert a free block of `size` bytes (rounded up to the alignment).
    pub fn free_block(&mut self, size: u64) -> &mut Self {
        let align = 1u64 << self.apow;
        self.entries.push(Entry::Free(align_up(size.max(5), align)));
        self
    }

    fn width(&self) -> usize {
        if self.large {
            8
        } else {
            4
        }
    }

    fn put_offset(&self, buf: &mut Vec<u8>, off: u64) {
        let v = off >> self.apow;
        if self.large {
            buf.extend_from_slice(&v.to_le_bytes());
        } else {
            buf.extend_from_slice(&(v as u32).to_le_bytes());
        }
    }

    /// Encode the whole database.
    pub fn to_bytes(&self) -> Vec<u8> {
        let align = 1u64 << self.apow;
        let width = self.width();
        let frec = align_up(HEADER_LEN as u64 + self.bnum * width as u64, align);

        // Offsets and sizes in file order.
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut pos = frec;
        for entry in &self.entries {
            offsets.push(pos);
            pos += match entry {
                Entry::Record { key, value } => {
                    let mut sizes = Vec::new();
                    write_vnum(&mut sizes, key.len() as u64);
                    write_vnum(&mut sizes, value.len() as u64);
                    let body = 2 + 2 * width + 2 + sizes.len() + key.len() + value.len();
                    align_up(body as u64, align)
                }
                Entry::Free(size) => *size,
            };
        }
        let fsiz = pos;

        // Per-bucket binary trees.
        let mut roots: Vec<Option<usize>> = vec![None; self.bnum as usize];
        let mut left: Vec<Option<usize>> = vec![None; self.entries.len()];
        let mut right: Vec<Option<usize>> = vec![None; self.entries.len()];
        let mut hashes = vec![0u8; self.entries.len()];
        for (i, entry) in self.entries.iter().enumerate() {
            let Entry::Record { key, .. } = entry else {
                continue;
            };
            let (bucket, hash) = bucket_hash(key, self.bnum);
            hashes[i] = hash;
            let Some(mut cur) = roots[bucket as usize] else {
                roots[bucket as usize] = Some(i);
                continue;
            };
            loop {
                let Entry::Record { key: cur_key, .. } = &self.entries[cur] else {
                    unreachable!("free blocks are never linked");
                };
                let go_left = match hash.cmp(&hashes[cur]) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        key_cmp(key, cur_key) == std::cmp::Ordering::Greater
                    }
                };
                let slot = if go_left { &mut left[cur] } else { &mut right[cur] };
                match *slot {
                    Some(next) => cur = next,
                    None => {
                        *slot = Some(i);
                        break;
                    }
                }
            }
        }

        let mut buf = Vec::with_capacity(fsiz as usize);
        let mut head = vec![0u8; HEADER_LEN];
        let magic = [MAGIC, &b"\n1.0:911\n"[..]].concat();
        head[..magic.len()].copy_from_slice(&magic);
        head[TYPE_OFF] = TYPE_HASH;
        head[APOW_OFF] = self.apow;
        head[FPOW_OFF] = DEFAULT_FPOW;
        head[OPTS_OFF] = if self.large { OPT_LARGE } else { 0 };
        let rnum = self.index.len() as u64;
        for (off, v) in [
            (BNUM_OFF, self.bnum),
            (RNUM_OFF, rnum),
            (FSIZ_OFF, fsiz),
            (FREC_OFF, frec),
        ] {
            head[off..off + 8].copy_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&head);

        for root in &roots {
            self.put_offset(&mut buf, root.map_or(0, |i| offsets[i]));
        }
        buf.resize(frec as usize, 0);

        for (i, entry) in self.entries.iter().enumerate() {
            let start = buf.len();
            match entry {
                Entry::Record { key, value } => {
                    buf.push(REC_MAGIC);
                    buf.push(hashes[i]);
                    self.put_offset(&mut buf, left[i].map_or(0, |j| offsets[j]));
                    self.put_offset(&mut buf, right[i].map_or(0, |j| offsets[j]));
                    let mut sizes = Vec::new();
                    write_vnum(&mut sizes, key.len() as u64);
                    write_vnum(&mut sizes, value.len() as u64);
                    let body = 2 + 2 * width + 2 + sizes.len() + key.len() + value.len();
                    let psiz = align_up(body as u64, align) as usize - body;
                    buf.extend_from_slice(&(psiz as u16).to_le_bytes());
                    buf.extend_from_slice(&sizes);
                    buf.extend_from_slice(key);
                    buf.extend_from_slice(value);
                    buf.resize(start + body + psiz, 0);
                }
                Entry::Free(size) => {
                    buf.push(FREE_MAGIC);
                    buf.extend_from_slice(&(*size as u32).to_le_bytes());
                    buf.resize(start + *size as usize, 0);
                }
            }
        }
        buf
    }

    /// Write the database to `path`, replacing any existing file.
    pub fn write(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }
}

/// Write a hash-list overflow file: the raw key, then at most
/// `MAX_OVERFLOW_HASHES` hashes.
pub fn write_overflow_hashes(path: impl AsRef<Path>, key: &[u8], hashes: &[[u8; 20]]) -> io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(key)?;
    for h in hashes.iter().take(MAX_OVERFLOW_HASHES) {
        f.write_all(h)?;
    }
    Ok(())
}

/// Write a gzip text overflow file: the key, a newline, then `value`
/// capped at `MAX_OVERFLOW_FIELDS` fields.
pub fn write_overflow_text(path: impl AsRef<Path>, key: &[u8], value: &[u8]) -> io::Result<()> {
    let mut gz = GzEncoder::new(File::create(path)?, Compression::default());
    gz.write_all(key)?;
    gz.write_all(b"\n")?;
    gz.write_all(cap_fields(value, MAX_OVERFLOW_FIELDS))?;
    gz.finish()?;
    Ok(())
}

/// Append `data` to a blob file. Returns the (offset, length) of the span.
pub fn append_blob(path: impl AsRef<Path>, data: &[u8]) -> io::Result<(u64, u64)> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let offset = f.seek(SeekFrom::End(0))?;
    f.write_all(data)?;
    Ok((offset, data.len() as u64))
}
