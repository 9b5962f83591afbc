//! Bounded-cost content fingerprint of large files.
//!
//! Small files are hashed whole. Larger files are sampled: 128-byte windows
//! at the start, at every chunk boundary and at the end. The chunk size is
//! a power of two derived from the file size so that only a handful of
//! windows are read even for multi-gigabyte shards.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use md5::{Digest, Md5};

use crate::grammar::bit_length;

/// Files up to this size are hashed in full.
pub const FULL_HASH_LIMIT: u64 = 4096;

const WINDOW: u64 = 128;

/// Hex characters kept from the MD5 digest.
pub const DIGEST_LEN: usize = 16;

/// Chunk size used for a file of `size` bytes.
fn chunk_size(size: u64) -> u64 {
    let per_bit = size / u64::from(bit_length(size));
    1u64 << (u32::from(bit_length(per_bit)) + 2)
}

/// Compute the 16-hex-character sampled digest of `path`.
pub fn sample_digest(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut hasher = Md5::new();

    if size <= FULL_HASH_LIMIT {
        let mut buf = Vec::with_capacity(size as usize);
        file.read_to_end(&mut buf)?;
        hasher.update(&buf);
    } else {
        let chunk = chunk_size(size);
        let chunks = (size - 2 * WINDOW) / chunk;
        let mut window = [0u8; WINDOW as usize];

        file.read_exact(&mut window)?;
        hasher.update(window);
        for _ in 0..chunks {
            file.seek(SeekFrom::Current((chunk - WINDOW) as i64))?;
            file.read_exact(&mut window)?;
            hasher.update(window);
        }
        file.seek(SeekFrom::Start(size - WINDOW))?;
        file.read_exact(&mut window)?;
        hasher.update(window);
    }

    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(DIGEST_LEN);
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn md5_hex(data: &[u8]) -> String {
        let mut h = hex::encode(Md5::digest(data));
        h.truncate(DIGEST_LEN);
        h
    }

    #[test]
    fn small_file_hashed_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.tch");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(sample_digest(&path).unwrap(), md5_hex(b"hello"));
        assert_eq!(sample_digest(&path).unwrap(), "5d41402abc4b2a76");
    }

    #[test]
    fn chunk_sizes() {
        // 10_000 bytes: 14 bits, 714 per bit, 10 bits, 2^12.
        assert_eq!(chunk_size(10_000), 4096);
        // 2^30 bytes: 31 bits, 34_636_833 per bit, 26 bits, 2^28.
        assert_eq!(chunk_size(1 << 30), 1 << 28);
    }

    #[test]
    fn large_file_samples_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&data)
            .unwrap();

        // chunk 4096, (10000 - 256) / 4096 = 2 interior windows.
        let mut sampled = Vec::new();
        sampled.extend_from_slice(&data[..128]);
        sampled.extend_from_slice(&data[4096..4096 + 128]);
        sampled.extend_from_slice(&data[8192..8192 + 128]);
        sampled.extend_from_slice(&data[10_000 - 128..]);
        assert_eq!(sample_digest(&path).unwrap(), md5_hex(&sampled));
    }

    #[test]
    fn detects_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        let before = sample_digest(&path).unwrap();
        std::fs::write(&path, &data[..19_000]).unwrap();
        assert_ne!(sample_digest(&path).unwrap(), before);
    }
}
