//! Positional reads from `blob_N.bin` content files.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Read `len` bytes at `offset` from `path`.
pub fn read_span(path: impl AsRef<Path>, offset: u64, len: u64) -> StoreResult<Vec<u8>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StoreError::io(path, e))?;
    let len = usize::try_from(len)
        .map_err(|_| StoreError::corrupt(path, format!("span length {len} too large")))?;
    let mut buf = vec![0u8; len];
    match file.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(StoreError::corrupt(
            path,
            format!("span {offset}+{len} runs past end of file"),
        )),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
