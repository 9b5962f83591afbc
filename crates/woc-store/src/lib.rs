//! Record store adapter for the World of Code archive.
//!
//! Fetches raw bytes for the query layer. Three kinds of file are read:
//!
//! - **Shard tables** (`*.tch`): Tokyo Cabinet hash databases, read natively
//!   through a memory map behind the [`ShardTable`] trait
//! - **Blob files** (`blob_N.bin`): concatenated blob bodies addressed by an
//!   (offset, length) record kept in a shard table
//! - **Overflow files** (`*.tch.large.<hex>`): one oversized record each
//!
//! Everything here is read-only. Handles are shared through
//! [`HandleCache`], which reopens them when the process identity changes.

pub mod blob;
pub mod cache;
pub mod error;
pub mod overflow;
pub mod tch;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use blob::read_span;
pub use cache::{HandleCache, Identity, Opener};
pub use error::{StoreError, StoreResult};
pub use overflow::{
    read_overflow_text, recover_text_key, OverflowHashes, MAX_OVERFLOW_FIELDS,
    MAX_OVERFLOW_HASHES,
};
pub use tch::{TchKeys, TchReader};
pub use traits::{KeyIter, ShardTable};
