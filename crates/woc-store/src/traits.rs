use std::path::Path;
use std::sync::Arc;

use crate::error::StoreResult;

/// Lazily produced keys of one shard.
pub type KeyIter = Box<dyn Iterator<Item = StoreResult<Vec<u8>>> + Send>;

/// One physical shard of a relation or content store.
///
/// Implementations must satisfy these invariants:
/// - The shard is read-only; the archive is generated offline.
/// - A missing key is `Ok(None)`, never an error.
/// - I/O failures and corruption are returned as errors, never hidden.
/// - Concurrent reads through a shared handle are safe.
pub trait ShardTable: Send + Sync {
    /// Path of the backing file.
    fn path(&self) -> &Path;

    /// Look up the value stored for `key`.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Number of records, as reported by the file header.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every key in file order.
    fn keys(self: Arc<Self>) -> KeyIter;
}
