//! Process-wide cache of open shard handles.
//!
//! Handles are opened lazily on first use and shared afterwards. A mapping
//! inherited across a fork must not be reused by the child, so the cache is
//! stamped with the identity of the process that filled it and starts over
//! when that identity changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::tch::TchReader;
use crate::traits::ShardTable;

/// Opens the shard table backing a file.
pub type Opener = Box<dyn Fn(&Path) -> StoreResult<Arc<dyn ShardTable>> + Send + Sync>;

/// Reports the identity of the current process.
pub type Identity = fn() -> u32;

struct CacheState {
    owner: u32,
    handles: HashMap<PathBuf, Arc<dyn ShardTable>>,
}

/// Lazily opened, shared shard handles keyed by path.
pub struct HandleCache {
    opener: Opener,
    identity: Identity,
    state: RwLock<CacheState>,
}

fn open_tch(path: &Path) -> StoreResult<Arc<dyn ShardTable>> {
    Ok(Arc::new(TchReader::open(path)?))
}

impl Default for HandleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleCache {
    /// Cache of Tokyo Cabinet readers for the current process.
    pub fn new() -> Self {
        Self::with_opener(Box::new(open_tch), std::process::id)
    }

    /// Cache with a custom opener and process identity source.
    pub fn with_opener(opener: Opener, identity: Identity) -> Self {
        Self {
            opener,
            identity,
            state: RwLock::new(CacheState {
                owner: identity(),
                handles: HashMap::new(),
            }),
        }
    }

    /// Return the handle for `path`, opening it if needed.
    pub fn get(&self, path: &Path) -> StoreResult<Arc<dyn ShardTable>> {
        let current = (self.identity)();
        {
            let state = self
                .state
                .read()
                .map_err(|_| StoreError::Poisoned("handle cache"))?;
            if state.owner == current {
                if let Some(handle) = state.handles.get(path) {
                    return Ok(Arc::clone(handle));
                }
            }
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Poisoned("handle cache"))?;
        if state.owner != current {
            tracing::warn!(
                previous = state.owner,
                current,
                dropped = state.handles.len(),
                "process identity changed, reopening shard handles"
            );
            state.handles.clear();
            state.owner = current;
        }
        if let Some(handle) = state.handles.get(path) {
            return Ok(Arc::clone(handle));
        }
        let handle = (self.opener)(path)?;
        state.handles.insert(path.to_path_buf(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handles
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached handle. Also recovers a poisoned cache.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.handles.clear();
        drop(state);
        self.state.clear_poison();
    }
}
