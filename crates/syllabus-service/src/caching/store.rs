use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::catalog::ModuleKey;

/// A successfully resolved module.
///
/// The payload is shared with every reader and never mutated. An entry is only ever replaced
/// as a whole, or removed.
pub struct CacheEntry<T> {
    key: ModuleKey,
    payload: Arc<T>,
    size: usize,
    resolved_at: SystemTime,
}

impl<T> CacheEntry<T> {
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn payload(&self) -> &Arc<T> {
        &self.payload
    }

    /// The best-effort size estimate of the payload, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn resolved_at(&self) -> SystemTime {
        self.resolved_at
    }
}

impl<T> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("resolved_at", &self.resolved_at)
            .finish()
    }
}

/// Entry count and approximate memory use of the module cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    /// Sum of the per-entry size estimates. Meant for diagnostics, not exact accounting.
    pub approximate_size_bytes: usize,
}

/// The in-memory map of resolved modules.
///
/// This does no I/O and no locking of its own. The [`LoadCoordinator`](super::LoadCoordinator)
/// keeps it behind the same lock as its in-flight loads.
pub struct CacheStore<T> {
    entries: BTreeMap<ModuleKey, CacheEntry<T>>,
    size_bytes: usize,
}

impl<T> Default for CacheStore<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            size_bytes: 0,
        }
    }
}

impl<T> fmt::Debug for CacheStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

impl<T> CacheStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores a freshly resolved payload, replacing a previous entry for `key` wholesale.
    pub fn put(&mut self, key: ModuleKey, payload: Arc<T>, size: usize) {
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            size,
            resolved_at: SystemTime::now(),
        };
        if let Some(previous) = self.entries.insert(key, entry) {
            self.size_bytes -= previous.size;
        }
        self.size_bytes += size;
    }

    /// Removes the named entries, returning how many were actually cached.
    pub fn evict<'k>(&mut self, keys: impl IntoIterator<Item = &'k ModuleKey>) -> usize {
        let mut evicted = 0;
        for key in keys {
            if let Some(entry) = self.entries.remove(key) {
                self.size_bytes -= entry.size;
                evicted += 1;
            }
        }
        evicted
    }

    /// Removes every entry whose key is not in `keep`, returning the number removed.
    pub fn clear(&mut self, keep: &[ModuleKey]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| keep.contains(key));
        self.size_bytes = self.entries.values().map(|entry| entry.size).sum();
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            approximate_size_bytes: self.size_bytes,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.entries.keys()
    }
}
