//! Resolution cache.
//!
//! Entries are keyed by everything that can change the outcome of a
//! resolution: the dotted path, the ordered search roots and the
//! current-directory fallback root. Entries are only removed by
//! [`ResolutionCache::clear`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::resolved::ResolvedModule;

/// Cache key for one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized dotted path.
    pub path: String,
    /// Search roots, in order.
    pub roots: Vec<PathBuf>,
    /// Current-directory root, when the fallback is enabled.
    pub fallback: Option<PathBuf>,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to resolve.
    pub misses: u64,
    /// Current number of entries.
    pub entries: usize,
}

/// Concurrent map of resolved modules.
///
/// Readers never block each other. Concurrent fills of the same key are
/// last-writer-wins.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<CacheKey, ResolvedModule>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<ResolvedModule> {
        let found = self.entries.get(key).map(|entry| entry.value().clone());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert an entry.
    pub fn insert(&self, key: CacheKey, module: ResolvedModule) {
        debug!(path = %key.path, source = %module.source, "Caching resolution");
        self.entries.insert(key, module);
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        let entries = self.entries.len();
        self.entries.clear();
        debug!(entries, "Resolution cache cleared");
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
