//! Caching of compiled dynamic predicates.
//!
//! Compiling an expression means lexing, parsing and type-checking it, so
//! callers that translate the same text repeatedly can share one compiled
//! predicate through a [`PredicateCache`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::compiler::CompiledPredicate;

/// A store of compiled predicates keyed by expression text.
///
/// Implementations must tolerate concurrent `get`/`set` on distinct and
/// identical keys. Eviction policy is up to the implementation.
pub trait PredicateCache: Send + Sync {
    fn get(&self, text: &str) -> Option<Arc<CompiledPredicate>>;

    fn set(&self, text: &str, predicate: Arc<CompiledPredicate>);
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Unbounded in-process predicate cache.
#[derive(Default)]
pub struct MemoryPredicateCache {
    entries: DashMap<String, Arc<CompiledPredicate>>,
    stats: CacheStats,
}

impl MemoryPredicateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl PredicateCache for MemoryPredicateCache {
    fn get(&self, text: &str) -> Option<Arc<CompiledPredicate>> {
        match self.entries.get(text) {
            Some(entry) => {
                self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.stats.misses.fetch_add(1, AtomicOrdering::Relaxed);
                None
            }
        }
    }

    fn set(&self, text: &str, predicate: Arc<CompiledPredicate>) {
        self.stats.writes.fetch_add(1, AtomicOrdering::Relaxed);
        self.entries.insert(text.to_string(), predicate);
    }
}

impl fmt::Debug for MemoryPredicateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPredicateCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
