//! Fingerprint-keyed in-memory cache with TTL expiry and bounded capacity.
//!
//! Entries remember the `(mtime, size)` fingerprint of the file they were
//! derived from.  A lookup supplies the live fingerprint; any mismatch, a
//! missing file, or an expired TTL evicts the entry and reports a miss.  At
//! capacity the entry inserted earliest is evicted first.  A single mutex
//! guards the map together with the metrics counters.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// Cheap change detector for a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: SystemTime,
    pub size: u64,
}

impl Fingerprint {
    /// Stat `path`; `None` when the file cannot be stat'ed.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok()?,
            size: meta.len(),
        })
    }
}

struct CacheEntry<V> {
    value: V,
    fingerprint: Fingerprint,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheMetrics {
    hits: u64,
    misses: u64,
    evictions: u64,
}

struct CacheState<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    metrics: CacheMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_ratio: f64,
}

pub struct FingerprintCache<V> {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> FingerprintCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState {
                entries: IndexMap::new(),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Look up `key`, validating it against the live fingerprint.
    pub fn get(&self, key: &str, current: Option<&Fingerprint>) -> Option<V> {
        let mut state = self.state.lock();
        let fresh = match state.entries.get(key) {
            None => {
                state.metrics.misses += 1;
                return None;
            }
            Some(entry) => {
                entry.inserted_at.elapsed() <= self.ttl
                    && current.is_some_and(|fp| *fp == entry.fingerprint)
            }
        };

        if !fresh {
            state.entries.shift_remove(key);
            state.metrics.misses += 1;
            debug!(key, "cache entry stale, evicted");
            return None;
        }

        state.metrics.hits += 1;
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Read the stored value for `key` without validating it or counting a
    /// lookup.
    pub fn peek<R>(&self, key: &str, read: impl FnOnce(&V) -> R) -> Option<R> {
        self.state.lock().entries.get(key).map(|entry| read(&entry.value))
    }

    /// Store `value` for `key`, evicting the oldest entry when full.
    pub fn insert(&self, key: impl Into<String>, value: V, fingerprint: Fingerprint) {
        let key = key.into();
        let mut state = self.state.lock();
        // Re-inserting moves the key to the back of the insertion order.
        state.entries.shift_remove(&key);
        while state.entries.len() >= self.max_entries {
            if state.entries.shift_remove_index(0).is_none() {
                break;
            }
            state.metrics.evictions += 1;
        }
        state.entries.insert(
            key,
            CacheEntry {
                value,
                fingerprint,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.state.lock().entries.shift_remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        debug!("cache cleared");
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.metrics.hits + state.metrics.misses;
        let hit_ratio = if lookups == 0 {
            0.0
        } else {
            state.metrics.hits as f64 / lookups as f64
        };
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_entries,
            hits: state.metrics.hits,
            misses: state.metrics.misses,
            evictions: state.metrics.evictions,
            hit_ratio,
        }
    }
}
