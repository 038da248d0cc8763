//! Cache Statistics Module
//!
//! Session counters and the read-only snapshot returned to callers.

use std::path::PathBuf;

use serde::Serialize;

// == Counters ==
/// Running counters kept inside the cache index.
///
/// These are session statistics: they start at zero on every startup and are
/// never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Counters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Cache Stats ==
/// Point-in-time snapshot of the cache.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups served from disk
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Bytes currently accounted to live entries
    pub total_bytes: u64,
    /// Configured capacity in bytes
    pub max_bytes: u64,
    /// Number of live entries
    pub entry_count: usize,
    /// Cache root directory
    pub cache_dir: PathBuf,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
