//! LRU Tracker Module
//!
//! Tracks recency order of cache keys for eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Every touch stamps the key with a monotonically increasing tick. The
/// smallest tick is the least recently used key, the largest the most recent.
/// Touch, remove and evict are all `O(log n)`.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// tick -> key, ordered oldest first
    order: BTreeMap<u64, String>,
    /// key -> current tick
    ticks: HashMap<String, u64>,
    /// Next tick to hand out
    clock: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if new.
    pub fn touch(&mut self, key: &str) {
        let tick = self.clock;
        self.clock += 1;

        match self.ticks.get_mut(key) {
            Some(old) => {
                let owned = self.order.remove(&*old).unwrap_or_else(|| key.to_string());
                *old = tick;
                self.order.insert(tick, owned);
            }
            None => {
                self.ticks.insert(key.to_string(), tick);
                self.order.insert(tick, key.to_string());
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    /// Keys from most to least recently used.
    pub fn most_recent_first(&self) -> impl Iterator<Item = &String> {
        self.order.values().rev()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
