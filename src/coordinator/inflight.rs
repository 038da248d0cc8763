//! In-flight download registry.
//!
//! One async mutex per key being downloaded. Requesters for the same key
//! queue on it, so only one of them fetches while the rest wait and then
//! read the freshly cached file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
pub struct InflightRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other requester holds `key`, then holds it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> InflightGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        // registered before waiting so a cancelled wait still cleans up
        let registration = Registration {
            registry: self,
            key: key.to_string(),
            slot,
        };
        let lock = Arc::clone(&registration.slot).lock_owned().await;

        InflightGuard {
            _lock: lock,
            _registration: registration,
        }
    }

    /// Number of keys currently downloading or awaited.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key. Field order matters: the lock is released
/// before the registration is cleaned up.
#[derive(Debug)]
pub struct InflightGuard<'a> {
    _lock: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

#[derive(Debug)]
struct Registration<'a> {
    registry: &'a InflightRegistry,
    key: String,
    slot: Slot,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slots = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let last_user = match slots.get(&self.key) {
            // the map's reference plus ours
            Some(slot) => Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(&self.slot) == 2,
            None => false,
        };
        if last_user {
            slots.remove(&self.key);
        }
    }
}
