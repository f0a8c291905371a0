//! Keyed slots for concurrent get-or-create caches
//!
//! Each key owns its own slot. The outer map lock is held only long enough to
//! find or insert a slot, so creating values for different keys never blocks,
//! while two callers racing on the same key build the value once.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

type Slot<V> = Arc<Mutex<Option<V>>>;

/// Per-key slot map
pub struct SlotMap<V: Clone> {
    slots: RwLock<HashMap<String, Slot<V>>>,
}

impl<V: Clone> SlotMap<V> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the slot for a key
    fn slot(&self, key: &str) -> Slot<V> {
        {
            let map = self.slots.read();
            if let Some(slot) = map.get(key) {
                return slot.clone();
            }
        }

        let mut map = self.slots.write();
        // Double-check after acquiring write lock
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return the cached value for `key`, or build it.
    ///
    /// `build` runs under the key's slot lock only. A `None` result is not
    /// cached, so the next call builds again.
    pub fn get_or_try_insert_with<F>(&self, key: &str, build: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            return Some(value.clone());
        }
        let value = build()?;
        *guard = Some(value.clone());
        Some(value)
    }

    /// Cached value, if any, without building
    pub fn get(&self, key: &str) -> Option<V> {
        let slot = self.slots.read().get(key).cloned()?;
        let guard = slot.lock();
        guard.clone()
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every slot. Values already handed out stay alive with their holders.
    pub fn clear(&self) {
        self.slots.write().clear();
    }
}

impl<V: Clone> Default for SlotMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
