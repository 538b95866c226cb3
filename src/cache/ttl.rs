//! TTL cache
//!
//! Bounded in-process map with per-entry expiry.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::SharedClock;
use crate::entry::Entry;

use super::{CacheResult, HotCache};

struct Slot {
    entry: Entry,
    expires_at: u64,
}

/// In-process [`HotCache`] with a capacity bound and lazy expiry
pub struct TtlCache {
    slots: Mutex<HashMap<String, Slot>>,
    capacity: usize,
    clock: SharedClock,
}

impl TtlCache {
    pub fn new(capacity: usize, clock: SharedClock) -> Self {
        Self {
            slots: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
            capacity,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl HotCache for TtlCache {
    fn get(&self, key: &str) -> CacheResult<Option<Entry>> {
        let now = self.clock.now_millis();
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) if slot.expires_at > now => Ok(Some(slot.entry.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, entry: &Entry, ttl: Duration) -> CacheResult<()> {
        if self.capacity == 0 || ttl.is_zero() {
            return Ok(());
        }

        let now = self.clock.now_millis();
        let mut slots = self.slots.lock();

        if slots.len() >= self.capacity && !slots.contains_key(&entry.key) {
            slots.retain(|_, slot| slot.expires_at > now);
            if slots.len() >= self.capacity {
                // Still full: drop an arbitrary resident
                if let Some(victim) = slots.keys().next().cloned() {
                    slots.remove(&victim);
                }
            }
        }

        slots.insert(
            entry.key.clone(),
            Slot {
                entry: entry.clone(),
                expires_at: now + ttl.as_millis() as u64,
            },
        );
        Ok(())
    }

    fn invalidate(&self, key: &str) -> CacheResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }

    fn invalidate_many(&self, keys: &[String]) -> CacheResult<()> {
        let mut slots = self.slots.lock();
        for key in keys {
            slots.remove(key);
        }
        Ok(())
    }
}
