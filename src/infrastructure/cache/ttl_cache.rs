use crate::domain::ports::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).to_std().unwrap_or(Duration::ZERO);
        age < self.ttl
    }
}

/// In-memory memoization with a per-entry time-to-live.
///
/// Expiry is lazy: an expired entry stays in the map, and counts towards
/// `len()`, until it is overwritten or the cache is cleared. `get` simply
/// stops returning it.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.is_valid_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Stores `value`, replacing whatever was under `key`.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Physically present entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
