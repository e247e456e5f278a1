//! Namespaced key-value store with a short-lived read cache.
//!
//! Keys are stored as `"{prefix}||{key}"`. Reads are served from a shared
//! in-memory cache while the cached value is younger than the TTL; writes go
//! straight through to the durable backend. Backend failures are logged and
//! swallowed: a failed read looks like a missing key.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::durable::DurableStorage;

/// Namespace for application settings.
pub const SETTINGS_NAMESPACE: &str = "radius||settings";

/// How long a cached read stays fresh.
pub const CACHE_TTL: Duration = Duration::from_millis(5000);

/// Cache size that triggers eviction.
pub const CACHE_MAX_ENTRIES: usize = 100;

/// Entries dropped per eviction (20% of the maximum).
pub const CACHE_EVICT_COUNT: usize = 20;

/// Joins a namespace prefix and a key.
pub fn full_key(prefix: &str, key: &str) -> String {
    format!("{}||{}", prefix, key)
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug)]
struct CachedValue {
    value: String,
    stored_at: Instant,
}

/// Insertion-ordered cache shared by every store of one backend.
#[derive(Debug, Default)]
struct ReadCache {
    entries: HashMap<String, CachedValue>,
    order: VecDeque<String>,
}

impl ReadCache {
    fn fresh(&self, key: &str, ttl: Duration) -> Option<String> {
        self.entries
            .get(key)
            .filter(|cached| cached.stored_at.elapsed() < ttl)
            .map(|cached| cached.value.clone())
    }

    fn insert(&mut self, key: &str, value: String) {
        let cached = CachedValue {
            value,
            stored_at: Instant::now(),
        };
        if self.entries.insert(key.to_string(), cached).is_none() {
            self.order.push_back(key.to_string());
        }
    }

    /// Drops the oldest entries once the cache is full.
    fn make_room(&mut self) {
        if self.entries.len() < CACHE_MAX_ENTRIES {
            return;
        }
        for _ in 0..CACHE_EVICT_COUNT {
            match self.order.pop_front() {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Namespaced view over a durable backend.
#[derive(Clone)]
pub struct KvStore {
    prefix: String,
    backend: Arc<dyn DurableStorage>,
    cache: Arc<Mutex<ReadCache>>,
    ttl: Duration,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("prefix", &self.prefix)
            .field("cached", &self.cache.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl KvStore {
    /// Creates a store with its own cache.
    pub fn new(prefix: impl Into<String>, backend: Arc<dyn DurableStorage>) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
            cache: Arc::new(Mutex::new(ReadCache::default())),
            ttl: CACHE_TTL,
        }
    }

    /// Creates the application settings store.
    pub fn settings(backend: Arc<dyn DurableStorage>) -> Self {
        Self::new(SETTINGS_NAMESPACE, backend)
    }

    /// Overrides the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns a store under another prefix sharing this backend and cache.
    pub fn namespace(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }

    /// Returns the namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Reads a value, preferring a fresh cached copy.
    pub fn get(&self, key: &str) -> Option<String> {
        let full = full_key(&self.prefix, key);

        if let Some(value) = self.cache.lock().fresh(&full, self.ttl) {
            return Some(value);
        }

        let value = match self.backend.get(&full) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {}: {}", full, e);
                return None;
            }
        };

        let mut cache = self.cache.lock();
        cache.make_room();
        if let Some(ref value) = value {
            cache.insert(&full, value.clone());
        }

        value
    }

    /// Writes a value through to the backend.
    pub fn set(&self, key: &str, value: &str) {
        let full = full_key(&self.prefix, key);

        if let Err(e) = self.backend.set(&full, value) {
            warn!("Failed to write {}: {}", full, e);
            // Stale copies must not outlive a failed write.
            self.cache.lock().remove(&full);
            return;
        }

        self.cache.lock().insert(&full, value.to_string());
    }

    /// Deletes a value from the backend and the cache.
    pub fn remove(&self, key: &str) {
        let full = full_key(&self.prefix, key);

        if let Err(e) = self.backend.remove(&full) {
            warn!("Failed to remove {}: {}", full, e);
        }
        self.cache.lock().remove(&full);
    }

    /// Drops every cached entry for every namespace sharing this cache.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached entries.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}
