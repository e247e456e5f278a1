//! Per-domain configuration overrides.
//!
//! An override records the candidate index that a domain last switched to,
//! so the next visit starts there instead of at index 0. The persisted form
//! is a flat JSON object `{ "domain": index }`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::configuration::CANDIDATES;
use crate::site_table::normalize_domain;

/// Map from normalized domain to candidate index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteOverrides {
    entries: BTreeMap<String, usize>,
}

impl SiteOverrides {
    /// Creates an empty override table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored index for a domain.
    pub fn get(&self, domain: &str) -> Option<usize> {
        self.entries.get(&normalize_domain(domain)).copied()
    }

    /// Records an index for a domain.
    ///
    /// Index 0 and out-of-range indices are rejected; returns whether the
    /// table changed.
    pub fn set(&mut self, domain: &str, index: usize) -> bool {
        if !is_storable(index) {
            return false;
        }
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return false;
        }
        self.entries.insert(domain, index) != Some(index)
    }

    /// Number of domains with an override.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every override.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over `(domain, index)` pairs in domain order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(d, i)| (d.as_str(), *i))
    }

    /// Serializes to the persisted JSON object form.
    pub fn to_json(&self) -> String {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(d, i)| (d.clone(), Value::from(*i as u64)))
            .collect();
        Value::Object(map).to_string()
    }

    /// Parses the persisted JSON form.
    ///
    /// Tolerant of hand-edited or stale data: numeric strings are accepted,
    /// anything else (and index 0 or out-of-range indices) is dropped. A
    /// document that is not a JSON object yields an empty table.
    pub fn from_json(raw: &str) -> Self {
        let mut overrides = Self::new();

        let map = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("Ignoring site overrides: not a JSON object");
                return overrides;
            }
            Err(e) => {
                warn!("Ignoring unreadable site overrides: {}", e);
                return overrides;
            }
        };

        for (domain, value) in map {
            let index = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            if let Some(index) = index.and_then(|i| usize::try_from(i).ok()) {
                overrides.set(&domain, index);
            }
        }

        overrides
    }
}

/// Index 0 is the default start; anything past the list is unusable.
fn is_storable(index: usize) -> bool {
    index > 0 && index < CANDIDATES.len()
}

/// Durable home of the override table.
///
/// Implementations must not fail loudly: unavailable storage loads as an
/// empty table and saves are dropped with a log line.
pub trait OverrideStore: Send + Sync {
    /// Loads the persisted table.
    fn load(&self) -> SiteOverrides;

    /// Persists the whole table.
    fn save(&self, overrides: &SiteOverrides);

    /// Removes the persisted table.
    fn clear(&self);
}

/// In-process override store (for tests and ephemeral sessions).
#[derive(Debug, Clone, Default)]
pub struct MemoryOverrideStore {
    inner: Arc<Mutex<Option<String>>>,
}

impl MemoryOverrideStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw persisted JSON, if any.
    pub fn raw(&self) -> Option<String> {
        self.inner.lock().clone()
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn load(&self) -> SiteOverrides {
        self.raw()
            .map(|raw| SiteOverrides::from_json(&raw))
            .unwrap_or_default()
    }

    fn save(&self, overrides: &SiteOverrides) {
        *self.inner.lock() = Some(overrides.to_json());
    }

    fn clear(&self) {
        *self.inner.lock() = None;
    }
}
