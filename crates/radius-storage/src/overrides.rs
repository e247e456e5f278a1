//! Site overrides persisted in the key-value store.

use radius_core::overrides::{OverrideStore, SiteOverrides};
use tracing::debug;

use crate::kv_store::KvStore;

/// Settings key holding the override JSON object.
pub const OVERRIDES_KEY: &str = "dynamicLoadingOverrides";

/// [`OverrideStore`] backed by a [`KvStore`] namespace.
#[derive(Debug, Clone)]
pub struct KvOverrideStore {
    kv: KvStore,
}

impl KvOverrideStore {
    /// Stores overrides under [`OVERRIDES_KEY`] in `kv`'s namespace.
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }
}

impl OverrideStore for KvOverrideStore {
    fn load(&self) -> SiteOverrides {
        match self.kv.get(OVERRIDES_KEY) {
            Some(raw) => SiteOverrides::from_json(&raw),
            None => SiteOverrides::new(),
        }
    }

    fn save(&self, overrides: &SiteOverrides) {
        debug!("Saving {} site override(s)", overrides.len());
        self.kv.set(OVERRIDES_KEY, &overrides.to_json());
    }

    fn clear(&self) {
        self.kv.remove(OVERRIDES_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::{DurableStorage, MemoryStorage};
    use std::sync::Arc;

    fn setup() -> (KvOverrideStore, MemoryStorage) {
        let backend = MemoryStorage::new();
        let kv = KvStore::settings(Arc::new(backend.clone()));
        (KvOverrideStore::new(kv), backend)
    }

    #[test]
    fn persists_under_settings_key() {
        let (store, backend) = setup();
        let mut o = SiteOverrides::new();
        o.set("example.com", 2);
        store.save(&o);

        assert_eq!(
            backend
                .get("radius||settings||dynamicLoadingOverrides")
                .unwrap(),
            Some(r#"{"example.com":2}"#.to_string())
        );
        assert_eq!(store.load(), o);
    }

    #[test]
    fn missing_or_corrupt_loads_empty() {
        let (store, backend) = setup();
        assert!(store.load().is_empty());

        backend
            .set("radius||settings||dynamicLoadingOverrides", "{broken")
            .unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn clear_removes_key() {
        let (store, backend) = setup();
        let mut o = SiteOverrides::new();
        o.set("example.com", 1);
        store.save(&o);
        store.clear();

        assert!(backend.is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radius.db");
        {
            let db = crate::Database::with_path(&path).unwrap();
            let store = KvOverrideStore::new(KvStore::settings(Arc::new(db)));
            let mut o = SiteOverrides::new();
            o.set("discord.com", 4);
            store.save(&o);
        }

        let db = crate::Database::with_path(&path).unwrap();
        let store = KvOverrideStore::new(KvStore::settings(Arc::new(db)));
        assert_eq!(store.load().get("discord.com"), Some(4));
    }
}
