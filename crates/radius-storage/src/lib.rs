//! Radius Storage - persistence for settings and site overrides.
//!
//! - [`Database`]: SQLite file with a single `kv_store` table
//! - [`KvStore`]: namespaced, cached string store over any [`DurableStorage`]
//! - [`Settings`]: typed user settings
//! - [`KvOverrideStore`]: site overrides for the selector
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radius_storage::{Database, KvStore, Settings};
//!
//! let db = Database::in_memory().unwrap();
//! let settings = Settings::new(KvStore::settings(Arc::new(db)));
//! settings.set_dynamic_loading(true);
//! ```

mod database;
pub mod durable;
pub mod error;
pub mod kv_store;
pub mod overrides;
mod pool;
pub mod repository;
mod schema;
pub mod settings;

pub use database::Database;
pub use durable::{DurableStorage, MemoryStorage};
pub use error::{Result, StorageError};
pub use kv_store::{KvStore, SETTINGS_NAMESPACE};
pub use overrides::{KvOverrideStore, OVERRIDES_KEY};
pub use pool::ConnectionPool;
pub use settings::{Settings, SettingsSnapshot};
