//! High-level database interface.

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::pool::ConnectionPool;
use crate::repository::KvRepo;

/// SQLite-backed durable storage for Radius.
#[derive(Debug, Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Opens the database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Opens the database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "radius", "radius")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("radius.db"))
    }

    // === Key-value ===

    /// Reads a value.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        KvRepo::get(&self.pool.get(), key)
    }

    /// Writes a value.
    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        KvRepo::set(&self.pool.get(), key, value)
    }

    /// Deletes a value.
    pub fn delete_value(&self, key: &str) -> Result<bool> {
        KvRepo::delete(&self.pool.get(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let db = Database::in_memory().unwrap();
        db.set_value("a", "1").unwrap();
        assert_eq!(db.get_value("a").unwrap(), Some("1".to_string()));
        assert!(db.delete_value("a").unwrap());
        assert_eq!(db.get_value("a").unwrap(), None);
    }

    #[test]
    fn with_path_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("radius.db");

        let db = Database::with_path(&path).unwrap();
        db.set_value("k", "v").unwrap();
        drop(db);

        assert!(path.exists());
        let reopened = Database::with_path(&path).unwrap();
        assert_eq!(reopened.get_value("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn default_path_ends_with_db_name() {
        if let Ok(path) = Database::default_db_path() {
            assert!(path.ends_with("radius.db"));
        }
    }
}
