//! Key-value storage primitives.
//!
//! Everything the core persists goes through [`PrimitiveStore`]: a string
//! store with an optional per-value byte capacity, mirroring the bounded
//! preference stores found on mobile targets. Values larger than the
//! capacity are rejected here and split by the chunked layer above.

use crate::error::StoreError;
use crate::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default per-value capacity in bytes, matching the bounded preference
/// stores shipped on mobile targets.
pub const DEFAULT_VALUE_CAPACITY: usize = 2000;

/// Tuning for the persistent store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Per-value byte capacity, `None` for unbounded.
    pub value_capacity: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_local_dir()
                .unwrap_or_default()
                .join("shariaa")
                .join("storage.db"),
            value_capacity: Some(DEFAULT_VALUE_CAPACITY),
        }
    }
}

/// A synchronous string key-value store with an optional value-size bound.
pub trait PrimitiveStore: Send + Sync {
    /// Read a value. Absent keys are `Ok(None)`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// Fails with [`StoreError::ValueTooLarge`] when the value's byte
    /// length exceeds [`capacity`](PrimitiveStore::capacity).
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Maximum value size in bytes, `None` when unbounded.
    fn capacity(&self) -> Option<usize>;
}

/// In-memory store, used in tests and as a process-local cache.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    /// Store without a value-size bound.
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Store that rejects values larger than `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl PrimitiveStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        enforce_capacity(key, value, self.capacity)?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// SQLite-backed store for persistent installs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    capacity: Option<usize>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            capacity: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the store a [`StorageConfig`] describes.
    pub fn from_config(config: &StorageConfig) -> StoreResult<Self> {
        let mut store = Self::open(&config.db_path)?;
        store.capacity = config.value_capacity;
        Ok(store)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            capacity: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Impose a value-size bound on an open store.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Initialize database schema.
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl PrimitiveStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        enforce_capacity(key, value, self.capacity)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

fn enforce_capacity(key: &str, value: &str, capacity: Option<usize>) -> StoreResult<()> {
    match capacity {
        Some(cap) if value.len() > cap => Err(StoreError::ValueTooLarge {
            key: key.to_string(),
            size: value.len(),
            capacity: cap,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::unbounded();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // Deleting an absent key is fine
        store.delete("k").unwrap();
    }

    #[test]
    fn test_memory_store_enforces_capacity() {
        let store = MemoryStore::with_capacity(8);
        store.set("k", "12345678").unwrap();

        let err = store.set("k", "123456789").unwrap_err();
        match err {
            StoreError::ValueTooLarge { size, capacity, .. } => {
                assert_eq!(size, 9);
                assert_eq!(capacity, 8);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The previous value survives a rejected write
        assert_eq!(store.get("k").unwrap().as_deref(), Some("12345678"));
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kv.db");

        let store = SqliteStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));

        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_capacity() {
        let store = SqliteStore::open_in_memory().unwrap().with_capacity(4);
        store.set("k", "1234").unwrap();
        assert!(store.set("k", "12345").is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.value_capacity, Some(DEFAULT_VALUE_CAPACITY));
        assert!(config.db_path.ends_with("shariaa/storage.db"));
    }

    #[test]
    fn test_sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            db_path: dir.path().join("kv.db"),
            value_capacity: Some(16),
        };

        let store = SqliteStore::from_config(&config).unwrap();
        assert_eq!(store.capacity(), Some(16));
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
