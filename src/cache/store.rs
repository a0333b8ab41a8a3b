//! Durable key/value store backing the offline cache.
//!
//! One row per collection name ("tasks", "projects", ...) holding the full
//! serialized array, plus `sync-<collection>` rows used by the cross-context
//! change signal. There is no cross-key atomicity: two `set` calls are
//! independent writes and a concurrent reader can observe them in either
//! order.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Trait for the local cache backend.
///
/// Reads and writes must not fail outward: a corrupt or missing entry reads
/// as `None` and callers fall back to an empty collection.
pub trait CacheStore: Send + Sync + 'static {
  /// Raw string read; `None` for missing entries.
  fn get_raw(&self, key: &str) -> Option<String>;

  /// Raw string write; failures are logged, not surfaced.
  fn set_raw(&self, key: &str, value: &str);

  /// Typed read. A corrupt entry is treated as "no cached value".
  fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = self.get_raw(key)?;
    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "discarding corrupt cache entry");
        None
      }
    }
  }

  /// Typed write. Accepts unsized values so slices can be stored directly.
  fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
    match serde_json::to_string(value) {
      Ok(raw) => self.set_raw(key, &raw),
      Err(e) => warn!(key, error = %e, "failed to serialize cache entry"),
    }
  }
}

/// SQLite-backed cache store.
pub struct SqliteCache {
  conn: Mutex<Connection>,
}

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_cache (
    key TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteCache {
  /// Open or create the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the cache database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// In-memory store, used by tests and throwaway contexts.
  pub fn in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tasksync").join("cache.db"))
  }
}

impl CacheStore for SqliteCache {
  fn get_raw(&self, key: &str) -> Option<String> {
    let conn = match self.conn.lock() {
      Ok(conn) => conn,
      Err(poisoned) => poisoned.into_inner(),
    };

    conn
      .query_row(
        "SELECT data FROM kv_cache WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .ok()
  }

  fn set_raw(&self, key: &str, value: &str) {
    let conn = match self.conn.lock() {
      Ok(conn) => conn,
      Err(poisoned) => poisoned.into_inner(),
    };

    let result = conn.execute(
      "INSERT OR REPLACE INTO kv_cache (key, data, written_at) VALUES (?, ?, datetime('now'))",
      params![key, value],
    );
    if let Err(e) = result {
      warn!(key, error = %e, "failed to write cache entry");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Task;

  #[test]
  fn test_roundtrip() {
    let cache = SqliteCache::in_memory().unwrap();
    let tasks = vec![Task::new("a"), Task::new("b")];

    cache.set("tasks", &tasks);
    let loaded: Vec<Task> = cache.get("tasks").unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].title, "a");
  }

  #[test]
  fn test_missing_key_is_none() {
    let cache = SqliteCache::in_memory().unwrap();
    assert!(cache.get::<Vec<Task>>("tasks").is_none());
  }

  #[test]
  fn test_corrupt_entry_is_none() {
    let cache = SqliteCache::in_memory().unwrap();
    cache.set_raw("tasks", "{not valid json");
    assert!(cache.get::<Vec<Task>>("tasks").is_none());
  }

  #[test]
  fn test_overwrite_replaces_previous_value() {
    let cache = SqliteCache::in_memory().unwrap();
    cache.set("tasks", &vec![Task::new("a")]);
    cache.set("tasks", &Vec::<Task>::new());
    let loaded: Vec<Task> = cache.get("tasks").unwrap();
    assert!(loaded.is_empty());
  }

  #[test]
  fn test_two_handles_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let a = SqliteCache::open_at(&path).unwrap();
    let b = SqliteCache::open_at(&path).unwrap();

    a.set_raw("sync-tasks", "1700000000000");
    assert_eq!(b.get_raw("sync-tasks").as_deref(), Some("1700000000000"));
  }
}
