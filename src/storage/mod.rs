//! Durable key-value storage shared by the cache and the cart.
//!
//! Both consumers store serialized JSON strings under fixed keys, so the
//! storage contract is string-in/string-out. Callers decide how
//! to react to failures; the cache and the cart both log and carry on.

mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

pub use sqlite::SqliteStore;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to create storage directory {path}: {source}")]
  CreateDir {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("could not determine data directory")]
  NoDataDir,

  #[error("storage lock poisoned")]
  LockPoisoned,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Trait for durable key-value backends.
pub trait KvStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get(&self, key: &str) -> StorageResult<Option<String>>;

  /// Write `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> StorageResult<()>;

  /// Delete `key`. Deleting a missing key is not an error.
  fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> StorageResult<Option<String>> {
    let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> StorageResult<()> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> StorageResult<()> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    entries.remove(key);
    Ok(())
  }
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
  fn get(&self, key: &str) -> StorageResult<Option<String>> {
    (**self).get(key)
  }

  fn set(&self, key: &str, value: &str) -> StorageResult<()> {
    (**self).set(key, value)
  }

  fn remove(&self, key: &str) -> StorageResult<()> {
    (**self).remove(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_store_set_get_remove() {
    let store = MemoryStore::new();
    assert_eq!(store.get("k").unwrap(), None);

    store.set("k", "v1").unwrap();
    store.set("k", "v2").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
  }

  #[test]
  fn test_remove_missing_key_is_ok() {
    let store = MemoryStore::new();
    assert!(store.remove("nothing-here").is_ok());
  }
}
