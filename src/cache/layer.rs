//! Cache layer that orchestrates expiry with network fetching.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::storage::KvStore;

use super::keys::CacheKey;

/// How long an entry stays valid, in milliseconds (one hour).
pub const CACHE_TTL_MILLIS: i64 = 60 * 60 * 1000;

/// On-disk shape of a cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
  data: T,
  timestamp: i64,
}

/// Where a cache-backed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, younger than the TTL
  Cache,
}

/// Result from a read-through fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

/// Time-boxed cache over a durable key-value store.
///
/// Caching is best-effort: storage and parse failures are logged and
/// behave like a miss, and never reach the caller.
pub struct Cache<S: KvStore> {
  storage: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: KvStore> Cache<S> {
  /// Create a new cache on the given storage backend, using the wall clock.
  pub fn new(storage: Arc<S>) -> Self {
    Self::with_clock(storage, Arc::new(SystemClock))
  }

  pub fn with_clock(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
    Self { storage, clock }
  }

  fn is_expired(&self, timestamp: i64) -> bool {
    self.clock.now_millis() - timestamp > CACHE_TTL_MILLIS
  }

  /// Get a cached payload if present and not expired.
  ///
  /// Expired entries are deleted as a side effect.
  pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
    let key = key.as_storage_key();

    let raw = match self.storage.get(&key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %key, error = %e, "Error reading from cache");
        return None;
      }
    };

    let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key = %key, error = %e, "Malformed cache entry");
        return None;
      }
    };

    if self.is_expired(entry.timestamp) {
      debug!(key = %key, "Cache entry expired");
      if let Err(e) = self.storage.remove(&key) {
        warn!(key = %key, error = %e, "Error evicting expired cache entry");
      }
      return None;
    }

    match serde_json::from_value(entry.data) {
      Ok(data) => Some(data),
      Err(e) => {
        warn!(key = %key, error = %e, "Cached payload has unexpected shape");
        None
      }
    }
  }

  /// Store a payload stamped with the current time.
  pub fn set<T: Serialize>(&self, key: &CacheKey, data: &T) {
    let key = key.as_storage_key();
    let entry = CacheEntry {
      data,
      timestamp: self.clock.now_millis(),
    };

    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key = %key, error = %e, "Error serializing cache entry");
        return;
      }
    };

    if let Err(e) = self.storage.set(&key, &raw) {
      warn!(key = %key, error = %e, "Error saving to cache");
    }
  }

  /// Drop a single entry.
  pub fn remove(&self, key: &CacheKey) {
    let key = key.as_storage_key();
    if let Err(e) = self.storage.remove(&key) {
      warn!(key = %key, error = %e, "Error removing from cache");
    }
  }

  /// Read-through fetch.
  ///
  /// 1. Check cache - if valid, return without calling `fetcher`
  /// 2. Otherwise call `fetcher`
  /// 3. On success store the data; on error store nothing and pass it on
  pub async fn fetch<T, E, F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<CacheResult<T>, E>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(data) = self.get(key) {
      debug!(key = %key, "Cache hit");
      return Ok(CacheResult {
        data,
        source: CacheSource::Cache,
      });
    }

    debug!(key = %key, "Cache miss");
    let data = fetcher().await?;
    self.set(key, &data);
    Ok(CacheResult {
      data,
      source: CacheSource::Network,
    })
  }
}

impl<S: KvStore> Clone for Cache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
    }
  }
}
