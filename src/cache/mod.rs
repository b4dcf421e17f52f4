//! Time-boxed caching of API responses in durable storage.
//!
//! Entries are stored as `{data, timestamp}` and expire one hour after they
//! were written. Expired entries are evicted lazily on the next read.

mod keys;
mod layer;

pub use keys::CacheKey;
pub use layer::{Cache, CacheResult, CacheSource, CACHE_TTL_MILLIS};
