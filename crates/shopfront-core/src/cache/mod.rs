//! Named response caches for offline access.
//!
//! This module provides `CacheStorage`, the set of named caches the offline
//! worker reads and writes. Each cache maps a request URL to a stored
//! response and is persisted as one JSON file. Entries never expire; a new
//! asset list ships under a new cache name instead.

pub mod error;
pub mod store;

pub use error::CacheError;
pub use store::{Cache, CacheStorage, CachedResponse};
