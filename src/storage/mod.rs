//! Storage Engine Module
//!
//! A capacity-bounded, concurrent LRU cache split into independently
//! locked shards.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StripedLru                            │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐   │
//! │  │GuardedLru │ │GuardedLru │ │GuardedLru │ │   ...N    │   │
//! │  │  Mutex    │ │  Mutex    │ │  Mutex    │ │  shards   │   │
//! │  │ SimpleLru │ │ SimpleLru │ │ SimpleLru │ │           │   │
//! │  └───────────┘ └───────────┘ └───────────┘ └───────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`SimpleLru`]: single-threaded, byte-bounded LRU (arena + hash index)
//! - [`GuardedLru`]: one `SimpleLru` behind a mutex
//! - [`StripedLru`]: routes each key to one `GuardedLru` by hash
//!
//! The command layer only sees the [`Storage`] trait.
//!
//! ## Example
//!
//! ```
//! use shardcache::storage::{Storage, StripedLru};
//! use bytes::Bytes;
//!
//! let cache = StripedLru::new(4, 16 * 1024 * 1024).unwrap();
//!
//! cache.put(Bytes::from("name"), Bytes::from("shardcache"));
//! assert_eq!(cache.get(b"name"), Some(Bytes::from("shardcache")));
//!
//! // Set only updates existing keys
//! assert!(!cache.set(b"missing", Bytes::from("value")));
//! ```

pub mod guarded;
pub mod lru;
pub mod striped;


use bytes::Bytes;
use thiserror::Error;

// Re-export commonly used types
pub use guarded::GuardedLru;
pub use lru::SimpleLru;
pub use striped::{StripedLru, MIN_SHARD_SIZE};

/// The operations commands execute against.
///
/// Every method reports failure as a plain `false` / `None`: a missing key
/// or an entry too large for its shard is an expected outcome, not an error.
pub trait Storage: Send + Sync {
    /// Inserts or overwrites `key`.
    fn put(&self, key: Bytes, value: Bytes) -> bool;

    /// Inserts `key` only if it is absent.
    fn put_if_absent(&self, key: Bytes, value: Bytes) -> bool;

    /// Overwrites `key` only if it is present.
    fn set(&self, key: &[u8], value: Bytes) -> bool;

    /// Removes `key` if present.
    fn delete(&self, key: &[u8]) -> bool;

    /// Returns the value of `key`, marking it most recently used.
    fn get(&self, key: &[u8]) -> Option<Bytes>;
}

/// Errors raised while constructing storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("shard count must be at least 1")]
    NoShards,

    #[error("shard budget too small: {shard_size} bytes (min: {min})")]
    ShardTooSmall { shard_size: usize, min: usize },
}
