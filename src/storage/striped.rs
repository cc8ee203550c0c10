//! Striped (Sharded) LRU Cache
//!
//! Splits one byte budget across N independently locked [`GuardedLru`]
//! shards. A key is routed to `hash(key) % N` and never moves.
//!
//! ```text
//!                 hash(key) % N
//!                      │
//!      ┌───────────────┼───────────────┐
//!      ▼               ▼               ▼
//! ┌─────────┐     ┌─────────┐     ┌─────────┐
//! │ Shard 0 │     │ Shard 1 │ ... │ Shard N │
//! │  Mutex  │     │  Mutex  │     │  Mutex  │
//! │   LRU   │     │   LRU   │     │   LRU   │
//! └─────────┘     └─────────┘     └─────────┘
//! ```
//!
//! Capacity and eviction are per shard. A skewed key distribution can fill
//! one shard and evict from it while others still have room.

use crate::storage::guarded::GuardedLru;
use crate::storage::{Storage, StorageError};
use bytes::Bytes;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Smallest budget a single shard may be given (1 MiB).
pub const MIN_SHARD_SIZE: usize = 1024 * 1024;

/// The sharded cache the command layer executes against.
///
/// # Example
///
/// ```
/// use shardcache::storage::{Storage, StripedLru};
/// use bytes::Bytes;
///
/// let cache = StripedLru::new(4, 8 * 1024 * 1024).unwrap();
/// assert!(cache.put(Bytes::from("name"), Bytes::from("value")));
/// assert_eq!(cache.get(b"name"), Some(Bytes::from("value")));
/// ```
#[derive(Debug)]
pub struct StripedLru {
    shards: Vec<GuardedLru>,
}

impl StripedLru {
    /// Creates a cache of `shard_count` shards sharing `max_size` bytes evenly.
    ///
    /// # Errors
    ///
    /// Fails if `shard_count` is zero or a shard would get less than
    /// [`MIN_SHARD_SIZE`] bytes.
    pub fn new(shard_count: usize, max_size: usize) -> Result<Self, StorageError> {
        if shard_count == 0 {
            return Err(StorageError::NoShards);
        }

        let shard_size = max_size / shard_count;
        if shard_size < MIN_SHARD_SIZE {
            return Err(StorageError::ShardTooSmall {
                shard_size,
                min: MIN_SHARD_SIZE,
            });
        }

        let shards = (0..shard_count)
            .map(|_| GuardedLru::new(shard_size))
            .collect();

        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &GuardedLru {
        &self.shards[self.shard_index(key)]
    }

    /// Total live entries across shards. Not a snapshot: shards are locked
    /// one at a time.
    pub fn len(&self) -> usize {
        self.shards.iter().map(GuardedLru::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(GuardedLru::is_empty)
    }

    /// Total key + value bytes across shards.
    pub fn size(&self) -> usize {
        self.shards.iter().map(GuardedLru::size).sum()
    }

    /// Sum of the per-shard budgets.
    pub fn max_size(&self) -> usize {
        self.shards.iter().map(GuardedLru::max_size).sum()
    }
}

impl Storage for StripedLru {
    fn put(&self, key: Bytes, value: Bytes) -> bool {
        self.shard(&key).put(key, value)
    }

    fn put_if_absent(&self, key: Bytes, value: Bytes) -> bool {
        self.shard(&key).put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: Bytes) -> bool {
        self.shard(key).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.shard(key).delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.shard(key).get(key)
    }
}
