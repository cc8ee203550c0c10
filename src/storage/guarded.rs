//! Mutex-Guarded LRU Shard
//!
//! Wraps a [`SimpleLru`] in a mutex so it can be shared between connections.
//! `get` reorders the freshness list, so every operation (reads included)
//! needs exclusive access.

use crate::storage::lru::SimpleLru;
use crate::storage::Storage;
use bytes::Bytes;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// A thread-safe LRU shard. Each operation holds the lock for its full
/// duration, so no caller ever observes a half-applied eviction.
#[derive(Debug)]
pub struct GuardedLru {
    inner: Mutex<SimpleLru>,
}

impl GuardedLru {
    /// Creates a shard holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(SimpleLru::new(max_size)),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Bytes currently used by keys and values.
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn max_size(&self) -> usize {
        self.lock().max_size()
    }

    // A panic inside an operation can only come from a broken internal
    // invariant, after which the shard is no worse than before the call.
    fn lock(&self) -> MutexGuard<'_, SimpleLru> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("LRU shard mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Storage for GuardedLru {
    fn put(&self, key: Bytes, value: Bytes) -> bool {
        self.lock().put(key, value)
    }

    fn put_if_absent(&self, key: Bytes, value: Bytes) -> bool {
        self.lock().put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: Bytes) -> bool {
        self.lock().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.lock().delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.lock().get(key)
    }
}
