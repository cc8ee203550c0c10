//! Byte-Bounded LRU Shard
//!
//! A single-threaded LRU map whose capacity is measured in bytes
//! (`len(key) + len(value)` summed over all entries) rather than entry count.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SimpleLru                             │
//! │                                                              │
//! │  index: HashMap<Bytes, usize> ──┐  (handles, not pointers)   │
//! │                                 ▼                            │
//! │  slots: Vec<Option<Node>>   [0] [1] [2] [3] ...              │
//! │                                                              │
//! │  head ──► [A] ◄──► [B] ◄──► [C] ◄── tail                     │
//! │           LRU                MRU                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes live in an arena and link to each other by slot index. The hash
//! index maps a key to the slot holding it. Freed slots are recycled through
//! a free list, so a handle is only ever reused after its node is gone from
//! both the list and the index.
//!
//! Eviction always removes the head. Every successful `get`, `set` or updating
//! `put` relocates the touched node to the tail.

use bytes::Bytes;
use std::collections::HashMap;

/// A single entry in the freshness list.
#[derive(Debug)]
struct Node {
    key: Bytes,
    value: Bytes,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Node {
    #[inline]
    fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// A capacity-bounded LRU cache. Not thread-safe; see
/// [`GuardedLru`](crate::storage::GuardedLru) for the locked variant.
#[derive(Debug)]
pub struct SimpleLru {
    /// Maximum number of key + value bytes held at once
    max_size: usize,
    /// Key + value bytes currently held
    cur_size: usize,
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<Bytes, usize>,
    /// Least recently used
    head: Option<usize>,
    /// Most recently used
    tail: Option<usize>,
}

impl SimpleLru {
    /// Creates an empty cache holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            cur_size: 0,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Inserts `key` or overwrites its value.
    ///
    /// Returns `false`, leaving the cache untouched, if the entry could not
    /// fit even in an otherwise empty cache.
    pub fn put(&mut self, key: Bytes, value: Bytes) -> bool {
        match self.index.get(&key) {
            Some(&idx) => self.update(idx, value),
            None => self.insert(key, value),
        }
    }

    /// Inserts `key` only if it is not already present.
    pub fn put_if_absent(&mut self, key: Bytes, value: Bytes) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.insert(key, value)
    }

    /// Overwrites the value of an existing key. Fails if the key is absent.
    pub fn set(&mut self, key: &[u8], value: Bytes) -> bool {
        match self.index.get(key) {
            Some(&idx) => self.update(idx, value),
            None => false,
        }
    }

    /// Removes `key`. Fails if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        let idx = *self.index.get(key)?;
        self.move_to_tail(idx);
        Some(self.node(idx).value.clone())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently used by keys and values.
    pub fn size(&self) -> usize {
        self.cur_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Iterates keys from least to most recently used.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            lru: self,
            cursor: self.head,
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.cur_size = 0;
    }

    fn insert(&mut self, key: Bytes, value: Bytes) -> bool {
        let size = key.len() + value.len();
        if size > self.max_size {
            return false;
        }

        while self.cur_size + size > self.max_size {
            self.evict_head();
        }

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.push_back(idx);
        self.index.insert(key, idx);
        self.cur_size += size;
        true
    }

    fn update(&mut self, idx: usize, value: Bytes) -> bool {
        let (key_len, old_len) = {
            let node = self.node(idx);
            (node.key.len(), node.value.len())
        };
        if key_len + value.len() > self.max_size {
            return false;
        }

        self.move_to_tail(idx);

        // The updated node sits at the tail and fits alone, so the loop
        // stops before the head could reach it.
        while self.cur_size - old_len + value.len() > self.max_size {
            debug_assert_ne!(self.head, Some(idx));
            self.evict_head();
        }

        self.cur_size = self.cur_size - old_len + value.len();
        self.node_mut(idx).value = value;
        true
    }

    fn evict_head(&mut self) {
        if let Some(head) = self.head {
            self.remove(head);
        }
    }

    fn remove(&mut self, idx: usize) -> Node {
        self.unlink(idx);
        let node = self.slots[idx]
            .take()
            .unwrap_or_else(|| unreachable!("index points at a vacant slot"));
        self.index.remove(&node.key);
        self.free.push(idx);
        self.cur_size -= node.size();
        node
    }

    fn move_to_tail(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_back(idx);
    }

    /// Detaches a node from its neighbours, fixing `head`/`tail` as needed.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    /// Links a detached node after the current tail.
    fn push_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        {
            let node = self.node_mut(idx);
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => self.node_mut(t).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    #[inline]
    fn node(&self, idx: usize) -> &Node {
        self.slots[idx]
            .as_ref()
            .unwrap_or_else(|| unreachable!("linked slot {} is vacant", idx))
    }

    #[inline]
    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked slot {} is vacant", idx))
    }

    /// Walks the list in both directions and cross-checks it against the
    /// index and the byte counter. Panics on any inconsistency.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut forward = Vec::new();
        let mut size = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.node(idx);
            assert_eq!(node.prev, prev, "broken back link at slot {}", idx);
            assert_eq!(self.index.get(&node.key), Some(&idx), "index mismatch");
            forward.push(idx);
            size += node.size();
            prev = Some(idx);
            cursor = node.next;
            assert!(forward.len() <= self.index.len(), "cycle in list");
        }
        assert_eq!(self.tail, prev, "tail does not end the list");
        assert_eq!(forward.len(), self.index.len(), "list/index size mismatch");
        assert_eq!(size, self.cur_size, "byte counter drifted");
        assert!(self.cur_size <= self.max_size, "over budget");

        let mut backward = Vec::new();
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            backward.push(idx);
            cursor = self.node(idx).prev;
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }
}

/// Iterator over keys in LRU order, returned by [`SimpleLru::keys`].
pub struct Keys<'a> {
    lru: &'a SimpleLru,
    cursor: Option<usize>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.lru.node(self.cursor?);
        self.cursor = node.next;
        Some(&node.key)
    }
}
