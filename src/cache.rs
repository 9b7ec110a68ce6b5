//! Bounded FIFO caches for decoded ledger entities.
//!
//! Insertion order is the only eviction signal: when a cache is full the
//! single oldest entry is dropped before the new one is pushed. No
//! promotion, no per-access bookkeeping. Lookup is a linear scan, which is
//! fine at the target capacity (~1000 entries per kind).

use std::collections::VecDeque;

use crate::types::{Block, BlockId, Transaction};

/// Fixed-capacity FIFO ring of entities.
#[derive(Debug)]
pub struct FifoCache<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> FifoCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert, evicting the oldest entry first when at capacity.
    pub fn insert(&mut self, entry: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn find(&self, matches: impl Fn(&T) -> bool) -> Option<&T> {
        self.entries.iter().find(|e| matches(*e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in insertion order, oldest first. Used by tests.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Block cache addressable by height or hash.
///
/// Both axes resolve to the same entry: a block inserted once answers
/// lookups by its `index` and by its `hash`.
#[derive(Debug)]
pub struct BlockCache {
    inner: FifoCache<Block>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: FifoCache::new(capacity),
        }
    }

    pub fn get(&self, id: &BlockId) -> Option<Block> {
        self.inner.find(|b| id.matches(b)).cloned()
    }

    pub fn insert(&mut self, block: Block) {
        self.inner.insert(block);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Transaction cache addressable by hash only.
#[derive(Debug)]
pub struct TransactionCache {
    inner: FifoCache<Transaction>,
}

impl TransactionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: FifoCache::new(capacity),
        }
    }

    pub fn get(&self, hash: &str) -> Option<Transaction> {
        self.inner.find(|t| t.hash == hash).cloned()
    }

    pub fn insert(&mut self, transaction: Transaction) {
        self.inner.insert(transaction);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
