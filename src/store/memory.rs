// src/store/memory.rs
// =============================================================================
// In-process content store backed by a sharded DashMap.
//
// Nothing touches the disk, so this is what tests and library users reach
// for when they don't want a data directory. Records live as long as the
// store does.
//
// Rust concepts:
// - DashMap: a HashMap split into shards, each behind its own RwLock
// - AtomicUsize: a counter many tasks can bump through &self
// =============================================================================

use super::{ContentStore, PageRecord, StoreError};
use crate::key::PageKey;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<PageKey, PageRecord>,
    // Counts overwrites too, so tests can spot duplicate work
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of put() calls so far, including overwrites
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Stored page URLs, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.records.iter().map(|r| r.url.clone()).collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn has(&self, key: &PageKey) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(key))
    }

    async fn get(&self, key: &PageKey) -> Result<Option<PageRecord>, StoreError> {
        // Clone out of the guard so the shard lock is released right away
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &PageKey, record: &PageRecord) -> Result<(), StoreError> {
        // insert() replaces an existing record, which keeps put() idempotent
        self.records.insert(key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<PageKey>, StoreError> {
        Ok(self.records.iter().map(|r| r.key().clone()).collect())
    }
}
