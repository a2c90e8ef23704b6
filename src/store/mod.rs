// src/store/mod.rs
// =============================================================================
// The content store: where crawled pages end up.
//
// The crawler only needs a narrow contract from storage:
// - has/get/put by PageKey
// - keys(), to rebuild the set of already-crawled pages at startup
//
// Backends:
// - fs: one pretty-printed JSON file per key in a data directory
// - memory: a sharded in-process map (tests, dry runs, library use)
//
// put() must be idempotent for the same key and must not serialize writes to
// different keys behind one global lock.
//
// Rust concepts:
// - #[async_trait]: async fns in a trait that is used as `dyn ContentStore`
// - Send + Sync bound: the store is shared across tokio worker threads
// - #[serde(default)]: a missing JSON field becomes the type's default
// =============================================================================

mod fs;
mod memory;

pub use fs::{FsStore, StoreStatus};
pub use memory::MemoryStore;

use crate::key::PageKey;
use async_trait::async_trait;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One stored article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Outbound article links, kept so a stored page can be traversed
    /// without fetching it again. Records written without it load as empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

/// Why a store operation failed
///
/// Only `Io` is worth retrying; the other two mean the data itself is wrong.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize record {key}: {source}")]
    Serialize {
        key: PageKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("record {key} is corrupt: {reason}")]
    Corrupt { key: PageKey, reason: String },
}

// The contract every backend implements
//
// All methods take &self: backends handle their own locking, so one
// Arc<dyn ContentStore> can serve every worker at once.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether a record exists under `key`, without reading it
    async fn has(&self, key: &PageKey) -> Result<bool, StoreError>;

    /// The record under `key`, or None if there is none
    async fn get(&self, key: &PageKey) -> Result<Option<PageRecord>, StoreError>;

    /// Writes `record` under `key`. Writing the same key twice is not an error.
    async fn put(&self, key: &PageKey, record: &PageRecord) -> Result<(), StoreError>;

    /// Every key currently stored
    async fn keys(&self) -> Result<Vec<PageKey>, StoreError>;
}

// The set of keys known to be stored
//
// Built once at crawl start from the store's own enumeration, so dedup holds
// across restarts, then grows as this run stores pages. DashSet shards its
// locks, so workers inserting different keys don't contend.
#[derive(Debug, Default)]
pub struct CrawledRegistry {
    keys: DashSet<PageKey>,
}

impl CrawledRegistry {
    // Seeds the registry with every key the store already holds
    pub async fn load(store: &dyn ContentStore) -> Result<Self, StoreError> {
        // DashSet::insert takes &self, so no `mut` is needed here
        let registry = Self::default();
        for key in store.keys().await? {
            registry.keys.insert(key);
        }
        Ok(registry)
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.keys.contains(key)
    }

    // Returns true if the key was not known before
    pub fn insert(&self, key: PageKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why a registry on top of store.has()?
//    - A set lookup in memory costs nothing next to a filesystem call
//    - It also covers pages this run stored a moment ago
//
// 2. Why keep `links` in the record at all?
//    - A page found in the store isn't fetched again
//    - Without its links, traversal would stop at every stored page
//
// 3. Why is ContentStore a trait?
//    - The crawler only needs has/get/put/keys
//    - The filesystem and in-memory backends, and test doubles, all plug in
//      behind the same Arc<dyn ContentStore>
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of;

    fn record(url: &str) -> PageRecord {
        PageRecord {
            title: "T".to_string(),
            url: url.to_string(),
            content: "c".to_string(),
            links: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_registry_reflects_existing_records() {
        let store = MemoryStore::new();
        let a = key_of("https://example.org/wiki/A");
        let b = key_of("https://example.org/wiki/B");
        store.put(&a, &record("https://example.org/wiki/A")).await.unwrap();

        let registry = CrawledRegistry::load(&store).await.unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&a));
        assert!(!registry.contains(&b));
        assert!(registry.insert(b.clone()));
        assert!(!registry.insert(b));
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record("https://example.org/wiki/A")).unwrap();
        // Empty link lists are left out so records match the plain
        // {title, url, content} layout
        assert_eq!(
            json,
            serde_json::json!({
                "title": "T",
                "url": "https://example.org/wiki/A",
                "content": "c"
            })
        );

        let parsed: PageRecord = serde_json::from_value(json).unwrap();
        assert!(parsed.links.is_empty());
    }
}
