// src/store/fs.rs
// =============================================================================
// Filesystem content store: one JSON file per page.
//
// Layout:
//   <data_dir>/<page-key>.json    {"title": ..., "url": ..., "content": ...}
//
// Writes go to a uniquely named temp file in the same directory and are then
// renamed over the final path. A rename within one directory is atomic, so a
// reader (or a cancelled crawl) sees either the old record or the new one,
// never half a file. Two workers writing the same key simply race to rename
// identical content; whichever lands last wins and nothing is corrupted.
//
// Rust concepts:
// - tokio::fs: async wrappers, so a slow disk doesn't stall the runtime
// - map_err with a closure: attach the path to every std::io::Error
// - static AtomicU64: a process-wide counter without a lock
// =============================================================================

use super::{ContentStore, PageRecord, StoreError};
use crate::key::PageKey;
use async_trait::async_trait;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const EXTENSION: &str = "json";

// Distinguishes temp files written concurrently by this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

/// Health of the data directory, reported by `wikicrawl status`
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub data_dir: PathBuf,
    pub exists: bool,
    pub writable: bool,
    pub records: usize,
}

impl FsStore {
    // Opens (and creates if needed) the data directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &PageKey) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    // Inspects a data directory without creating it
    pub async fn status(dir: impl Into<PathBuf>) -> StoreStatus {
        let dir = dir.into();
        let exists = fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !exists {
            return StoreStatus {
                data_dir: dir,
                exists,
                writable: false,
                records: 0,
            };
        }

        // An unreadable directory reports zero records rather than failing
        let store = Self { dir };
        let records = store.keys().await.map(|k| k.len()).unwrap_or(0);
        let writable = store.can_write().await;
        StoreStatus {
            data_dir: store.dir,
            exists,
            writable,
            records,
        }
    }

    // Writes and removes an empty temp file
    async fn can_write(&self) -> bool {
        let scratch = self.temp_path("write-check");
        let ok = fs::write(&scratch, b"").await.is_ok();
        let _ = fs::remove_file(&scratch).await;
        ok
    }

    // Hidden, and unique per process and per call, so keys() never lists it
    // and two writers never share one
    fn temp_path(&self, stem: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{stem}.{}.{n}.tmp", std::process::id()))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl ContentStore for FsStore {
    // Existence of the file is enough; the record isn't parsed
    async fn has(&self, key: &PageKey) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        fs::try_exists(&path)
            .await
            .map_err(|e| Self::io_error(&path, e))
    }

    async fn get(&self, key: &PageKey) -> Result<Option<PageRecord>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            // A missing file is "not stored", not an error
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })
    }

    async fn put(&self, key: &PageKey, record: &PageRecord) -> Result<(), StoreError> {
        // Pretty-printed and UTF-8 as is: non-ASCII titles stay readable
        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Serialize {
            key: key.clone(),
            source,
        })?;

        // Step 1: the full record goes to a temp file
        let temp = self.temp_path(key.as_str());
        if let Err(e) = fs::write(&temp, &json).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Self::io_error(&temp, e));
        }

        // Step 2: swap it into place in one rename
        let path = self.path_for(key);
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Self::io_error(&path, e));
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<PageKey>, StoreError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?
        {
            // Only <64 hex chars>.json counts; temp files and anything else
            // left in the directory are ignored
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(PageKey::from_hex)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not write straight to <key>.json?
//    - A crash mid-write would leave a truncated file under a valid key
//    - The next run would see the key, skip the page, and keep the broken
//      record forever
//
// 2. Why does has() only check existence?
//    - It runs for every task, so it has to be cheap
//    - A corrupt record surfaces later, when get() parses it
//
// 3. Why is `while let Some(entry) = ...next_entry().await?` a loop?
//    - tokio's ReadDir hands out one entry per call
//    - It returns Ok(None) once the directory is exhausted
// -----------------------------------------------------------------------------
