// src/lib.rs
// =============================================================================
// wikicrawl: a polite, breadth-first crawler for wiki-style sites.
//
// Starting from one article it follows same-site article links up to a depth
// limit and stores every page as a {title, url, content} record keyed by a
// hash of its URL. robots.txt is honored, and a page that is already in the
// store is never fetched again, not even by a later run.
//
// Modules, leaf first:
// - key:     URL normalization and PageKey derivation
// - policy:  robots.txt gate
// - fetch:   HTTP download + HTML extraction
// - store:   ContentStore trait with filesystem and in-memory backends
// - crawl:   frontier, workers and the round scheduler
// =============================================================================

pub mod backoff;
pub mod config;
pub mod crawl;
pub mod fetch;
pub mod key;
pub mod logging;
pub mod policy;
pub mod store;

pub use config::{CrawlConfig, ExtractRules, StoredPagePolicy};
pub use crawl::{CrawlError, CrawlEvent, CrawlState, CrawlSummary, Crawler};
pub use key::{key_of, PageKey};
pub use store::{ContentStore, FsStore, MemoryStore, PageRecord};
