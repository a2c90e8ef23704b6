// src/crawl/mod.rs
// =============================================================================
// This module drives the crawl.
//
// Features:
// - Breadth-first rounds with a barrier between depths
// - Bounded worker pool inside each round
// - Same-site restriction, robots.txt compliance and a politeness delay
// - No page fetched twice: URL dedup within a run, key dedup across runs
// =============================================================================

mod frontier;
mod scheduler;
mod worker;

pub use frontier::{CrawlTask, Frontier};
pub use scheduler::{CrawlError, CrawlEvent, CrawlState, CrawlSummary, Crawler};
pub use worker::{TaskOutcome, TaskReport};
