// src/config.rs
// =============================================================================
// Crawl configuration.
//
// CrawlConfig is a plain struct with sensible defaults. The binary fills it
// from command-line flags (see cli.rs); library callers and tests build it
// directly with struct update syntax:
//
//   let config = CrawlConfig { max_depth: 1, ..CrawlConfig::default() };
// =============================================================================

use clap::ValueEnum;
use serde::Serialize;
use std::time::Duration;

/// User agent sent with every request and evaluated against robots.txt
pub const DEFAULT_USER_AGENT: &str = concat!("wikicrawl/", env!("CARGO_PKG_VERSION"));

/// What to do when a page's key is already in the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoredPagePolicy {
    /// Don't fetch it, but keep crawling from the links saved in its record
    #[default]
    Traverse,
    /// Don't fetch it and don't follow any of its links
    Skip,
}

/// Where the interesting parts of an article live in the markup
///
/// Defaults match MediaWiki sites such as Wikipedia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRules {
    /// Path prefix that marks an article link (e.g. "/wiki/")
    pub article_prefix: String,
    /// CSS selector for the article body container
    pub content_selector: String,
    /// CSS selector for the page heading
    pub title_selector: String,
    /// CSS selector for paragraph-level text inside the body
    pub paragraph_selector: String,
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            article_prefix: "/wiki/".to_string(),
            content_selector: "div#mw-content-text".to_string(),
            title_selector: "h1#firstHeading".to_string(),
            paragraph_selector: "p".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum number of link hops from the seed (seed = depth 0)
    pub max_depth: usize,
    /// Worker pool size for each round
    pub concurrency: usize,
    /// Politeness delay every worker observes after its task
    pub delay: Duration,
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts for transient fetch and store failures
    pub retries: u32,
    pub stored_pages: StoredPagePolicy,
    pub rules: ExtractRules,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            concurrency: default_concurrency(),
            delay: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            retries: 2,
            stored_pages: StoredPagePolicy::default(),
            rules: ExtractRules::default(),
        }
    }
}

// One worker per available CPU, like a process pool would use
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
