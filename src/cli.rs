// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every flag can also be set through a WIKICRAWL_* environment variable,
// which is handy in containers:
//
//   WIKICRAWL_DATA_DIR=/var/lib/wiki wikicrawl crawl https://mr.wikipedia.org/wiki/X
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wikicrawl::config::DEFAULT_USER_AGENT;
use wikicrawl::StoredPagePolicy;

#[derive(Parser, Debug)]
#[command(
    name = "wikicrawl",
    version,
    about = "Crawl a wiki from one article and store every page as JSON",
    long_about = "wikicrawl follows same-site article links breadth-first up to a depth limit, \
                  honors robots.txt, and writes one JSON record per page. Pages already in the \
                  data directory are never fetched again."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl starting from an article
    ///
    /// Example: wikicrawl crawl https://mr.wikipedia.org/wiki/Rust --max-depth 2
    Crawl(CrawlArgs),

    /// Report whether the data directory is usable and how many pages it holds
    Status {
        /// Directory holding the page records
        #[arg(long, env = "WIKICRAWL_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the record key a URL maps to
    Key {
        /// Article URL
        url: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct CrawlArgs {
    /// Article to start from (depth 0)
    pub start_url: String,

    /// How many link hops to follow from the start page
    ///
    /// 0 = only the start page, 1 = start page + the articles it links to, etc.
    #[arg(long, env = "WIKICRAWL_MAX_DEPTH", default_value_t = 2)]
    pub max_depth: usize,

    /// Pages fetched in parallel per round (default: number of CPUs)
    #[arg(long, env = "WIKICRAWL_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Directory holding the page records
    #[arg(long, env = "WIKICRAWL_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Pause each worker takes after a page, in milliseconds
    #[arg(long, env = "WIKICRAWL_DELAY_MS", default_value_t = 500)]
    pub delay_ms: u64,

    /// User agent sent with requests and matched against robots.txt
    #[arg(long, env = "WIKICRAWL_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Path prefix that identifies article links
    #[arg(long, env = "WIKICRAWL_ARTICLE_PREFIX", default_value = "/wiki/")]
    pub article_prefix: String,

    /// What to do with pages that are already stored
    #[arg(long, env = "WIKICRAWL_STORED_PAGES", value_enum, default_value_t = StoredPagePolicy::Traverse)]
    pub stored_pages: StoredPagePolicy,

    /// Extra attempts for transient fetch and store failures
    #[arg(long, env = "WIKICRAWL_RETRIES", default_value_t = 2)]
    pub retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "WIKICRAWL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
