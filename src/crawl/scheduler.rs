// src/crawl/scheduler.rs
// =============================================================================
// The crawl scheduler: breadth-first rounds over a bounded worker pool.
//
// State machine:
//   Idle -> RoundActive -> Draining -> RoundActive -> ... -> Done
//
// - Idle: the seed is enqueued at depth 0
// - RoundActive: every task of the round runs on the pool (at most
//   `concurrency` at once); the round ends only when all of them returned
// - Draining: discovered links go through Frontier::enqueue, which drops
//   anything already visited, forming the next round
// - Done: a drained round was empty, the crawl was cancelled, or a store
//   failure made continuing unsafe
//
// Since workers only emit links while depth < max_depth, the crawl runs at
// most max_depth + 1 rounds.
//
// Progress: every state change and every finished round is sent as a
// CrawlEvent to an optional channel, so a caller can watch a crawl that is
// still running (the CLI prints one line per round from it).
//
// Rust concepts:
// - Arc<CrawlContext>: shared, read-only state cloned into each tokio task
// - buffer_unordered: a stream combinator that polls at most N futures
// - mpsc::UnboundedSender: a channel that never blocks the sender
// =============================================================================

use super::frontier::{CrawlTask, Frontier};
use super::worker::{self, CrawlContext, TaskOutcome, TaskReport};
use crate::backoff::ExponentialBackoff;
use crate::config::CrawlConfig;
use crate::fetch::{build_client, build_policy_client, Extractor, InvalidSelector, PageFetcher};
use crate::policy::PolicyGate;
use crate::store::{ContentStore, CrawledRegistry, StoreError};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};
use url::Url;

/// Failures that end a crawl
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Selector(#[from] InvalidSelector),
    #[error("content store failure: {0}")]
    Store(#[from] StoreError),
    #[error("worker panicked: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    RoundActive,
    Draining,
    Done,
}

/// Progress reported while a crawl runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlEvent {
    /// The scheduler moved to a new state
    StateChanged(CrawlState),
    /// A round's barrier was reached and its discoveries were enqueued
    RoundFinished {
        round: usize,
        depth: usize,
        processed: usize,
        next_round: usize,
    },
}

/// What a crawl did, round by round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub rounds: usize,
    /// Tasks handled per round, in round order
    pub round_sizes: Vec<usize>,
    pub processed: usize,
    pub fetched: usize,
    pub stored: usize,
    pub already_stored: usize,
    /// Pages robots.txt kept us from storing, including blocked redirects
    pub disallowed: usize,
    pub failed: usize,
    /// robots.txt could not be read, so the whole site was treated as off limits
    pub policy_fail_closed: bool,
    pub cancelled: bool,
}

impl CrawlSummary {
    // Returns false for tasks that never ran
    fn record(&mut self, report: &TaskReport) -> bool {
        match &report.outcome {
            TaskOutcome::Stored => self.stored += 1,
            TaskOutcome::AlreadyStored => self.already_stored += 1,
            TaskOutcome::Disallowed | TaskOutcome::RedirectDisallowed { .. } => {
                self.disallowed += 1
            }
            TaskOutcome::Failed(_) => self.failed += 1,
            TaskOutcome::Cancelled => return false,
        }
        self.processed += 1;
        if report.fetched() {
            self.fetched += 1;
        }
        true
    }
}

pub struct Crawler {
    config: CrawlConfig,
    store: Arc<dyn ContentStore>,
    shutdown: Arc<AtomicBool>,
    state: CrawlState,
    progress: Option<UnboundedSender<CrawlEvent>>,
    store_backoff: ExponentialBackoff,
}

impl Crawler {
    pub fn new(config: CrawlConfig, store: Arc<dyn ContentStore>) -> Self {
        Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: CrawlState::Idle,
            progress: None,
            store_backoff: ExponentialBackoff::default(),
        }
    }

    pub fn with_store_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.store_backoff = backoff;
        self
    }

    /// Sends a CrawlEvent for every state change and finished round
    pub fn with_progress(mut self, tx: UnboundedSender<CrawlEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Set the returned flag to stop the crawl: tasks already running finish,
    /// nothing new starts
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// State the last crawl ended in (use `with_progress` to watch a live one)
    pub fn state(&self) -> CrawlState {
        self.state
    }

    // Crawls breadth-first from `seed`
    //
    // Returns Ok once the frontier is exhausted, however many individual
    // pages were skipped or failed. Errors only for a bad seed, a client
    // that can't be built, or a store that keeps failing.
    //
    // The crawler always ends in Done, whichever way the run went.
    pub async fn crawl(&mut self, seed: &str) -> Result<CrawlSummary, CrawlError> {
        self.set_state(CrawlState::Idle);
        let result = self.run(seed).await;
        self.set_state(CrawlState::Done);
        result
    }

    async fn run(&mut self, seed: &str) -> Result<CrawlSummary, CrawlError> {
        let site = site_root(seed)?;

        // robots.txt may redirect; article pages are redirected by hand
        let policy_client = build_policy_client(&self.config)?;
        let gate = Arc::new(PolicyGate::load(&policy_client, &site).await);

        let client = build_client(&self.config)?;
        let extractor = Extractor::new(&site, &self.config.rules)?;
        let registry = CrawledRegistry::load(self.store.as_ref()).await?;
        info!(site = %site, known_pages = registry.len(), "crawl starting");

        let mut summary = CrawlSummary {
            policy_fail_closed: gate.is_fail_closed(),
            ..CrawlSummary::default()
        };

        let fetcher = PageFetcher::new(
            client,
            extractor,
            Arc::clone(&gate),
            self.config.user_agent.clone(),
            self.config.retries,
        );

        let ctx = Arc::new(CrawlContext {
            gate,
            fetcher,
            store: Arc::clone(&self.store),
            registry,
            config: self.config.clone(),
            shutdown: Arc::clone(&self.shutdown),
            store_backoff: self.store_backoff,
        });

        // The seed is round 0 whatever its URL looks like
        let mut frontier = Frontier::new();
        frontier.enqueue(CrawlTask::new(seed, 0));

        self.run_rounds(&ctx, &mut frontier, &mut summary).await?;

        info!(
            rounds = summary.rounds,
            processed = summary.processed,
            stored = summary.stored,
            already_stored = summary.already_stored,
            disallowed = summary.disallowed,
            failed = summary.failed,
            "crawl finished"
        );
        Ok(summary)
    }

    async fn run_rounds(
        &mut self,
        ctx: &Arc<CrawlContext>,
        frontier: &mut Frontier,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        // A zero would make buffer_unordered never poll anything
        let concurrency = self.config.concurrency.max(1);

        loop {
            let tasks = frontier.drain_round();
            if tasks.is_empty() {
                return Ok(());
            }
            if self.shutdown.load(Ordering::Relaxed) {
                summary.cancelled = true;
                warn!(pending = tasks.len(), "crawl cancelled");
                return Ok(());
            }

            self.set_state(CrawlState::RoundActive);
            let round = summary.rounds;
            // Every task of a round has the same depth
            let depth = tasks[0].depth;
            info!(round, depth, tasks = tasks.len(), "round started");

            // Each task runs on its own tokio task so extraction can use every
            // core; buffer_unordered caps how many are in flight
            let results: Vec<_> = stream::iter(tasks)
                .map(|task| {
                    let ctx = Arc::clone(ctx);
                    tokio::spawn(async move { worker::process(&ctx, task).await })
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            // collect() only returns once every task did: that is the barrier
            self.set_state(CrawlState::Draining);
            let mut processed_this_round = 0;
            let mut discovered = 0;
            let mut fatal: Option<CrawlError> = None;

            for joined in results {
                // Outer Result: did the tokio task panic?
                // Inner Result: did the store give up?
                let report = match joined {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) => {
                        error!(error = %e, "store failure, stopping after this round");
                        fatal.get_or_insert(CrawlError::Store(e));
                        continue;
                    }
                    Err(e) => {
                        error!(error = %e, "worker task panicked");
                        fatal.get_or_insert(CrawlError::Worker(e.to_string()));
                        continue;
                    }
                };

                if summary.record(&report) {
                    processed_this_round += 1;
                }
                // enqueue() says false for anything already seen this run
                for task in report.discovered {
                    if frontier.enqueue(task) {
                        discovered += 1;
                    }
                }
            }

            summary.rounds += 1;
            summary.round_sizes.push(processed_this_round);
            info!(
                round,
                processed = processed_this_round,
                next_round = discovered,
                "round complete"
            );
            self.emit(CrawlEvent::RoundFinished {
                round,
                depth,
                processed: processed_this_round,
                next_round: discovered,
            });

            if let Some(e) = fatal {
                return Err(e);
            }
            if self.shutdown.load(Ordering::Relaxed) {
                summary.cancelled = true;
                warn!(pending = frontier.pending_len(), "crawl cancelled");
                return Ok(());
            }
        }
    }

    fn set_state(&mut self, state: CrawlState) {
        self.state = state;
        self.emit(CrawlEvent::StateChanged(state));
    }

    // A dropped receiver just means nobody is watching
    fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

// The site root the crawl is confined to, e.g. https://mr.wikipedia.org/
fn site_root(seed: &str) -> Result<Url, CrawlError> {
    let invalid = |reason: &str| CrawlError::InvalidSeed {
        url: seed.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(seed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https are supported"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL has no host"));
    }

    parsed.join("/").map_err(|e| invalid(&e.to_string()))
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why tokio::spawn inside buffer_unordered?
//    - buffer_unordered alone runs every future on the current task
//    - Spawning lets HTML parsing of different pages use different cores,
//      while buffer_unordered still limits how many run at once
//
// 2. Why keep only the first fatal error?
//    - The rest of the round is still tallied, so the summary in the logs
//      stays accurate
//    - get_or_insert leaves an existing value alone
//
// 3. Why is progress a channel and not a getter?
//    - crawl() holds `&mut self` until it returns, so nobody else can call a
//      getter while it runs
//    - An UnboundedSender can be moved anywhere and send() never waits
// -----------------------------------------------------------------------------
