// src/crawl/worker.rs
// =============================================================================
// What one worker does with one CrawlTask.
//
// Steps, in order:
// 1. Stop early if the crawl was cancelled
// 2. Ask the policy gate; a disallowed URL is skipped (logged, not an error)
// 3. Derive the PageKey and check the store; a stored page is never fetched
// 4. Otherwise fetch + extract + store (redirect hops are gated too)
// 5. Sleep for the politeness delay
// 6. If the task is shallower than max_depth, hand back its links as tasks
//    for the next round
//
// Page-level failures (HTTP errors, network errors, unrecognized markup) are
// contained here and reported as TaskOutcome::Failed. Only a store failure
// that survives its retries escapes as an Err, because losing writes would
// silently break dedup on the next run.
//
// Rust concepts:
// - Arc<dyn ContentStore>: one store shared by every task, whatever its type
// - Result<_, StoreError> + `?`: store failures bubble up to the scheduler
// - Pattern guards (`Err(e @ ...) if ...`): retry only the errors worth it
// =============================================================================

use super::frontier::CrawlTask;
use crate::backoff::ExponentialBackoff;
use crate::config::{CrawlConfig, StoredPagePolicy};
use crate::fetch::{FetchError, PageFetcher};
use crate::key::{key_of, PageKey};
use crate::policy::PolicyGate;
use crate::store::{ContentStore, CrawledRegistry, PageRecord, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum TaskOutcome {
    /// Fetched, extracted and written to the store
    Stored,
    /// Key already in the store; no fetch happened
    AlreadyStored,
    /// robots.txt said no
    Disallowed,
    /// The page redirected somewhere robots.txt forbids; the target was
    /// never requested
    RedirectDisallowed { target: String },
    /// Fetch or extraction failed; the page and its links are abandoned
    Failed(FetchError),
    /// The crawl was cancelled before this task started
    Cancelled,
}

#[derive(Debug)]
pub struct TaskReport {
    pub task: CrawlTask,
    pub outcome: TaskOutcome,
    /// Next-round tasks, empty when the task sat at max depth
    pub discovered: Vec<CrawlTask>,
}

impl TaskReport {
    // Did this task send a page request?
    pub fn fetched(&self) -> bool {
        matches!(
            self.outcome,
            TaskOutcome::Stored | TaskOutcome::RedirectDisallowed { .. } | TaskOutcome::Failed(_)
        )
    }
}

// Read-only state shared by every worker for the whole crawl
//
// The scheduler wraps this in an Arc and hands a clone to each spawned task.
// Nothing in here needs a lock: the gate and config never change, and the
// registry and store do their own synchronization.
pub(crate) struct CrawlContext {
    pub gate: Arc<PolicyGate>,
    pub fetcher: PageFetcher,
    pub store: Arc<dyn ContentStore>,
    pub registry: CrawledRegistry,
    pub config: CrawlConfig,
    pub shutdown: Arc<AtomicBool>,
    pub store_backoff: ExponentialBackoff,
}

// Runs one task from start to finish
//
// Returns: the report for the scheduler, or the StoreError that made the
// crawl unsafe to continue
pub(crate) async fn process(ctx: &CrawlContext, task: CrawlTask) -> Result<TaskReport, StoreError> {
    // Ctrl-C flips this flag; tasks that haven't started yet bow out
    if ctx.shutdown.load(Ordering::Relaxed) {
        debug!(url = %task.url, "crawl cancelled, task not started");
        return Ok(TaskReport {
            task,
            outcome: TaskOutcome::Cancelled,
            discovered: Vec::new(),
        });
    }

    // Keep the Result for now so the delay still happens on a store error
    let visited = visit(ctx, &task).await;

    // Polite crawling: every worker idles before taking its next task
    if !ctx.config.delay.is_zero() {
        tokio::time::sleep(ctx.config.delay).await;
    }

    let (outcome, links) = visited?;

    // Links found at max depth are dropped here, so the next round never
    // sees them
    let discovered = if task.depth < ctx.config.max_depth {
        links
            .into_iter()
            .map(|link| CrawlTask::new(link, task.depth + 1))
            .collect()
    } else {
        Vec::new()
    };

    Ok(TaskReport {
        task,
        outcome,
        discovered,
    })
}

// Gate check, store check, then fetch and store
//
// Returns: the outcome plus the links to follow (empty unless the page was
// stored now or traversed from its stored record)
async fn visit(ctx: &CrawlContext, task: &CrawlTask) -> Result<(TaskOutcome, Vec<String>), StoreError> {
    if !ctx.gate.is_permitted(&task.url, &ctx.config.user_agent) {
        info!(url = %task.url, "skipping: blocked by robots.txt");
        return Ok((TaskOutcome::Disallowed, Vec::new()));
    }

    // The registry answers for pages stored before this run or earlier in
    // it; the store is asked as well in case another process wrote the page
    let key = key_of(&task.url);
    if ctx.registry.contains(&key) || ctx.store.has(&key).await? {
        ctx.registry.insert(key.clone());
        return already_stored(ctx, task, &key).await;
    }

    info!(url = %task.url, depth = task.depth, "visiting");
    let page = match ctx.fetcher.fetch_and_extract(&task.url).await {
        Ok(page) => page,
        Err(FetchError::RedirectDisallowed(target)) => {
            info!(url = %task.url, %target, "skipping: redirect blocked by robots.txt");
            return Ok((TaskOutcome::RedirectDisallowed { target }, Vec::new()));
        }
        Err(e) => {
            // One bad page never stops the crawl
            warn!(url = %task.url, error = %e, "abandoning page");
            return Ok((TaskOutcome::Failed(e), Vec::new()));
        }
    };

    // Stored under the URL we were asked for, even if a redirect moved it,
    // so the same link is recognized as stored next time
    let record = PageRecord {
        title: page.title,
        url: task.url.clone(),
        content: page.content,
        links: page.links,
    };
    put_with_retry(ctx, &key, &record).await?;
    ctx.registry.insert(key);

    info!(url = %task.url, title = %record.title, links = record.links.len(), "stored page");
    Ok((TaskOutcome::Stored, record.links))
}

// A page we already have: decide whether to keep walking through it
async fn already_stored(
    ctx: &CrawlContext,
    task: &CrawlTask,
    key: &PageKey,
) -> Result<(TaskOutcome, Vec<String>), StoreError> {
    let links = match ctx.config.stored_pages {
        StoredPagePolicy::Skip => Vec::new(),
        // Only read the record back if its links could still be used
        StoredPagePolicy::Traverse if task.depth < ctx.config.max_depth => ctx
            .store
            .get(key)
            .await?
            .map(|record| record.links)
            .unwrap_or_default(),
        StoredPagePolicy::Traverse => Vec::new(),
    };

    debug!(url = %task.url, %key, links = links.len(), "skipping fetch: already stored");
    Ok((TaskOutcome::AlreadyStored, links))
}

// Writes a record, retrying I/O errors with backoff
//
// Serialization and corruption errors won't get better on a second try, so
// they are returned straight away.
async fn put_with_retry(ctx: &CrawlContext, key: &PageKey, record: &PageRecord) -> Result<(), StoreError> {
    let mut attempt = 0;
    loop {
        match ctx.store.put(key, record).await {
            Err(e @ StoreError::Io { .. }) if attempt < ctx.config.retries => {
                let wait = ctx.store_backoff.delay(attempt);
                warn!(%key, error = %e, attempt, ?wait, "store write failed, retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why does a worker return its links instead of enqueueing them?
//    - Only the scheduler owns the Frontier
//    - "Already visited?" and "mark visited" then happen in one place, so two
//      workers can never both schedule the same URL
//
// 2. Why sleep even when the page was skipped?
//    - The delay is per task, not per request
//    - It keeps the pace of a worker predictable whatever the page turned
//      out to be
//
// 3. Why is a redirect into a disallowed path its own outcome?
//    - The first URL was requested, so it counts as a fetch
//    - The summary still counts it with the robots.txt skips, since that is
//      why no record was written
//
// 4. What does `e @ StoreError::Io { .. }` mean?
//    - Bind the whole error to `e` while matching only the Io variant
//    - The guard after `if` then decides whether another attempt is left
// -----------------------------------------------------------------------------
