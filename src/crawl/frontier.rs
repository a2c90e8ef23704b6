// src/crawl/frontier.rs
// =============================================================================
// The frontier: which pages the next round will visit.
//
// How it works:
// 1. The seed is enqueued at depth 0
// 2. drain_round() hands the whole current round to the scheduler
// 3. Links discovered during that round are enqueued for the next one
// 4. Repeat until a drained round is empty
//
// The visited set is filled at enqueue time, before a task is ever
// dispatched. A URL therefore enters the frontier at most once per run, no
// matter how many pages link to it or in which round it is rediscovered.
//
// Only the scheduler owns a Frontier. Workers never touch it: they return the
// links they found and the scheduler enqueues them after the round. Because
// enqueue() takes &mut self, test-and-insert is one indivisible step.
// =============================================================================

use crate::key::normalize_url;
use std::collections::HashSet;

/// One page to visit, `depth` hops away from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub depth: usize,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug, Default)]
pub struct Frontier {
    visited: HashSet<String>,
    round: Vec<CrawlTask>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    // Adds a task unless its URL was seen before
    //
    // Returns: true if the task was newly added
    //
    // The task's URL is stored in normalized form (fragment stripped), so
    // `/wiki/A#intro` and `/wiki/A` count as the same page. Strings that are
    // not absolute http(s) URLs are rejected.
    pub fn enqueue(&mut self, task: CrawlTask) -> bool {
        let Some(url) = normalize_url(&task.url) else {
            return false;
        };

        if !self.visited.insert(url.clone()) {
            return false;
        }

        self.round.push(CrawlTask {
            url,
            depth: task.depth,
        });
        true
    }

    // Takes every task of the current round, leaving the frontier empty
    // for the next round's discoveries
    pub fn drain_round(&mut self) -> Vec<CrawlTask> {
        std::mem::take(&mut self.round)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        normalize_url(url).is_some_and(|u| self.visited.contains(&u))
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn pending_len(&self) -> usize {
        self.round.len()
    }

    pub fn is_empty(&self) -> bool {
        self.round.is_empty()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why a Vec per round instead of one VecDeque?
//    - Rounds are dispatched as a whole and joined before the next starts
//    - Taking the Vec makes the round boundary explicit: everything drained
//      is depth d, everything enqueued afterwards is depth d + 1
//
// 2. Why mark visited on enqueue instead of on fetch?
//    - Two pages in the same round often link to the same article
//    - Marking on enqueue means the second discovery is dropped right away
//      instead of being dispatched and skipped later
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let mut frontier = Frontier::new();
        assert!(frontier.enqueue(CrawlTask::new("https://example.org/wiki/A", 0)));
        assert!(!frontier.enqueue(CrawlTask::new("https://example.org/wiki/A", 1)));
        assert!(!frontier.enqueue(CrawlTask::new("https://example.org/wiki/A#History", 1)));
        assert_eq!(frontier.pending_len(), 1);
        assert_eq!(frontier.visited_len(), 1);
    }

    #[test]
    fn test_drain_round_empties_but_remembers() {
        let mut frontier = Frontier::new();
        frontier.enqueue(CrawlTask::new("https://example.org/wiki/A", 0));
        frontier.enqueue(CrawlTask::new("https://example.org/wiki/B", 0));

        let round = frontier.drain_round();
        assert_eq!(round.len(), 2);
        assert!(frontier.is_empty());

        // Drained URLs stay visited across rounds
        assert!(frontier.is_visited("https://example.org/wiki/A"));
        assert!(!frontier.enqueue(CrawlTask::new("https://example.org/wiki/B", 1)));
        assert!(frontier.drain_round().is_empty());
    }

    #[test]
    fn test_enqueue_rejects_non_http() {
        let mut frontier = Frontier::new();
        assert!(!frontier.enqueue(CrawlTask::new("javascript:void(0)", 0)));
        assert!(!frontier.enqueue(CrawlTask::new("/wiki/Relative", 0)));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_urls_are_stored_normalized() {
        let mut frontier = Frontier::new();
        frontier.enqueue(CrawlTask::new("https://Example.org/wiki/A#top", 2));
        assert_eq!(
            frontier.drain_round(),
            vec![CrawlTask::new("https://example.org/wiki/A", 2)]
        );
    }
}
