// ---------------------------------------------------------------------------
// traversal/ - breadth-first frontier walker shared by crawl, map and search
// ---------------------------------------------------------------------------
//
// The engine owns the frontier, the visited set and the budgets. What happens
// at each page is delegated to a `Visitor`; the engine only learns whether the
// visit succeeded, which links it found and whether it produced a result.

pub mod filter;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

pub use filter::{normalize_url, parse_seed, FilterSet};

/// Index of a visited page, assigned in visitation order.
pub type NodeId = usize;

#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    #[error("invalid start URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("start URL '{0}' is excluded by the configured filters")]
    SeedRejected(String),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ── Budget ──────────────────────────────────────────────────────────────────

/// Limits bounding one run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct Budget {
    /// Maximum number of URLs marked visited (pages or map nodes).
    pub max_pages: usize,
    /// Links are only followed from pages with `depth < max_depth`.
    pub max_depth: u32,
    /// Stop once this many visits reported a result (search mode).
    pub max_results: Option<usize>,
    /// Wall-clock limit for the whole run.
    pub time_limit: Option<Duration>,
}

impl Budget {
    pub fn new(max_pages: usize, max_depth: u32) -> Self {
        Self {
            max_pages,
            max_depth,
            max_results: None,
            time_limit: None,
        }
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

// ── Frontier / visitor contract ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct VisitOutcome {
    pub success: bool,
    /// Absolute links found on the page, in document order. Unfiltered.
    pub discovered_links: Vec<String>,
    /// The visitor asks the engine to stop after this page.
    pub terminal: bool,
    /// Counts toward `Budget::max_results`.
    pub produced_result: bool,
    /// Where the page ended up after redirects, when the visitor knows.
    pub final_url: Option<String>,
}

impl VisitOutcome {
    pub fn success(discovered_links: Vec<String>) -> Self {
        Self {
            success: true,
            discovered_links,
            ..Self::default()
        }
    }

    /// A skipped node: no links, no result.
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, produced: bool) -> Self {
        self.produced_result = produced;
        self
    }

    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = Some(url.into());
        self
    }
}

#[async_trait]
pub trait Visitor: Send {
    /// Process one newly visited URL. Failures are reported through the
    /// outcome, never by panicking or returning early from the run.
    async fn visit(&mut self, entry: &FrontierEntry, node: NodeId) -> VisitOutcome;

    /// Called when a queued URL turns out to be visited already. Only fires
    /// when the run keeps duplicate discoveries (see `Traversal::keep_revisits`).
    fn revisit(&mut self, _entry: &FrontierEntry, _existing: NodeId) {}
}

// ── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FrontierExhausted,
    PageBudget,
    ResultBudget,
    TimeBudget,
    VisitorTerminated,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub visited: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: usize,
    pub enqueued: usize,
    pub revisits: usize,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct Traversal {
    budget: Budget,
    filters: FilterSet,
    cancel: CancellationToken,
    keep_revisits: bool,
}

impl Traversal {
    pub fn new(budget: Budget, filters: FilterSet) -> Self {
        Self {
            budget,
            filters,
            cancel: CancellationToken::new(),
            keep_revisits: false,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Queue duplicate discoveries so each one surfaces as `Visitor::revisit`
    /// (map mode records them as back-edges). Otherwise duplicates are dropped
    /// at enqueue time and the first discovery wins.
    pub fn keep_revisits(mut self) -> Self {
        self.keep_revisits = true;
        self
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    fn budget_stop(&self, visited: usize, results: usize, started: Instant) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if visited >= self.budget.max_pages {
            return Some(StopReason::PageBudget);
        }
        if let Some(max) = self.budget.max_results
            && results >= max
        {
            return Some(StopReason::ResultBudget);
        }
        if let Some(limit) = self.budget.time_limit
            && started.elapsed() >= limit
        {
            return Some(StopReason::TimeBudget);
        }
        None
    }

    /// Walk the site breadth-first from `seed`.
    ///
    /// Returns an error only when the seed itself is unusable; every per-page
    /// failure is absorbed into the summary.
    pub async fn run<V: Visitor>(&self, seed: &Url, visitor: &mut V) -> Result<Summary, TraversalError> {
        let seed_url = self
            .filters
            .admit(seed.as_str())
            .ok_or_else(|| TraversalError::SeedRejected(seed.to_string()))?;

        let started = Instant::now();
        let mut frontier: VecDeque<FrontierEntry> = VecDeque::new();
        let mut visited: HashMap<String, NodeId> = HashMap::new();
        // Redirect targets, keyed like `visited` but not counted against the budget.
        let mut aliases: HashMap<String, NodeId> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::new();

        queued.insert(seed_url.clone());
        frontier.push_back(FrontierEntry {
            url: seed_url,
            depth: 0,
            parent: None,
        });

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut results = 0usize;
        let mut enqueued = 1usize;
        let mut revisits = 0usize;

        let stop_reason = loop {
            if let Some(reason) = self.budget_stop(visited.len(), results, started) {
                break reason;
            }
            let Some(entry) = frontier.pop_front() else {
                break StopReason::FrontierExhausted;
            };

            if let Some(&existing) = visited.get(&entry.url).or_else(|| aliases.get(&entry.url)) {
                revisits += 1;
                visitor.revisit(&entry, existing);
                continue;
            }

            let node = visited.len();
            visited.insert(entry.url.clone(), node);
            tracing::debug!(url = %entry.url, depth = entry.depth, node, "traverse: visiting");

            let outcome = visitor.visit(&entry, node).await;
            if let Some(target) = outcome.final_url.as_deref().and_then(|u| Url::parse(u).ok()) {
                let target = normalize_url(&target);
                if target != entry.url && !visited.contains_key(&target) {
                    tracing::debug!(from = %entry.url, to = %target, "traverse: redirected");
                    aliases.entry(target).or_insert(node);
                }
            }
            if outcome.success {
                succeeded += 1;
            } else {
                failed += 1;
                tracing::debug!(url = %entry.url, "traverse: node skipped");
            }
            if outcome.produced_result {
                results += 1;
            }
            if outcome.terminal {
                break StopReason::VisitorTerminated;
            }
            // A budget exhausted by this visit must not grow the frontier.
            if let Some(reason) = self.budget_stop(visited.len(), results, started) {
                break reason;
            }
            if !outcome.success || entry.depth >= self.budget.max_depth {
                continue;
            }

            for link in &outcome.discovered_links {
                let Some(url) = self.filters.admit(link) else {
                    continue;
                };
                if !self.keep_revisits {
                    if visited.contains_key(&url) || aliases.contains_key(&url) || queued.contains(&url) {
                        continue;
                    }
                    queued.insert(url.clone());
                }
                enqueued += 1;
                frontier.push_back(FrontierEntry {
                    url,
                    depth: entry.depth + 1,
                    parent: Some(node),
                });
            }
        };

        let summary = Summary {
            visited: visited.len(),
            succeeded,
            failed,
            results,
            enqueued,
            revisits,
            stop_reason,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            visited = summary.visited,
            failed = summary.failed,
            results = summary.results,
            stop = ?summary.stop_reason,
            "traverse: finished in {}ms",
            summary.elapsed_ms
        );
        Ok(summary)
    }
}
