// ---------------------------------------------------------------------------
// traversal/tests.rs - engine behaviour against an in-memory link graph
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

use super::*;

/// Visitor over a fixed graph. URLs listed in `broken` fail like a timeout.
struct GraphVisitor {
    graph: HashMap<String, Vec<String>>,
    broken: HashSet<String>,
    hits: HashSet<String>,
    /// Requested URL -> URL the page lands on.
    redirects: HashMap<String, String>,
    visits: Vec<FrontierEntry>,
    revisits: Vec<(Option<NodeId>, NodeId)>,
}

impl GraphVisitor {
    fn new(edges: &[(&str, &[&str])]) -> Self {
        Self {
            graph: edges
                .iter()
                .map(|(from, to)| (from.to_string(), to.iter().map(|s| s.to_string()).collect()))
                .collect(),
            broken: HashSet::new(),
            hits: HashSet::new(),
            redirects: HashMap::new(),
            visits: Vec::new(),
            revisits: Vec::new(),
        }
    }

    fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    fn hit(mut self, url: &str) -> Self {
        self.hits.insert(url.to_string());
        self
    }

    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    fn visited_urls(&self) -> Vec<&str> {
        self.visits.iter().map(|e| e.url.as_str()).collect()
    }
}

#[async_trait]
impl Visitor for GraphVisitor {
    async fn visit(&mut self, entry: &FrontierEntry, _node: NodeId) -> VisitOutcome {
        self.visits.push(entry.clone());
        if self.broken.contains(&entry.url) {
            return VisitOutcome::failed();
        }
        let landed = self.redirects.get(&entry.url).unwrap_or(&entry.url).clone();
        let links = self.graph.get(&landed).cloned().unwrap_or_default();
        VisitOutcome::success(links)
            .with_result(self.hits.contains(&landed))
            .with_final_url(landed)
    }

    fn revisit(&mut self, entry: &FrontierEntry, existing: NodeId) {
        self.revisits.push((entry.parent, existing));
    }
}

const ROOT: &str = "https://example.com/";

fn seed() -> Url {
    Url::parse(ROOT).unwrap()
}

fn traversal(max_pages: usize, max_depth: u32) -> Traversal {
    let filters = FilterSet::new(&seed(), true, None, None).unwrap();
    Traversal::new(Budget::new(max_pages, max_depth), filters)
}

fn site() -> GraphVisitor {
    GraphVisitor::new(&[
        (ROOT, &["https://example.com/a", "https://example.com/b"]),
        ("https://example.com/a", &["https://example.com/c", "https://example.com/b"]),
        ("https://example.com/b", &["https://example.com/d", "https://example.com/"]),
        ("https://example.com/c", &["https://example.com/e"]),
    ])
}

#[tokio::test]
async fn visits_breadth_first_in_discovery_order() {
    let mut visitor = site();
    let summary = traversal(50, 5).run(&seed(), &mut visitor).await.unwrap();

    assert_eq!(
        visitor.visited_urls(),
        vec![
            ROOT,
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c",
            "https://example.com/d",
            "https://example.com/e",
        ]
    );
    assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);
    assert_eq!(summary.visited, 6);

    let depths: Vec<u32> = visitor.visits.iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![0, 1, 1, 2, 2, 3]);
}

#[tokio::test]
async fn every_url_is_visited_once() {
    let mut visitor = site();
    traversal(50, 5).run(&seed(), &mut visitor).await.unwrap();

    let urls = visitor.visited_urls();
    let unique: HashSet<&&str> = urls.iter().collect();
    assert_eq!(unique.len(), urls.len());
    assert!(visitor.revisits.is_empty(), "duplicates are dropped at enqueue");
}

#[tokio::test]
async fn single_page_budget_enqueues_nothing() {
    let mut visitor = site();
    let summary = traversal(1, 3).run(&seed(), &mut visitor).await.unwrap();

    assert_eq!(visitor.visited_urls(), vec![ROOT]);
    assert_eq!(summary.visited, 1);
    assert_eq!(summary.enqueued, 1, "only the seed was ever queued");
    assert_eq!(summary.stop_reason, StopReason::PageBudget);
}

#[tokio::test]
async fn visited_never_exceeds_page_budget() {
    for max_pages in 0..8 {
        let mut visitor = site();
        let summary = traversal(max_pages, 5).run(&seed(), &mut visitor).await.unwrap();
        assert!(summary.visited <= max_pages);
        assert_eq!(visitor.visits.len(), summary.visited);
    }
}

#[tokio::test]
async fn depth_limit_bounds_every_visit() {
    let mut visitor = site();
    traversal(50, 1).run(&seed(), &mut visitor).await.unwrap();

    assert!(visitor.visits.iter().all(|e| e.depth <= 1));
    assert_eq!(visitor.visits.len(), 3);
}

#[tokio::test]
async fn failed_visit_does_not_stop_the_run() {
    let mut visitor = site().broken("https://example.com/a");
    let summary = traversal(50, 5).run(&seed(), &mut visitor).await.unwrap();

    assert_eq!(summary.failed, 1);
    // /a yields no links, but /b and its child /d are still visited.
    assert_eq!(
        visitor.visited_urls(),
        vec![ROOT, "https://example.com/a", "https://example.com/b", "https://example.com/d"]
    );
}

#[tokio::test]
async fn result_budget_stops_search_runs() {
    let mut visitor = site().hit("https://example.com/a").hit("https://example.com/b");
    let filters = FilterSet::new(&seed(), true, None, None).unwrap();
    let budget = Budget::new(50, 5).with_max_results(Some(1));
    let summary = Traversal::new(budget, filters)
        .run(&seed(), &mut visitor)
        .await
        .unwrap();

    assert_eq!(summary.results, 1);
    assert_eq!(summary.stop_reason, StopReason::ResultBudget);
    assert_eq!(visitor.visited_urls(), vec![ROOT, "https://example.com/a"]);
}

#[tokio::test]
async fn revisits_surface_as_back_edges_when_kept() {
    let mut visitor = site();
    let summary = traversal(50, 5)
        .keep_revisits()
        .run(&seed(), &mut visitor)
        .await
        .unwrap();

    assert_eq!(summary.visited, 6);
    // /a -> /b (node 2) and /b -> / (node 0) are both rediscoveries.
    assert!(visitor.revisits.contains(&(Some(1), 2)));
    assert!(visitor.revisits.contains(&(Some(2), 0)));
    assert_eq!(summary.revisits, visitor.revisits.len());
}

#[tokio::test]
async fn seed_failing_filters_is_an_error() {
    let filters = FilterSet::new(&seed(), true, Some("/blog/"), None).unwrap();
    let mut visitor = site();
    let err = Traversal::new(Budget::new(10, 2), filters)
        .run(&seed(), &mut visitor)
        .await
        .unwrap_err();

    assert!(matches!(err, TraversalError::SeedRejected(_)));
    assert!(visitor.visits.is_empty());
}

#[tokio::test]
async fn cancelled_run_visits_nothing_more() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut visitor = site();
    let summary = traversal(50, 5)
        .with_cancellation(cancel)
        .run(&seed(), &mut visitor)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!(visitor.visits.is_empty());
}

#[tokio::test]
async fn off_domain_links_are_not_followed() {
    let mut visitor = GraphVisitor::new(&[(
        ROOT,
        &["https://other.org/x", "https://example.com/in", "javascript:void(0)"],
    )]);
    traversal(50, 3).run(&seed(), &mut visitor).await.unwrap();

    assert_eq!(visitor.visited_urls(), vec![ROOT, "https://example.com/in"]);
}

#[tokio::test]
async fn redirect_targets_count_as_visited() {
    let mut visitor = GraphVisitor::new(&[
        (ROOT, &["https://example.com/a", "https://example.com/final", "https://example.com/b"]),
        ("https://example.com/final", &["https://example.com/x"]),
    ])
    .redirect("https://example.com/a", "https://example.com/final")
    .redirect("https://example.com/b", "https://example.com/final");
    let summary = traversal(50, 3).run(&seed(), &mut visitor).await.unwrap();

    // /final was queued before /a landed on it; the queued copy is dropped.
    assert_eq!(
        visitor.visited_urls(),
        vec![ROOT, "https://example.com/a", "https://example.com/b", "https://example.com/x"]
    );
    assert_eq!(visitor.revisits, vec![(Some(0), 1)]);
    assert_eq!(summary.visited, 4);
}
