// Internal link architecture: orphans, click depth and anchor quality

use crate::config::Thresholds;
use crate::model::{Issue, Severity};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use seoscope_scanner::{CrawlTermination, PageGraph, normalize_url};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepPage {
    pub url: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPage {
    pub url: String,
    /// Link occurrences pointing here.
    pub inbound: usize,
    /// Distinct pages those links come from.
    pub linking_pages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorStats {
    pub total: usize,
    pub generic: usize,
    pub generic_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureReport {
    pub root: String,
    pub pages_crawled: usize,
    pub termination: CrawlTermination,
    pub orphans: Vec<String>,
    /// Known pages (e.g. from Search Console) the crawl never reached.
    pub undiscovered: Vec<String>,
    pub depth_histogram: BTreeMap<usize, usize>,
    pub deep_pages: Vec<DeepPage>,
    pub deep_total: usize,
    pub anchors: AnchorStats,
    pub top_linked: Vec<LinkedPage>,
    pub score: u8,
    pub issues: Vec<Issue>,
}

impl Default for ArchitectureReport {
    fn default() -> Self {
        Self {
            root: String::new(),
            pages_crawled: 0,
            termination: CrawlTermination::FrontierExhausted,
            orphans: Vec::new(),
            undiscovered: Vec::new(),
            depth_histogram: BTreeMap::new(),
            deep_pages: Vec::new(),
            deep_total: 0,
            anchors: AnchorStats::default(),
            top_linked: Vec::new(),
            score: 0,
            issues: Vec::new(),
        }
    }
}

/// `100 - min(40, 3*orphans) - min(20, 4*deep) - min(20, generic_pct/4)`,
/// floored at zero.
pub fn architecture_score(orphans: usize, deep_pages: usize, generic_pct: u32) -> u8 {
    let orphan_penalty = (orphans.saturating_mul(3)).min(40) as i64;
    let deep_penalty = (deep_pages.saturating_mul(4)).min(20) as i64;
    let anchor_penalty = (generic_pct / 4).min(20) as i64;
    (100 - orphan_penalty - deep_penalty - anchor_penalty).max(0) as u8
}

pub fn is_generic_anchor(anchor: &str, phrases: &[String]) -> bool {
    let anchor = anchor.to_lowercase();
    phrases.iter().any(|phrase| anchor.contains(phrase.as_str()))
}

pub fn analyze_architecture(
    graph: &PageGraph,
    known_pages: &[String],
    generic_phrases: &[String],
    thresholds: &Thresholds,
) -> ArchitectureReport {
    let mut links: DiGraphMap<&str, usize> = DiGraphMap::new();
    for page in &graph.pages {
        links.add_node(page.url.as_str());
    }
    for (from, to, _) in graph.edges() {
        match links.edge_weight_mut(from, to) {
            Some(count) => *count += 1,
            None => {
                links.add_edge(from, to, 1);
            }
        }
    }

    let orphans: Vec<String> = graph
        .pages
        .iter()
        .filter(|page| page.url != graph.root && page.status.is_ok())
        .filter(|page| {
            links
                .neighbors_directed(page.url.as_str(), Direction::Incoming)
                .next()
                .is_none()
        })
        .map(|page| page.url.clone())
        .collect();

    let crawled: HashSet<&str> = graph.pages.iter().map(|p| p.url.as_str()).collect();
    let mut undiscovered: Vec<String> = Vec::new();
    for raw in known_pages {
        let url = normalize_url(raw);
        if url != graph.root && !crawled.contains(url.as_str()) && !undiscovered.contains(&url) {
            undiscovered.push(url);
        }
    }

    let mut depth_histogram: BTreeMap<usize, usize> = BTreeMap::new();
    let mut deep_pages: Vec<DeepPage> = Vec::new();
    for page in &graph.pages {
        *depth_histogram.entry(page.depth).or_default() += 1;
        if page.depth > thresholds.deep_page_depth && page.status.is_ok() {
            deep_pages.push(DeepPage {
                url: page.url.clone(),
                depth: page.depth,
            });
        }
    }
    deep_pages.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.url.cmp(&b.url)));
    let deep_total = deep_pages.len();
    deep_pages.truncate(thresholds.deep_page_cap);

    let mut anchors = AnchorStats::default();
    for (_, _, anchor) in graph.edges() {
        anchors.total += 1;
        if is_generic_anchor(anchor, generic_phrases) {
            anchors.generic += 1;
        }
    }
    if anchors.total > 0 {
        anchors.generic_pct = (anchors.generic as f64 / anchors.total as f64 * 100.0).round() as u32;
    }

    let mut top_linked: Vec<LinkedPage> = graph
        .inbound
        .iter()
        .map(|(url, inbound)| LinkedPage {
            url: url.clone(),
            inbound: inbound.len(),
            linking_pages: links
                .neighbors_directed(url.as_str(), Direction::Incoming)
                .count(),
        })
        .collect();
    top_linked.sort_by(|a, b| b.inbound.cmp(&a.inbound).then_with(|| a.url.cmp(&b.url)));
    top_linked.truncate(thresholds.top_linked_cap);

    let score = architecture_score(orphans.len(), deep_total, anchors.generic_pct);

    let mut issues = Vec::new();
    let total_orphans = orphans.len() + undiscovered.len();
    if total_orphans > 0 {
        issues.push(Issue::new(
            Severity::Critical,
            format!("{} orphan pages (no internal links pointing to them)", total_orphans),
            "Map each one and add relevant internal links to it",
        ));
    }
    if deep_total > 0 {
        issues.push(Issue::new(
            Severity::High,
            format!(
                "{} pages deeper than {} clicks from the home page",
                deep_total, thresholds.deep_page_depth
            ),
            "Link them directly from the home page or main sections",
        ));
    }
    if anchors.generic_pct > thresholds.generic_anchor_alert_pct {
        issues.push(Issue::new(
            Severity::High,
            format!("{}% of anchor texts are generic", anchors.generic_pct),
            "Rewrite the anchors of the 20 most important links with descriptive text",
        ));
    }

    ArchitectureReport {
        root: graph.root.clone(),
        pages_crawled: graph.len(),
        termination: graph.termination,
        orphans,
        undiscovered,
        depth_histogram,
        deep_pages,
        deep_total,
        anchors,
        top_linked,
        score,
        issues,
    }
}
