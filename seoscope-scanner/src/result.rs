use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of fetching one page during a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Http(u16),
    Timeout,
    Error,
}

impl PageStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PageStatus::Http(200))
    }

    pub fn as_code(&self) -> Option<u16> {
        match self {
            PageStatus::Http(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Http(code) => write!(f, "{}", code),
            PageStatus::Timeout => f.write_str("timeout"),
            PageStatus::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub url: String,
    pub depth: usize,
    pub status: PageStatus,
    pub links_out: Vec<String>,
    pub word_count: Option<usize>,
}

impl PageNode {
    pub fn new(url: String, depth: usize, status: PageStatus) -> Self {
        Self {
            url,
            depth,
            status,
            links_out: Vec::new(),
            word_count: None,
        }
    }
}

/// One occurrence of an internal link pointing at a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundLink {
    pub from: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlTermination {
    /// Nothing left to visit.
    FrontierExhausted,
    /// The page budget ran out while URLs were still queued.
    BudgetReached,
}

/// Everything a single crawl run learned about a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageGraph {
    pub root: String,
    pub max_pages: usize,
    /// Visited pages in BFS visit order.
    pub pages: Vec<PageNode>,
    pub inbound: BTreeMap<String, Vec<InboundLink>>,
    pub termination: CrawlTermination,
}

impl PageGraph {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, url: &str) -> Option<&PageNode> {
        self.pages.iter().find(|p| p.url == url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.page(url).is_some()
    }

    pub fn inbound_links(&self, url: &str) -> &[InboundLink] {
        self.inbound.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates every (from, to, anchor) link occurrence.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.inbound.iter().flat_map(|(to, links)| {
            links
                .iter()
                .map(move |l| (l.from.as_str(), to.as_str(), l.anchor.as_str()))
        })
    }
}
