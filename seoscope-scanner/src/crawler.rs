use crate::error::{Result, ScanError};
use crate::result::{CrawlTermination, InboundLink, PageGraph, PageNode, PageStatus};
use crate::robots::RobotsRules;
use crate::text;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; SEOscopeBot/1.0)";
pub const DEFAULT_MAX_PAGES: usize = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 8;
pub const MAX_ANCHOR_CHARS: usize = 80;

/// Called before each fetch with (pages visited so far + 1, url).
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Breadth-first crawler confined to one site.
///
/// Pages are fetched strictly one at a time in FIFO order, so the page
/// budget always goes to the earliest-discovered URLs.
pub struct SiteCrawler {
    client: Client,
    max_pages: usize,
    robots: Option<RobotsRules>,
    progress_callback: Option<ProgressCallback>,
}

impl SiteCrawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(build_client(user_agent, timeout_secs)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_pages: DEFAULT_MAX_PAGES,
            robots: None,
            progress_callback: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Never enqueue URLs these rules disallow.
    pub fn with_robots_rules(mut self, rules: RobotsRules) -> Self {
        self.robots = Some(rules);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn crawl(&self, root_url: &str) -> Result<PageGraph> {
        let root = normalize_url(root_url);
        let parsed = Url::parse(&root)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root, e)))?;
        let base_authority = authority(&parsed)
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", root)))?;

        info!("Starting crawl of {} (budget: {} pages)", root, self.max_pages);

        let mut frontier: VecDeque<(String, usize)> = VecDeque::from([(root.clone(), 0)]);
        let mut seen: HashSet<String> = HashSet::from([root.clone()]);
        let mut pages: Vec<PageNode> = Vec::new();
        let mut inbound: BTreeMap<String, Vec<InboundLink>> = BTreeMap::new();

        while pages.len() < self.max_pages {
            let Some((url, depth)) = frontier.pop_front() else {
                break;
            };

            if let Some(ref callback) = self.progress_callback {
                callback(pages.len() + 1, url.clone());
            }

            let (node, links) = self.visit(&url, depth, &base_authority).await;

            for (target, anchor) in links {
                inbound.entry(target.clone()).or_default().push(InboundLink {
                    from: url.clone(),
                    anchor,
                });

                if !seen.insert(target.clone()) {
                    continue;
                }
                if !self.allowed_by_robots(&target) {
                    debug!("  -> {} disallowed by robots.txt, not queued", target);
                    continue;
                }
                frontier.push_back((target, depth + 1));
            }

            pages.push(node);
        }

        let termination = if frontier.is_empty() {
            CrawlTermination::FrontierExhausted
        } else {
            CrawlTermination::BudgetReached
        };

        info!(
            "Crawl complete. Visited {} pages ({:?}, {} still queued)",
            pages.len(),
            termination,
            frontier.len()
        );

        Ok(PageGraph {
            root,
            max_pages: self.max_pages,
            pages,
            inbound,
            termination,
        })
    }

    fn allowed_by_robots(&self, url: &str) -> bool {
        let Some(ref rules) = self.robots else {
            return true;
        };
        match Url::parse(url) {
            Ok(parsed) => {
                let path = match parsed.query() {
                    Some(query) => format!("{}?{}", parsed.path(), query),
                    None => parsed.path().to_string(),
                };
                rules.is_allowed(&path)
            }
            Err(_) => true,
        }
    }

    /// Fetches one page. Failures become sentinel statuses, never errors.
    async fn visit(
        &self,
        url: &str,
        depth: usize,
        base_authority: &str,
    ) -> (PageNode, Vec<(String, String)>) {
        match self.fetch_and_parse(url, depth, base_authority).await {
            Ok(visited) => visited,
            Err(ScanError::HttpError(e)) if e.is_timeout() => {
                warn!("Timeout fetching {}", url);
                (PageNode::new(url.to_string(), depth, PageStatus::Timeout), Vec::new())
            }
            Err(e) => {
                warn!("Crawl error for {}: {}", url, e);
                (PageNode::new(url.to_string(), depth, PageStatus::Error), Vec::new())
            }
        }
    }

    async fn fetch_and_parse(
        &self,
        url: &str,
        depth: usize,
        base_authority: &str,
    ) -> Result<(PageNode, Vec<(String, String)>)> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        // Relative links resolve against where redirects ended up.
        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut node = PageNode::new(url.to_string(), depth, PageStatus::Http(status_code));
        if status_code != 200 {
            return Ok((node, Vec::new()));
        }

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            debug!("  -> {} is not HTML ({:?}), links not followed", url, content_type);
            return Ok((node, Vec::new()));
        }

        let body = response.text().await?;
        let links = extract_links(&body, &final_url, base_authority)?;

        let mut out_seen = HashSet::new();
        node.links_out = links
            .iter()
            .filter(|(target, _)| out_seen.insert(target.clone()))
            .map(|(target, _)| target.clone())
            .collect();
        node.word_count = Some(text::word_count(&body));

        Ok((node, links))
    }
}

pub fn build_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Defaults the scheme to https, canonicalizes through [`Url`] the same way
/// discovered links are, and strips trailing slashes.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    match Url::parse(&with_scheme) {
        Ok(parsed) => parsed.as_str().trim_end_matches('/').to_string(),
        Err(_) => with_scheme.trim_end_matches('/').to_string(),
    }
}

/// Internal links of a page as (absolute url, anchor text), one entry per
/// occurrence, in document order.
pub fn extract_links(
    html: &str,
    current_url: &str,
    base_authority: &str,
) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let link_selector =
        Selector::parse("a[href]").map_err(|e| ScanError::ParseError(e.to_string()))?;

    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute_url) = resolve_url(current_url, href) else {
            continue;
        };
        if !is_same_domain(&absolute_url, base_authority) {
            debug!("  -> {} is external, skipping", absolute_url);
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ");
        let anchor: String = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(MAX_ANCHOR_CHARS)
            .collect();

        links.push((absolute_url, anchor));
    }

    Ok(links)
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);

    Some(resolved.as_str().trim_end_matches('/').to_string())
}

/// Suffix match on host[:port], so subdomains of the root count as internal.
fn is_same_domain(url: &str, base_authority: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| authority(&parsed))
        .is_some_and(|auth| auth.ends_with(base_authority))
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
