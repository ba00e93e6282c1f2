use crate::cache::{CacheKey, CacheKind, FetchCache};
use crate::config::AnalysisConfig;
use indicatif::{ProgressBar, ProgressStyle};
use seoscope_scanner::robots::fetch_robots_txt;
use seoscope_scanner::{PageGraph, PageStatus, RobotsRules, ScanError, SiteCrawler, normalize_url};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub max_pages: usize,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub respect_robots: bool,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn from_config(url: &str, config: &AnalysisConfig) -> Self {
        Self {
            url: normalize_url(url),
            max_pages: config.max_pages,
            user_agent: config.user_agent.clone(),
            timeout_secs: config.site_timeout_secs,
            respect_robots: config.respect_robots,
            show_progress_bars: config.show_progress,
        }
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            &self.url,
            CacheKind::Crawl,
            &format!("max_pages={};robots={}", self.max_pages, self.respect_robots),
        )
    }
}

/// Callback for reporting crawl progress messages
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<PageGraph, ScanError> {
    let CrawlOptions {
        url,
        max_pages,
        user_agent,
        timeout_secs,
        respect_robots,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));
    let mut crawler = SiteCrawler::with_timeout(&user_agent, timeout_secs)?.with_max_pages(max_pages);

    if respect_robots {
        match fetch_robots_txt(crawler.client(), &url).await {
            Ok(Some(content)) => {
                let rules = RobotsRules::parse(&content);
                info!("Honoring {} robots.txt disallow rules", rules.disallowed.len());
                crawler = crawler.with_robots_rules(rules);
            }
            Ok(None) => info!("No robots.txt at {}, crawling unrestricted", url),
            Err(e) => warn!("Could not fetch robots.txt for {}: {}", url, e),
        }
    }

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |_n: usize, page: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Crawling... {}/{} {}",
                count,
                max_pages,
                extract_url_path(&page)
            ));
            pb_clone.tick();
        }));
    }

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawling {} (up to {} pages)", url, max_pages));
    }

    let graph = crawler.crawl(&url).await;

    if let Some(ref pb) = progress_bar {
        match &graph {
            Ok(graph) => pb.finish_with_message(format!("Crawl complete! {} pages visited", graph.len())),
            Err(_) => pb.finish_and_clear(),
        }
    }

    graph
}

/// Crawl through the fetch cache, so a repeat run within the TTL makes no
/// requests to the site.
pub async fn cached_crawl(
    options: CrawlOptions,
    cache: &FetchCache,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<PageGraph, ScanError> {
    let key = options.cache_key();
    cache
        .get_or_fetch(&key, || execute_crawl(options, progress_callback))
        .await
}

/// Generate a plain-text crawl summary from a page graph
pub fn generate_crawl_report(graph: &PageGraph, color: bool) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Root: {}\n", graph.root));
    report.push_str(&format!("  Pages visited: {} (budget {})\n", graph.len(), graph.max_pages));

    let ok_pages = graph.pages.iter().filter(|p| p.status.is_ok()).count();
    report.push_str(&format!("  Pages answering 200: {}\n", ok_pages));

    let total_links: usize = graph.inbound.values().map(Vec::len).sum();
    report.push_str(&format!("  Internal links found: {}\n", total_links));
    report.push_str(&format!(
        "  Stopped because: {}\n",
        match graph.termination {
            seoscope_scanner::CrawlTermination::FrontierExhausted => "every reachable page was visited",
            seoscope_scanner::CrawlTermination::BudgetReached => "page budget reached",
        }
    ));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for page in &graph.pages {
        let path = extract_url_path(&page.url);
        let status = page.status.to_string();
        let status_str = if color {
            match page.status {
                PageStatus::Http(200..=299) => format!("\x1b[32m{}\x1b[0m", status), // Green
                PageStatus::Http(300..=399) => format!("\x1b[36m{}\x1b[0m", status), // Cyan
                PageStatus::Http(400..=499) => format!("\x1b[33m{}\x1b[0m", status), // Yellow
                PageStatus::Http(_) | PageStatus::Error => format!("\x1b[31m{}\x1b[0m", status),
                PageStatus::Timeout => format!("\x1b[90m{}\x1b[0m", status),
            }
        } else {
            status
        };

        let mut line = format!("  {} d{} {}", status_str, page.depth, path);
        if let Some(words) = page.word_count {
            line.push_str(&format!(" ({} words)", words));
        }
        report.push_str(&line);
        report.push('\n');
    }

    report
}
