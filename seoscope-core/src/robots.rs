// robots.txt report

use crate::model::{Issue, ModuleReport, Severity};
use reqwest::Client;
use seoscope_scanner::RobotsRules;
use seoscope_scanner::robots::fetch_robots_txt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Disallow fragments that keep crawlers from rendering pages.
pub const ASSET_BLOCK_PATTERNS: &[&str] = &["/css", "/js", "/assets", "/static", "*.css", "*.js"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotsReport {
    pub url: String,
    pub found: bool,
    pub disallowed: Vec<String>,
    pub sitemaps: Vec<String>,
    pub blocks_assets: bool,
    pub issues: Vec<Issue>,
}

pub fn audit_robots(url: &str, content: Option<&str>) -> RobotsReport {
    let mut report = RobotsReport {
        url: url.to_string(),
        ..Default::default()
    };

    let Some(content) = content else {
        report.issues.push(Issue::new(
            Severity::High,
            "robots.txt not found, crawlers fall back to default permissions",
            "Publish a robots.txt at the site root",
        ));
        return report;
    };

    let rules = RobotsRules::parse(content);
    report.found = true;
    report.blocks_assets = rules
        .disallowed
        .iter()
        .any(|rule| ASSET_BLOCK_PATTERNS.iter().any(|p| rule.contains(p)));

    if report.blocks_assets {
        report.issues.push(Issue::new(
            Severity::Critical,
            "robots.txt blocks CSS and/or JS, so pages cannot be rendered",
            "Remove Disallow rules for /css, /js, /assets or *.css *.js",
        ));
    }
    if rules.sitemaps.is_empty() {
        report.issues.push(Issue::new(
            Severity::High,
            "No sitemap declared in robots.txt",
            "Add a line: Sitemap: https://example.com/sitemap.xml",
        ));
    }
    if rules.disallowed.iter().any(|rule| rule == "/") {
        report.issues.push(Issue::new(
            Severity::Critical,
            "Disallow: / blocks the whole site from crawling",
            "Remove or fix the rule immediately",
        ));
    }

    report.disallowed = rules.disallowed;
    report.sitemaps = rules.sitemaps;
    report
}

pub async fn check_robots(client: &Client, root: &str) -> ModuleReport<RobotsReport> {
    let url = format!("{}/robots.txt", root.trim_end_matches('/'));
    match fetch_robots_txt(client, root).await {
        Ok(content) => {
            let report = audit_robots(&url, content.as_deref());
            info!("robots.txt for {}: {} issues", root, report.issues.len());
            ModuleReport::ok(report)
        }
        Err(e) => {
            warn!("Could not fetch {}: {}", url, e);
            ModuleReport::ok(audit_robots(&url, None))
        }
    }
}
