// robots.txt parsing and fetching

use crate::error::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rules that apply to generic crawlers (`*`) and to Googlebot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsRules {
    pub disallowed: Vec<String>,
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    pub fn parse(content: &str) -> Self {
        let mut rules = RobotsRules::default();
        // Consecutive User-agent lines share the rules that follow them.
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match field.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() && group_applies(&group_agents) {
                        rules.disallowed.push(value.to_string());
                    }
                }
                "allow" | "crawl-delay" => in_rules = true,
                "sitemap" => rules.sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        rules
    }

    /// Whether a URL path (plus query) may be crawled.
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallowed.iter().any(|rule| rule_matches(rule, path))
    }
}

/// Rules before any User-agent line count as generic.
fn group_applies(agents: &[String]) -> bool {
    agents.is_empty()
        || agents
            .iter()
            .any(|agent| agent == "*" || agent.contains("googlebot"))
}

/// Prefix match with support for the `*` wildcard and a trailing `$` anchor.
fn rule_matches(rule: &str, path: &str) -> bool {
    let (pattern, anchored) = match rule.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (rule, false),
    };

    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or("");
    if !path.starts_with(first) {
        return false;
    }

    let mut rest = &path[first.len()..];
    let remaining: Vec<&str> = segments.collect();
    for (i, segment) in remaining.iter().enumerate() {
        let is_last = i == remaining.len() - 1;
        if is_last && anchored {
            return rest.ends_with(segment);
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }

    !anchored || rest.is_empty()
}

/// Downloads `{root}/robots.txt`, returning `None` for any non-200 answer.
pub async fn fetch_robots_txt(client: &Client, root: &str) -> Result<Option<String>> {
    let url = format!("{}/robots.txt", root.trim_end_matches('/'));
    debug!("Fetching {}", url);
    let response = client.get(&url).send().await?;
    if response.status().as_u16() != 200 {
        return Ok(None);
    }
    Ok(Some(response.text().await?))
}
