// Analysis configuration: thresholds, caps, timeouts and credentials

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CACHE_DIR: &str = "~/.cache/seoscope";
pub const DATABASE_FILE: &str = "seoscope.db";

pub const TAVILY_API_BASE: &str = "https://api.tavily.com";
pub const SEARCH_CONSOLE_API_BASE: &str = "https://www.googleapis.com";
pub const PAGESPEED_API_BASE: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Anchor phrases that say nothing about the target page.
pub const GENERIC_ANCHORS: &[&str] = &[
    "click here",
    "read more",
    "see more",
    "learn more",
    "here",
    "link",
];

/// Knobs of the heuristic classifiers. Defaults are the tuned values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub decay_min_drop_pct: f64,
    pub decay_critical_drop_pct: f64,
    pub decay_min_oldest_clicks: f64,
    pub decay_row_limit: u32,
    pub decay_cap: usize,

    pub position_delta: f64,
    pub change_min_impressions: f64,
    pub new_query_min_impressions: f64,
    pub changes_row_limit: u32,

    pub cannibal_max_position: f64,
    pub cannibal_min_impressions: f64,
    pub cannibal_row_limit: u32,
    pub cannibal_cap: usize,

    pub thin_word_limit: usize,
    pub very_thin_word_limit: usize,
    pub thin_candidate_limit: u32,
    pub thin_sample_limit: usize,
    pub thin_cap: usize,

    pub deep_page_depth: usize,
    pub deep_page_cap: usize,
    pub top_linked_cap: usize,
    pub generic_anchor_alert_pct: u32,

    pub subtopic_cap: usize,
    pub competitor_cap: usize,
    pub topical_row_limit: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            decay_min_drop_pct: 20.0,
            decay_critical_drop_pct: 50.0,
            decay_min_oldest_clicks: 30.0,
            decay_row_limit: 1000,
            decay_cap: 20,

            position_delta: 3.0,
            change_min_impressions: 20.0,
            new_query_min_impressions: 50.0,
            changes_row_limit: 500,

            cannibal_max_position: 30.0,
            cannibal_min_impressions: 10.0,
            cannibal_row_limit: 5000,
            cannibal_cap: 20,

            thin_word_limit: 300,
            very_thin_word_limit: 100,
            thin_candidate_limit: 200,
            thin_sample_limit: 80,
            thin_cap: 20,

            deep_page_depth: 3,
            deep_page_cap: 10,
            top_linked_cap: 15,
            generic_anchor_alert_pct: 40,

            subtopic_cap: 15,
            competitor_cap: 3,
            topical_row_limit: 1000,
        }
    }
}

/// Static credentials passed through to providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub tavily_api_key: Option<String>,
    pub gsc_oauth_token: Option<String>,
    pub pagespeed_api_key: Option<String>,
}

impl ProviderKeys {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn tavily(&self) -> Option<&str> {
        Self::present(&self.tavily_api_key)
    }

    pub fn gsc(&self) -> Option<&str> {
        Self::present(&self.gsc_oauth_token)
    }

    pub fn pagespeed(&self) -> Option<&str> {
        Self::present(&self.pagespeed_api_key)
    }
}

/// Provider base URLs, overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub tavily: String,
    pub search_console: String,
    pub pagespeed: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            tavily: TAVILY_API_BASE.to_string(),
            search_console: SEARCH_CONSOLE_API_BASE.to_string(),
            pagespeed: PAGESPEED_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub max_pages: usize,
    pub user_agent: String,
    pub site_timeout_secs: u64,
    pub provider_timeout_secs: u64,
    pub pagespeed_timeout_secs: u64,
    pub respect_robots: bool,
    /// Ignore cached entries (fresh results are still written back).
    pub refresh: bool,
    pub show_progress: bool,
    pub cache_dir: PathBuf,
    pub generic_anchors: Vec<String>,
    pub thresholds: Thresholds,
    pub keys: ProviderKeys,
    pub endpoints: ProviderEndpoints,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_pages: seoscope_scanner::crawler::DEFAULT_MAX_PAGES,
            user_agent: seoscope_scanner::crawler::DEFAULT_USER_AGENT.to_string(),
            site_timeout_secs: seoscope_scanner::crawler::DEFAULT_TIMEOUT_SECS,
            provider_timeout_secs: 15,
            pagespeed_timeout_secs: 30,
            respect_robots: false,
            refresh: false,
            show_progress: false,
            cache_dir: expand_path(DEFAULT_CACHE_DIR),
            generic_anchors: GENERIC_ANCHORS.iter().map(|s| s.to_string()).collect(),
            thresholds: Thresholds::default(),
            keys: ProviderKeys::default(),
            endpoints: ProviderEndpoints::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn database_path(&self) -> PathBuf {
        self.cache_dir.join(DATABASE_FILE)
    }
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_count_as_missing() {
        let keys = ProviderKeys {
            tavily_api_key: Some("   ".to_string()),
            gsc_oauth_token: Some("token".to_string()),
            pagespeed_api_key: None,
        };
        assert_eq!(keys.tavily(), None);
        assert_eq!(keys.gsc(), Some("token"));
        assert_eq!(keys.pagespeed(), None);
    }

    #[test]
    fn test_database_path_lives_in_cache_dir() {
        let config = AnalysisConfig {
            cache_dir: PathBuf::from("/tmp/seo"),
            ..Default::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/seo/seoscope.db"));
    }

    #[test]
    fn test_expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/var/cache/seo"), PathBuf::from("/var/cache/seo"));
    }
}
