// Content decay: pages losing clicks across three consecutive windows

use crate::cache::FetchCache;
use crate::config::Thresholds;
use crate::model::{ModuleReport, Severity, round1};
use crate::providers::{Dimension, PerformanceProvider, PerformanceQuery, PerformanceRow, cached_query};
use crate::windows::decay_windows;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayRecord {
    pub url: String,
    pub clicks_oldest: f64,
    pub clicks_middle: f64,
    pub clicks_newest: f64,
    pub drop_pct: f64,
    pub cause: String,
    pub priority: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub pages: Vec<DecayRecord>,
    /// Matches before the display cap.
    pub total: usize,
}

pub fn decay_cause(drop_pct: f64) -> &'static str {
    if drop_pct >= 60.0 {
        "strongly superseded by competitors or outdated"
    } else if drop_pct >= 40.0 {
        "likely stale or cannibalized"
    } else {
        "gradual decline, monitor"
    }
}

fn clicks_by_page(rows: &[PerformanceRow]) -> HashMap<&str, f64> {
    rows.iter()
        .filter_map(|row| row.key(0).map(|url| (url, row.clicks)))
        .collect()
}

/// Flags pages whose clicks fell in both steps (oldest > middle > newest).
///
/// Pages absent from, or with zero clicks in, either older window are
/// skipped.
pub fn classify_decay(
    newest: &[PerformanceRow],
    middle: &[PerformanceRow],
    oldest: &[PerformanceRow],
    thresholds: &Thresholds,
) -> DecayReport {
    let middle = clicks_by_page(middle);
    let oldest = clicks_by_page(oldest);

    let mut pages: Vec<DecayRecord> = Vec::new();
    for row in newest {
        let Some(url) = row.key(0) else {
            continue;
        };
        let c1 = row.clicks;
        let c2 = middle.get(url).copied().unwrap_or(0.0);
        let c3 = oldest.get(url).copied().unwrap_or(0.0);
        if c2 == 0.0 || c3 == 0.0 {
            continue;
        }
        if !(c3 > c2 && c2 > c1) || c3 < thresholds.decay_min_oldest_clicks {
            continue;
        }

        let drop_pct = (c3 - c1) / c3 * 100.0;
        if drop_pct < thresholds.decay_min_drop_pct {
            continue;
        }

        let priority = if drop_pct >= thresholds.decay_critical_drop_pct {
            Severity::Critical
        } else {
            Severity::High
        };

        pages.push(DecayRecord {
            url: url.to_string(),
            clicks_oldest: c3,
            clicks_middle: c2,
            clicks_newest: c1,
            drop_pct,
            cause: decay_cause(drop_pct).to_string(),
            priority,
        });
    }

    pages.sort_by(|a, b| {
        b.drop_pct
            .partial_cmp(&a.drop_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });

    let total = pages.len();
    pages.truncate(thresholds.decay_cap);
    for page in &mut pages {
        page.drop_pct = round1(page.drop_pct);
    }

    DecayReport { pages, total }
}

pub async fn detect_decay(
    provider: &dyn PerformanceProvider,
    cache: &FetchCache,
    site: &str,
    today: NaiveDate,
    thresholds: &Thresholds,
) -> ModuleReport<DecayReport> {
    let mut windows = Vec::with_capacity(3);
    for window in decay_windows(today) {
        let query = PerformanceQuery {
            site: site.to_string(),
            start_date: window.start,
            end_date: window.end,
            dimensions: vec![Dimension::Page],
            row_limit: thresholds.decay_row_limit,
        };
        match cached_query(provider, cache, &query).await {
            Ok(rows) => windows.push(rows),
            Err(e) => {
                warn!("Decay detection for {} stopped: {}", site, e);
                return ModuleReport::from_provider_error(&e);
            }
        }
    }

    let report = classify_decay(&windows[0], &windows[1], &windows[2], thresholds);
    info!("Decay: {} decaying pages on {}", report.total, site);
    ModuleReport::ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, clicks: f64) -> PerformanceRow {
        PerformanceRow {
            keys: vec![url.to_string()],
            clicks,
            impressions: clicks * 20.0,
            ctr: 5.0,
            position: 8.0,
        }
    }

    #[test]
    fn test_flags_monotonic_drop() {
        let report = classify_decay(
            &[row("/a", 40.0)],
            &[row("/a", 70.0)],
            &[row("/a", 100.0)],
            &Thresholds::default(),
        );
        assert_eq!(report.total, 1);
        let page = &report.pages[0];
        assert_eq!(page.drop_pct, 60.0);
        assert_eq!(page.cause, "strongly superseded by competitors or outdated");
        assert_eq!(page.priority, Severity::Critical);
    }

    #[test]
    fn test_requires_strict_monotonic_decline() {
        // Recovered in the middle window.
        let report = classify_decay(
            &[row("/a", 40.0)],
            &[row("/a", 120.0)],
            &[row("/a", 100.0)],
            &Thresholds::default(),
        );
        assert!(report.pages.is_empty());

        // Flat between windows.
        let report = classify_decay(
            &[row("/a", 40.0)],
            &[row("/a", 40.0)],
            &[row("/a", 100.0)],
            &Thresholds::default(),
        );
        assert!(report.pages.is_empty());
    }

    #[test]
    fn test_small_pages_and_small_drops_are_ignored() {
        let thresholds = Thresholds::default();
        // Oldest window below 30 clicks.
        let report = classify_decay(&[row("/a", 5.0)], &[row("/a", 10.0)], &[row("/a", 29.0)], &thresholds);
        assert!(report.pages.is_empty());

        // 19% drop.
        let report = classify_decay(&[row("/a", 81.0)], &[row("/a", 90.0)], &[row("/a", 100.0)], &thresholds);
        assert!(report.pages.is_empty());

        // Missing from the middle window.
        let report = classify_decay(&[row("/a", 10.0)], &[], &[row("/a", 100.0)], &thresholds);
        assert!(report.pages.is_empty());
    }

    #[test]
    fn test_causes_priorities_and_ordering() {
        let report = classify_decay(
            &[row("/b", 75.0), row("/a", 55.0), row("/c", 75.0)],
            &[row("/b", 90.0), row("/a", 80.0), row("/c", 90.0)],
            &[row("/b", 100.0), row("/a", 100.0), row("/c", 100.0)],
            &Thresholds::default(),
        );

        let urls: Vec<&str> = report.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/a", "/b", "/c"]);
        assert_eq!(report.pages[0].cause, "likely stale or cannibalized");
        assert_eq!(report.pages[0].priority, Severity::High);
        assert_eq!(report.pages[1].cause, "gradual decline, monitor");
    }

    #[test]
    fn test_cap_keeps_total() {
        let thresholds = Thresholds {
            decay_cap: 2,
            ..Default::default()
        };
        let urls: Vec<String> = (0..5).map(|i| format!("/p{}", i)).collect();
        let newest: Vec<_> = urls.iter().map(|u| row(u, 10.0)).collect();
        let middle: Vec<_> = urls.iter().map(|u| row(u, 50.0)).collect();
        let oldest: Vec<_> = urls.iter().map(|u| row(u, 100.0)).collect();

        let report = classify_decay(&newest, &middle, &oldest, &thresholds);
        assert_eq!(report.total, 5);
        assert_eq!(report.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_unexpected_payload_is_reported_as_no_decay() {
        use crate::providers::performance::SearchConsole;
        use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"rows": "unexpected"})))
            .mount(&mock_server)
            .await;

        let provider = SearchConsole::new("t", &mock_server.uri(), 5).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let report = detect_decay(
            &provider,
            &FetchCache::in_memory(),
            "example.com",
            today,
            &Thresholds::default(),
        )
        .await;

        assert_eq!(report.status.label(), "partial");
        assert!(report.has_data());
        assert_eq!(report.data.total, 0);
        assert!(report.data.pages.is_empty());
    }

    #[test]
    fn test_every_flagged_page_declines_monotonically() {
        let thresholds = Thresholds::default();
        let samples = [(10.0, 20.0, 30.0), (50.0, 20.0, 80.0), (1.0, 2.0, 300.0), (90.0, 95.0, 100.0)];
        for (i, (c1, c2, c3)) in samples.iter().enumerate() {
            let url = format!("/p{}", i);
            let report = classify_decay(&[row(&url, *c1)], &[row(&url, *c2)], &[row(&url, *c3)], &thresholds);
            for page in &report.pages {
                assert!(page.clicks_oldest > page.clicks_middle);
                assert!(page.clicks_middle > page.clicks_newest);
                assert!(page.clicks_oldest >= 30.0);
            }
        }
    }
}
