// Keyword cannibalization: several pages ranking for the same query

use crate::cache::FetchCache;
use crate::config::Thresholds;
use crate::model::ModuleReport;
use crate::providers::{Dimension, PerformanceProvider, PerformanceQuery, PerformanceRow, cached_query};
use crate::windows::recent_window;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const CONSOLIDATE_ACTION: &str = "consolidate: 301-redirect secondary pages into the primary";
pub const DIFFERENTIATE_ACTION: &str = "differentiate intent or consolidate with a 301 redirect";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetingPage {
    pub url: String,
    pub position: f64,
    pub clicks: f64,
    pub impressions: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannibalizationGroup {
    pub query: String,
    /// Best-ranked first.
    pub pages: Vec<CompetingPage>,
    pub total_clicks: f64,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CannibalizationReport {
    pub groups: Vec<CannibalizationGroup>,
    pub total: usize,
}

/// Groups (query, page) rows by query and keeps queries answered by at
/// least two distinct pages.
pub fn group_cannibalization(rows: &[PerformanceRow], thresholds: &Thresholds) -> CannibalizationReport {
    let mut by_query: BTreeMap<&str, BTreeMap<&str, CompetingPage>> = BTreeMap::new();

    for row in rows {
        let (Some(query), Some(page)) = (row.key(0), row.key(1)) else {
            continue;
        };
        if row.position > thresholds.cannibal_max_position
            || row.impressions < thresholds.cannibal_min_impressions
        {
            continue;
        }

        let candidate = CompetingPage {
            url: page.to_string(),
            position: row.position,
            clicks: row.clicks,
            impressions: row.impressions,
        };
        let pages = by_query.entry(query).or_default();
        let better_known = pages
            .get(page)
            .is_some_and(|existing| existing.position <= candidate.position);
        if !better_known {
            pages.insert(page, candidate);
        }
    }

    let mut groups: Vec<CannibalizationGroup> = by_query
        .into_iter()
        .filter(|(_, pages)| pages.len() >= 2)
        .map(|(query, pages)| {
            let mut pages: Vec<CompetingPage> = pages.into_values().collect();
            pages.sort_by(|a, b| {
                a.position
                    .partial_cmp(&b.position)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.url.cmp(&b.url))
            });
            let total_clicks = pages.iter().map(|p| p.clicks).sum();
            let action = if pages.len() >= 3 {
                CONSOLIDATE_ACTION
            } else {
                DIFFERENTIATE_ACTION
            };
            CannibalizationGroup {
                query: query.to_string(),
                pages,
                total_clicks,
                action: action.to_string(),
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.total_clicks
            .partial_cmp(&a.total_clicks)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.query.cmp(&b.query))
    });

    let total = groups.len();
    groups.truncate(thresholds.cannibal_cap);
    CannibalizationReport { groups, total }
}

pub async fn detect_cannibalization(
    provider: &dyn PerformanceProvider,
    cache: &FetchCache,
    site: &str,
    today: NaiveDate,
    thresholds: &Thresholds,
) -> ModuleReport<CannibalizationReport> {
    let window = recent_window(today, 30);
    let query = PerformanceQuery {
        site: site.to_string(),
        start_date: window.start,
        end_date: window.end,
        dimensions: vec![Dimension::Query, Dimension::Page],
        row_limit: thresholds.cannibal_row_limit,
    };

    match cached_query(provider, cache, &query).await {
        Ok(rows) => {
            let report = group_cannibalization(&rows, thresholds);
            info!("Cannibalization: {} competing query groups on {}", report.total, site);
            ModuleReport::ok(report)
        }
        Err(e) => {
            warn!("Cannibalization check for {} unavailable: {}", site, e);
            ModuleReport::from_provider_error(&e)
        }
    }
}
