// Ranking movement between two consecutive 30-day windows

use crate::cache::FetchCache;
use crate::config::Thresholds;
use crate::model::{ModuleReport, round1};
use crate::providers::{Dimension, PerformanceProvider, PerformanceQuery, PerformanceRow, cached_query};
use crate::windows::change_windows;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, warn};

/// Share of current clicks assumed lost per position dropped.
const CLICKS_LOST_PER_POSITION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChange {
    pub query: String,
    pub previous_position: Option<f64>,
    pub current_position: f64,
    pub delta: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub clicks_lost_est: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionChanges {
    pub drops: Vec<PositionChange>,
    pub gains: Vec<PositionChange>,
    pub new_queries: Vec<PositionChange>,
}

fn by_impressions_desc(a: &PositionChange, b: &PositionChange) -> Ordering {
    b.impressions
        .partial_cmp(&a.impressions)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.query.cmp(&b.query))
}

/// Positive delta means the query ranks worse than before.
pub fn classify_changes(
    current: &[PerformanceRow],
    prior: &[PerformanceRow],
    thresholds: &Thresholds,
) -> PositionChanges {
    let prior: HashMap<&str, &PerformanceRow> = prior
        .iter()
        .filter_map(|row| row.key(0).map(|q| (q, row)))
        .collect();

    let mut changes = PositionChanges::default();
    for row in current {
        let Some(query) = row.key(0) else {
            continue;
        };

        match prior.get(query) {
            Some(before) => {
                let delta = row.position - before.position;
                if row.impressions < thresholds.change_min_impressions {
                    continue;
                }
                let mut change = PositionChange {
                    query: query.to_string(),
                    previous_position: Some(round1(before.position)),
                    current_position: round1(row.position),
                    delta: round1(delta),
                    impressions: row.impressions,
                    clicks: row.clicks,
                    clicks_lost_est: 0.0,
                };
                if delta >= thresholds.position_delta {
                    change.clicks_lost_est =
                        round1((row.clicks * delta * CLICKS_LOST_PER_POSITION).max(0.0));
                    changes.drops.push(change);
                } else if delta <= -thresholds.position_delta {
                    changes.gains.push(change);
                }
            }
            None if row.impressions >= thresholds.new_query_min_impressions => {
                changes.new_queries.push(PositionChange {
                    query: query.to_string(),
                    previous_position: None,
                    current_position: round1(row.position),
                    delta: 0.0,
                    impressions: row.impressions,
                    clicks: row.clicks,
                    clicks_lost_est: 0.0,
                });
            }
            None => {}
        }
    }

    changes.drops.sort_by(by_impressions_desc);
    changes.gains.sort_by(by_impressions_desc);
    changes.new_queries.sort_by(by_impressions_desc);
    changes
}

pub async fn detect_position_changes(
    provider: &dyn PerformanceProvider,
    cache: &FetchCache,
    site: &str,
    today: NaiveDate,
    thresholds: &Thresholds,
) -> ModuleReport<PositionChanges> {
    let (current_window, prior_window) = change_windows(today);
    let mut periods = Vec::with_capacity(2);
    for window in [current_window, prior_window] {
        let query = PerformanceQuery {
            site: site.to_string(),
            start_date: window.start,
            end_date: window.end,
            dimensions: vec![Dimension::Query],
            row_limit: thresholds.changes_row_limit,
        };
        match cached_query(provider, cache, &query).await {
            Ok(rows) => periods.push(rows),
            Err(e) => {
                warn!("Position changes for {} unavailable: {}", site, e);
                return ModuleReport::from_provider_error(&e);
            }
        }
    }

    let changes = classify_changes(&periods[0], &periods[1], thresholds);
    info!(
        "Position changes on {}: {} drops, {} gains, {} new",
        site,
        changes.drops.len(),
        changes.gains.len(),
        changes.new_queries.len()
    );
    ModuleReport::ok(changes)
}
