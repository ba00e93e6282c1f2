// Thin content: well-searched pages with too little visible text

use crate::cache::{CacheKey, CacheKind, FetchCache};
use crate::config::Thresholds;
use crate::model::{ModuleReport, SampleBudget, Severity};
use crate::providers::{Dimension, PerformanceProvider, PerformanceQuery, cached_query};
use crate::windows::recent_window;
use chrono::NaiveDate;
use reqwest::Client;
use seoscope_scanner::text::fetch_word_count;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinContentRecord {
    pub url: String,
    pub word_count: usize,
    pub impressions: f64,
    pub severity: Severity,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinContentReport {
    pub pages: Vec<ThinContentRecord>,
    pub total: usize,
    pub budget: SampleBudget,
    /// Sampled pages that could not be read (non-200 or fetch error).
    pub unreadable: usize,
}

pub fn classify_thin(
    url: &str,
    word_count: usize,
    impressions: f64,
    thresholds: &Thresholds,
) -> Option<ThinContentRecord> {
    if word_count >= thresholds.thin_word_limit {
        return None;
    }
    let (severity, action) = if word_count < thresholds.very_thin_word_limit {
        (Severity::High, "noindex or consolidate".to_string())
    } else {
        (Severity::Medium, "expand to at least 600 words".to_string())
    };
    Some(ThinContentRecord {
        url: url.to_string(),
        word_count,
        impressions,
        severity,
        action,
    })
}

pub fn rank_thin(mut pages: Vec<ThinContentRecord>, cap: usize) -> (Vec<ThinContentRecord>, usize) {
    pages.sort_by(|a, b| {
        b.impressions
            .partial_cmp(&a.impressions)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    let total = pages.len();
    pages.truncate(cap);
    (pages, total)
}

pub async fn detect_thin_content(
    provider: &dyn PerformanceProvider,
    cache: &FetchCache,
    client: &Client,
    site: &str,
    today: NaiveDate,
    thresholds: &Thresholds,
) -> ModuleReport<ThinContentReport> {
    let window = recent_window(today, 30);
    let query = PerformanceQuery {
        site: site.to_string(),
        start_date: window.start,
        end_date: window.end,
        dimensions: vec![Dimension::Page],
        row_limit: thresholds.thin_candidate_limit,
    };

    let mut candidates = match cached_query(provider, cache, &query).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Thin content sampling for {} skipped: {}", site, e);
            return ModuleReport::from_provider_error(&e);
        }
    };
    candidates.retain(|row| row.key(0).is_some());
    candidates.sort_by(|a, b| {
        b.impressions
            .partial_cmp(&a.impressions)
            .unwrap_or(Ordering::Equal)
    });

    let budget = SampleBudget::new(candidates.len(), thresholds.thin_sample_limit);
    info!(
        "Sampling {} of {} pages on {} for thin content",
        budget.sampled, budget.candidates, site
    );

    let mut flagged = Vec::new();
    let mut unreadable = 0;
    for row in candidates.iter().take(budget.sampled) {
        let Some(url) = row.key(0) else {
            continue;
        };
        let key = CacheKey::new(url, CacheKind::PageText, "word_count");
        let words = cache
            .get_or_fetch(&key, || fetch_word_count(client, url))
            .await;

        match words {
            Ok(Some(count)) => {
                debug!("  -> {} has {} words", url, count);
                if let Some(record) = classify_thin(url, count, row.impressions, thresholds) {
                    flagged.push(record);
                }
            }
            Ok(None) => unreadable += 1,
            Err(e) => {
                debug!("  -> could not sample {}: {}", url, e);
                unreadable += 1;
            }
        }
    }

    let (pages, total) = rank_thin(flagged, thresholds.thin_cap);
    ModuleReport::ok(ThinContentReport {
        pages,
        total,
        budget,
        unreadable,
    })
}
