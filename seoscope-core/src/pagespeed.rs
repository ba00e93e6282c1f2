// Page speed summary for the site's home page, mobile and desktop

use crate::cache::FetchCache;
use crate::model::{Issue, ModuleReport, Severity};
use crate::providers::pagespeed::Rating;
use crate::providers::{PageSpeedAudit, PageSpeedProvider, Strategy, cached_audit};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Lab metrics that are Core Web Vitals (or their lab proxy).
const VITAL_METRICS: &[(&str, &str)] = &[("lcp", "LCP"), ("cls", "CLS"), ("tbt", "TBT")];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpeedSummary {
    pub url: String,
    pub mobile: Option<PageSpeedAudit>,
    pub desktop: Option<PageSpeedAudit>,
    pub issues: Vec<Issue>,
}

pub fn speed_issues(audit: &PageSpeedAudit) -> Vec<Issue> {
    let mut issues = Vec::new();
    let strategy = audit.strategy.as_str();

    if let Some(score) = audit.scores.performance {
        if score < 50 {
            issues.push(Issue::new(
                Severity::High,
                format!("{} performance score is {}/100", strategy, score),
                "Work through the top opportunities listed below",
            ));
        } else if score < 90 {
            issues.push(Issue::new(
                Severity::Medium,
                format!("{} performance score is {}/100", strategy, score),
                "Address the largest savings opportunities",
            ));
        }
    }

    for (key, label) in VITAL_METRICS {
        if let Some(metric) = audit.lab_metric(key)
            && metric.rating == Rating::Poor
        {
            issues.push(Issue::new(
                Severity::High,
                format!("{} {} is poor ({})", strategy, label, metric.display),
                format!("Bring {} into the good Core Web Vitals range", label),
            ));
        }
    }

    issues
}

pub async fn audit_page_speed(
    provider: &dyn PageSpeedProvider,
    cache: &FetchCache,
    url: &str,
) -> ModuleReport<PageSpeedSummary> {
    if !provider.is_configured() {
        return ModuleReport::skipped(format!("{} unavailable", provider.name()));
    }

    let mut summary = PageSpeedSummary {
        url: url.to_string(),
        ..Default::default()
    };
    let mut failures = Vec::new();
    let mut unreadable = Vec::new();

    for strategy in [Strategy::Mobile, Strategy::Desktop] {
        match cached_audit(provider, cache, url, strategy).await {
            Ok(audit) => {
                summary.issues.extend(speed_issues(&audit));
                match strategy {
                    Strategy::Mobile => summary.mobile = Some(audit),
                    Strategy::Desktop => summary.desktop = Some(audit),
                }
            }
            Err(e) if e.is_malformed() => {
                warn!("PageSpeed {} audit of {} had no usable data: {}", strategy.as_str(), url, e);
                unreadable.push(format!("{}: no data", strategy.as_str()));
            }
            Err(e) => {
                warn!("PageSpeed {} audit of {} failed: {}", strategy.as_str(), url, e);
                failures.push(format!("{}: {}", strategy.as_str(), e));
            }
        }
    }

    info!("PageSpeed audit of {}: {} issues", url, summary.issues.len());
    if failures.len() == 2 {
        return ModuleReport::error(failures.join("; "));
    }
    failures.extend(unreadable);
    if failures.is_empty() {
        ModuleReport::ok(summary)
    } else {
        ModuleReport::partial(summary, failures.join("; "))
    }
}
