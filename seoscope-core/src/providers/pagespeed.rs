// Page-speed audits via PageSpeed Insights v5

use super::{PageSpeedProvider, ProviderResult, status_error};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

/// Core Web Vitals rating bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
    Unknown,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs improvement",
            Rating::Poor => "poor",
            Rating::Unknown => "n/a",
        }
    }
}

/// (metric, good upper bound, poor lower bound). Seconds except `cls`.
pub const CWV_THRESHOLDS: &[(&str, f64, f64)] = &[
    ("lcp", 2.5, 4.0),
    ("cls", 0.1, 0.25),
    ("fid", 0.1, 0.3),
    ("inp", 0.2, 0.5),
    ("ttfb", 0.8, 1.8),
    ("fcp", 1.8, 3.0),
    ("tbt", 0.2, 0.6),
];

/// Lighthouse audits reported as lab metrics: (key, audit id, divisor).
const LAB_AUDITS: &[(&str, &str, f64)] = &[
    ("lcp", "largest-contentful-paint", 1000.0),
    ("cls", "cumulative-layout-shift", 1.0),
    ("tbt", "total-blocking-time", 1000.0),
    ("fcp", "first-contentful-paint", 1000.0),
    ("speed_index", "speed-index", 1000.0),
    ("tti", "interactive", 1000.0),
];

/// CrUX field metrics: (key, loadingExperience metric name).
const FIELD_METRICS: &[(&str, &str)] = &[
    ("lcp", "LARGEST_CONTENTFUL_PAINT_MS"),
    ("fid", "FIRST_INPUT_DELAY_MS"),
    ("cls", "CUMULATIVE_LAYOUT_SHIFT_SCORE"),
    ("inp", "INTERACTION_TO_NEXT_PAINT"),
    ("fcp", "FIRST_CONTENTFUL_PAINT_MS"),
    ("ttfb", "EXPERIMENTAL_TIME_TO_FIRST_BYTE"),
];

const OPPORTUNITY_AUDITS: &[&str] = &[
    "render-blocking-resources",
    "unused-css-rules",
    "unused-javascript",
    "uses-optimized-images",
    "uses-webp-images",
    "uses-text-compression",
    "uses-responsive-images",
    "efficient-animated-content",
    "uses-long-cache-ttl",
    "eliminate-render-blocking-resources",
    "reduce-unused-javascript",
];

pub fn rate(metric: &str, value: f64) -> Rating {
    match CWV_THRESHOLDS.iter().find(|(name, _, _)| *name == metric) {
        Some((_, good, _)) if value <= *good => Rating::Good,
        Some((_, _, poor)) if value <= *poor => Rating::NeedsImprovement,
        Some(_) => Rating::Poor,
        None => Rating::Unknown,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub performance: Option<u8>,
    pub accessibility: Option<u8>,
    pub best_practices: Option<u8>,
    pub seo: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabMetric {
    pub key: String,
    pub value: f64,
    pub display: String,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetric {
    pub key: String,
    pub category: String,
    pub p75: Option<f64>,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub savings_ms: u64,
    pub savings_kb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpeedAudit {
    pub url: String,
    pub strategy: Strategy,
    pub scores: CategoryScores,
    pub lab: Vec<LabMetric>,
    pub field: Vec<FieldMetric>,
    pub opportunities: Vec<Opportunity>,
}

impl PageSpeedAudit {
    pub fn lab_metric(&self, key: &str) -> Option<&LabMetric> {
        self.lab.iter().find(|m| m.key == key)
    }
}

fn category_score(categories: &Value, name: &str) -> Option<u8> {
    categories[name]["score"]
        .as_f64()
        .map(|score| (score * 100.0).round().clamp(0.0, 100.0) as u8)
}

/// Pulls the fields worth reporting out of a raw runPagespeed answer.
pub fn parse_audit(raw: &Value, url: &str, strategy: Strategy) -> PageSpeedAudit {
    let lighthouse = &raw["lighthouseResult"];
    let categories = &lighthouse["categories"];
    let audits = &lighthouse["audits"];

    let scores = CategoryScores {
        performance: category_score(categories, "performance"),
        accessibility: category_score(categories, "accessibility"),
        best_practices: category_score(categories, "best-practices"),
        seo: category_score(categories, "seo"),
    };

    let lab = LAB_AUDITS
        .iter()
        .filter_map(|(key, audit_id, divisor)| {
            let audit = &audits[*audit_id];
            let value = audit["numericValue"].as_f64()? / divisor;
            let value = (value * 1000.0).round() / 1000.0;
            Some(LabMetric {
                key: key.to_string(),
                value,
                display: audit["displayValue"].as_str().unwrap_or_default().to_string(),
                rating: rate(key, value),
            })
        })
        .collect();

    let crux = &raw["loadingExperience"]["metrics"];
    let field = FIELD_METRICS
        .iter()
        .filter_map(|(key, name)| {
            let metric = crux.get(*name)?;
            let category = metric["category"].as_str().unwrap_or_default().to_string();
            let rating = match category.as_str() {
                "FAST" => Rating::Good,
                "AVERAGE" => Rating::NeedsImprovement,
                "SLOW" => Rating::Poor,
                _ => Rating::Unknown,
            };
            Some(FieldMetric {
                key: key.to_string(),
                category,
                p75: metric["percentile"].as_f64(),
                rating,
            })
        })
        .collect();

    let mut opportunities: Vec<Opportunity> = OPPORTUNITY_AUDITS
        .iter()
        .filter_map(|id| {
            let audit = audits.get(*id)?;
            if audit["score"].as_f64().unwrap_or(1.0) >= 1.0 {
                return None;
            }
            let savings_ms = audit["details"]["overallSavingsMs"].as_f64().unwrap_or(0.0);
            let savings_bytes = audit["details"]["overallSavingsBytes"].as_f64().unwrap_or(0.0);
            if savings_ms <= 50.0 && savings_bytes <= 5000.0 {
                return None;
            }
            Some(Opportunity {
                id: id.to_string(),
                title: audit["title"].as_str().unwrap_or_default().to_string(),
                savings_ms: savings_ms as u64,
                savings_kb: ((savings_bytes / 1024.0) * 10.0).round() / 10.0,
            })
        })
        .collect();
    opportunities.sort_by(|a, b| b.savings_ms.cmp(&a.savings_ms));

    PageSpeedAudit {
        url: raw["id"].as_str().unwrap_or(url).to_string(),
        strategy,
        scores,
        lab,
        field,
        opportunities,
    }
}

pub struct PageSpeedInsights {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl PageSpeedInsights {
    pub fn new(api_key: &str, endpoint: &str, timeout_secs: u64) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl PageSpeedProvider for PageSpeedInsights {
    fn name(&self) -> &'static str {
        "pagespeed"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn audit(&self, url: &str, strategy: Strategy) -> ProviderResult<PageSpeedAudit> {
        debug!("PageSpeed audit of {} ({})", url, strategy.as_str());

        let params = [
            ("url", url),
            ("strategy", strategy.as_str()),
            ("key", self.api_key.as_str()),
            ("category", "performance"),
            ("category", "accessibility"),
            ("category", "best-practices"),
            ("category", "seo"),
        ];

        let response = self.client.get(&self.endpoint).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if raw.get("lighthouseResult").is_none() {
            return Err(ProviderError::Malformed(
                "response has no lighthouseResult".to_string(),
            ));
        }

        Ok(parse_audit(&raw, url, strategy))
    }
}

/// Stand-in used when no PageSpeed key is configured.
pub struct DisabledPageSpeed {
    reason: String,
}

impl DisabledPageSpeed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PageSpeedProvider for DisabledPageSpeed {
    fn name(&self) -> &'static str {
        "pagespeed (disabled)"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn audit(&self, _url: &str, _strategy: Strategy) -> ProviderResult<PageSpeedAudit> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, query_param},
    };

    fn sample_response() -> Value {
        json!({
            "id": "https://example.com/",
            "lighthouseResult": {
                "categories": {
                    "performance": {"score": 0.42},
                    "seo": {"score": 0.91}
                },
                "audits": {
                    "largest-contentful-paint": {"numericValue": 4800.0, "displayValue": "4.8 s"},
                    "cumulative-layout-shift": {"numericValue": 0.05, "displayValue": "0.05"},
                    "total-blocking-time": {"numericValue": 350.0, "displayValue": "350 ms"},
                    "unused-javascript": {
                        "score": 0.3, "title": "Reduce unused JavaScript",
                        "details": {"overallSavingsMs": 900, "overallSavingsBytes": 120000}
                    },
                    "uses-text-compression": {
                        "score": 0.5, "title": "Enable text compression",
                        "details": {"overallSavingsMs": 20, "overallSavingsBytes": 1000}
                    },
                    "render-blocking-resources": {
                        "score": 0.4, "title": "Eliminate render-blocking resources",
                        "details": {"overallSavingsMs": 1200, "overallSavingsBytes": 0}
                    },
                    "uses-long-cache-ttl": {
                        "score": 1, "title": "Cache policy",
                        "details": {"overallSavingsMs": 0, "overallSavingsBytes": 90000}
                    }
                }
            },
            "loadingExperience": {
                "metrics": {
                    "LARGEST_CONTENTFUL_PAINT_MS": {"category": "SLOW", "percentile": 4200}
                }
            }
        })
    }

    #[test]
    fn test_rate_against_cwv_thresholds() {
        assert_eq!(rate("lcp", 2.5), Rating::Good);
        assert_eq!(rate("lcp", 3.0), Rating::NeedsImprovement);
        assert_eq!(rate("lcp", 4.1), Rating::Poor);
        assert_eq!(rate("speed_index", 1.0), Rating::Unknown);
    }

    #[test]
    fn test_parse_audit() {
        let audit = parse_audit(&sample_response(), "https://example.com", Strategy::Mobile);

        assert_eq!(audit.url, "https://example.com/");
        assert_eq!(audit.scores.performance, Some(42));
        assert_eq!(audit.scores.seo, Some(91));
        assert_eq!(audit.scores.accessibility, None);

        let lcp = audit.lab_metric("lcp").unwrap();
        assert_eq!(lcp.value, 4.8);
        assert_eq!(lcp.rating, Rating::Poor);
        assert_eq!(audit.lab_metric("tbt").unwrap().rating, Rating::NeedsImprovement);

        assert_eq!(audit.field.len(), 1);
        assert_eq!(audit.field[0].rating, Rating::Poor);
        assert_eq!(audit.field[0].p75, Some(4200.0));

        let ids: Vec<&str> = audit.opportunities.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["render-blocking-resources", "unused-javascript"]);
        assert_eq!(audit.opportunities[1].savings_kb, 117.2);
    }

    #[tokio::test]
    async fn test_audit_passes_strategy_and_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("strategy", "desktop"))
            .and(query_param("key", "psi-key"))
            .and(query_param("url", "https://example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = PageSpeedInsights::new("psi-key", &mock_server.uri(), 5).unwrap();
        let audit = provider.audit("https://example.com", Strategy::Desktop).await.unwrap();
        assert_eq!(audit.strategy, Strategy::Desktop);
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let provider = PageSpeedInsights::new("psi-key", &mock_server.uri(), 5).unwrap();
        let err = provider.audit("https://example.com", Strategy::Mobile).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }
}
