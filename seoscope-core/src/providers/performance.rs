// Search performance via the Search Console Search Analytics API

use super::{PerformanceProvider, PerformanceQuery, PerformanceRow, ProviderResult, status_error};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;

#[derive(Deserialize)]
struct AnalyticsResponse {
    #[serde(default)]
    rows: Vec<AnalyticsRow>,
}

#[derive(Deserialize)]
struct AnalyticsRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

pub struct SearchConsole {
    client: Client,
    token: String,
    base_url: String,
}

impl SearchConsole {
    pub fn new(token: &str, base_url: &str, timeout_secs: u64) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Search Console property for a site. URL-prefix properties always end
/// in `/`, bare domains become `https://{domain}/`.
pub fn property_url(site: &str) -> String {
    if site.starts_with("sc-domain:") {
        site.to_string()
    } else if site.starts_with("http://") || site.starts_with("https://") {
        format!("{}/", site.trim_end_matches('/'))
    } else {
        format!("https://{}/", site.trim_end_matches('/'))
    }
}

#[async_trait]
impl PerformanceProvider for SearchConsole {
    fn name(&self) -> &'static str {
        "search-console"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn query(&self, query: &PerformanceQuery) -> ProviderResult<Vec<PerformanceRow>> {
        let property: String =
            form_urlencoded::byte_serialize(property_url(&query.site).as_bytes()).collect();
        let endpoint = format!(
            "{}/webmasters/v3/sites/{}/searchAnalytics/query",
            self.base_url, property
        );
        let dimensions: Vec<&str> = query.dimensions.iter().map(|d| d.as_str()).collect();

        debug!(
            "Search Analytics {} {}..{} {:?}",
            query.site, query.start_date, query.end_date, dimensions
        );

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(&json!({
                "startDate": query.start_date.format("%Y-%m-%d").to_string(),
                "endDate": query.end_date.format("%Y-%m-%d").to_string(),
                "dimensions": dimensions,
                "rowLimit": query.row_limit,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: AnalyticsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(parsed
            .rows
            .into_iter()
            .map(|row| PerformanceRow {
                keys: row.keys,
                clicks: row.clicks,
                impressions: row.impressions,
                ctr: row.ctr * 100.0,
                position: row.position,
            })
            .collect())
    }
}

/// Stand-in used when no OAuth token is configured.
pub struct DisabledPerformance {
    reason: String,
}

impl DisabledPerformance {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PerformanceProvider for DisabledPerformance {
    fn name(&self) -> &'static str {
        "search-console (disabled)"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn query(&self, _query: &PerformanceQuery) -> ProviderResult<Vec<PerformanceRow>> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Dimension;
    use chrono::NaiveDate;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path_regex},
    };

    fn page_query() -> PerformanceQuery {
        PerformanceQuery {
            site: "example.com".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 19).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            dimensions: vec![Dimension::Page],
            row_limit: 1000,
        }
    }

    #[test]
    fn test_property_url() {
        assert_eq!(property_url("example.com"), "https://example.com/");
        assert_eq!(property_url("https://example.com/"), "https://example.com/");
        assert_eq!(property_url("sc-domain:example.com"), "sc-domain:example.com");
        // Sites arrive without the trailing slash after argument parsing.
        assert_eq!(property_url("https://example.com"), "https://example.com/");
        assert_eq!(property_url("http://example.com/blog"), "http://example.com/blog/");
    }

    #[tokio::test]
    async fn test_url_prefix_property_is_requested_with_trailing_slash() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/webmasters/v3/sites/https%3A%2F%2Fexample\.com%2F/searchAnalytics/query$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"rows": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = SearchConsole::new("t", &mock_server.uri(), 5).unwrap();
        let query = PerformanceQuery {
            site: "https://example.com".to_string(),
            ..page_query()
        };
        assert!(provider.query(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_sends_window_and_scales_ctr() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/webmasters/v3/sites/[^/]+/searchAnalytics/query$"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(body_partial_json(serde_json::json!({
                "startDate": "2026-09-19",
                "endDate": "2026-10-16",
                "dimensions": ["page"],
                "rowLimit": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rows": [
                    {"keys": ["https://example.com/a"], "clicks": 12.0, "impressions": 400.0, "ctr": 0.03, "position": 7.2}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = SearchConsole::new("ya29.token", &mock_server.uri(), 5).unwrap();
        let rows = provider.query(&page_query()).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key(0), Some("https://example.com/a"));
        assert!((rows[0].ctr - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_rows_means_no_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseAggregationType": "byPage"
            })))
            .mount(&mock_server)
            .await;

        let provider = SearchConsole::new("t", &mock_server.uri(), 5).unwrap();
        assert!(provider.query(&page_query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_property_is_a_status_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("User does not have sufficient permission"))
            .mount(&mock_server)
            .await;

        let provider = SearchConsole::new("t", &mock_server.uri(), 5).unwrap();
        let err = provider.query(&page_query()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 403, .. }));
    }
}
