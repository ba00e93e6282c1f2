// Web search via the Tavily HTTP API

use super::{ProviderResult, SearchProvider, SearchRequest, SearchResponse, status_error};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'a [String],
    #[serde(skip_serializing_if = "no_domains")]
    exclude_domains: &'a [String],
}

fn no_domains(domains: &&[String]) -> bool {
    domains.is_empty()
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: &str, base_url: &str, timeout_secs: u64) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn search(&self, request: &SearchRequest) -> ProviderResult<SearchResponse> {
        debug!("Tavily search: {}", request.query);

        let body = TavilyRequest {
            api_key: &self.api_key,
            query: &request.query,
            max_results: request.max_results,
            search_depth: request.depth.as_str(),
            include_domains: &request.include_domains,
            exclude_domains: &request.exclude_domains,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let mut parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if parsed.query.is_empty() {
            parsed.query = request.query.clone();
        }
        Ok(parsed)
    }
}

/// Stand-in used when no Tavily key is configured.
pub struct DisabledSearch {
    reason: String,
}

impl DisabledSearch {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for DisabledSearch {
    fn name(&self) -> &'static str {
        "search (disabled)"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn search(&self, _request: &SearchRequest) -> ProviderResult<SearchResponse> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SearchDepth;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    #[tokio::test]
    async fn test_search_posts_query_and_parses_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "api_key": "tvly-test",
                "query": "coffee complete guide topics",
                "max_results": 5,
                "search_depth": "advanced"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "coffee complete guide topics",
                "results": [
                    {"title": "Guide", "url": "https://a.com/guide", "content": "## Brewing methods", "score": 0.9}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = TavilySearch::new("tvly-test", &mock_server.uri(), 5).unwrap();
        let response = provider
            .search(&SearchRequest::new("coffee complete guide topics", 5, SearchDepth::Advanced))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].url, "https://a.com/guide");
    }

    #[tokio::test]
    async fn test_rate_limit_and_status_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"query": "busy"})))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"query": "denied"})))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&mock_server)
            .await;

        let provider = TavilySearch::new("bad", &mock_server.uri(), 5).unwrap();

        let err = provider
            .search(&SearchRequest::new("busy", 3, SearchDepth::Basic))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));

        let err = provider
            .search(&SearchRequest::new("denied", 3, SearchDepth::Basic))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_disabled_search_is_not_configured() {
        let provider = DisabledSearch::new("TAVILY_API_KEY not set");
        assert!(!provider.is_configured());
        let err = provider
            .search(&SearchRequest::new("x", 1, SearchDepth::Basic))
            .await
            .unwrap_err();
        assert!(err.is_not_configured());
    }
}
