// Third-party data providers: traits, wire records and disabled stand-ins

pub mod pagespeed;
pub mod performance;
pub mod search;

use crate::cache::{CacheKey, CacheKind, FetchCache};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use pagespeed::{DisabledPageSpeed, PageSpeedAudit, PageSpeedInsights, Strategy};
pub use performance::{DisabledPerformance, SearchConsole};
pub use search::{DisabledSearch, TavilySearch};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
    pub depth: SearchDepth,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, max_results: u32, depth: SearchDepth) -> Self {
        Self {
            query: query.into(),
            max_results,
            depth,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        }
    }

    fn cache_params(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.query,
            self.max_results,
            self.depth.as_str(),
            self.include_domains.join(","),
            self.exclude_domains.join(",")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    async fn search(&self, request: &SearchRequest) -> ProviderResult<SearchResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Query,
    Page,
    Device,
    Country,
    Date,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Query => "query",
            Dimension::Page => "page",
            Dimension::Device => "device",
            Dimension::Country => "country",
            Dimension::Date => "date",
        }
    }
}

/// One Search Analytics request: a date window cut by some dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceQuery {
    pub site: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dimensions: Vec<Dimension>,
    pub row_limit: u32,
}

impl PerformanceQuery {
    fn cache_params(&self) -> String {
        let dims: Vec<&str> = self.dimensions.iter().map(Dimension::as_str).collect();
        format!(
            "{}:{}:{}:{}",
            self.start_date,
            self.end_date,
            dims.join("_"),
            self.row_limit
        )
    }
}

/// A metric sample. `ctr` is a percentage in 0..=100.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub keys: Vec<String>,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

impl PerformanceRow {
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }
}

#[async_trait]
pub trait PerformanceProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    async fn query(&self, query: &PerformanceQuery) -> ProviderResult<Vec<PerformanceRow>>;
}

#[async_trait]
pub trait PageSpeedProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    async fn audit(&self, url: &str, strategy: Strategy) -> ProviderResult<PageSpeedAudit>;
}

pub async fn cached_search(
    provider: &dyn SearchProvider,
    cache: &FetchCache,
    subject: &str,
    request: &SearchRequest,
) -> ProviderResult<SearchResponse> {
    if !provider.is_configured() {
        return provider.search(request).await;
    }
    let key = CacheKey::new(subject, CacheKind::Search, &request.cache_params());
    cache.get_or_fetch(&key, || provider.search(request)).await
}

pub async fn cached_query(
    provider: &dyn PerformanceProvider,
    cache: &FetchCache,
    query: &PerformanceQuery,
) -> ProviderResult<Vec<PerformanceRow>> {
    if !provider.is_configured() {
        return provider.query(query).await;
    }
    let key = CacheKey::new(&query.site, CacheKind::Performance, &query.cache_params());
    cache.get_or_fetch(&key, || provider.query(query)).await
}

pub async fn cached_audit(
    provider: &dyn PageSpeedProvider,
    cache: &FetchCache,
    url: &str,
    strategy: Strategy,
) -> ProviderResult<PageSpeedAudit> {
    if !provider.is_configured() {
        return provider.audit(url, strategy).await;
    }
    let key = CacheKey::new(url, CacheKind::PageSpeed, strategy.as_str());
    cache.get_or_fetch(&key, || provider.audit(url, strategy)).await
}

/// Maps a non-success HTTP answer to the matching error.
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    if status == 429 {
        return ProviderError::RateLimited;
    }
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();
    ProviderError::Status { status, body }
}
