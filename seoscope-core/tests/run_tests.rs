// Tests for run orchestration against mock site and provider servers

use chrono::NaiveDate;
use seoscope_core::run::ModuleKind;
use seoscope_core::{
    AnalysisConfig, AnalysisError, Analyzer, Database, FetchCache, Integrations, Mode,
    ModuleStatus, RunRequest, Severity,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANALYTICS_PATH: &str = r"^/webmasters/v3/sites/.+/searchAnalytics/query$";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html",
    )
}

/// Three-page site: a root linking to a thin page and a long one.
async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<main><a href="/a">Short page</a> <a href="/b">Long read</a></main>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<p>only a few words here</p><a href="/">home</a>"#))
        .mount(server)
        .await;

    let long_text = "word ".repeat(400);
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(&format!(r#"<p>{}</p><a href="/">home</a>"#, long_text)))
        .mount(server)
        .await;
}

/// Search Analytics answers keyed on the requested dimensions.
async fn mount_search_console(server: &MockServer, site: &str) {
    Mock::given(method("POST"))
        .and(path_regex(ANALYTICS_PATH))
        .and(body_partial_json(json!({"dimensions": ["query", "page"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                {"keys": ["coffee grinder", format!("{}/a", site)], "clicks": 4, "impressions": 80, "ctr": 0.05, "position": 4.0},
                {"keys": ["coffee grinder", format!("{}/b", site)], "clicks": 2, "impressions": 60, "ctr": 0.03, "position": 9.0}
            ]
        })))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(ANALYTICS_PATH))
        .and(body_partial_json(json!({"dimensions": ["query"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                {"keys": ["coffee grinder"], "clicks": 6, "impressions": 140, "ctr": 0.04, "position": 5.0},
                {"keys": ["burr vs blade"], "clicks": 9, "impressions": 90, "ctr": 0.1, "position": 3.0}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(ANALYTICS_PATH))
        .and(body_partial_json(json!({"dimensions": ["page"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                {"keys": [format!("{}/a", site)], "clicks": 4, "impressions": 500, "ctr": 0.01, "position": 6.0},
                {"keys": [format!("{}/b", site)], "clicks": 2, "impressions": 300, "ctr": 0.01, "position": 8.0}
            ]
        })))
        .mount(server)
        .await;
}

fn config_for(gsc: Option<&MockServer>, cache_dir: &TempDir) -> AnalysisConfig {
    let mut config = AnalysisConfig {
        cache_dir: cache_dir.path().to_path_buf(),
        site_timeout_secs: 5,
        provider_timeout_secs: 5,
        ..Default::default()
    };
    if let Some(server) = gsc {
        config.keys.gsc_oauth_token = Some("test-token".to_string());
        config.endpoints.search_console = server.uri();
    }
    config
}

// ============================================================================
// Planning
// ============================================================================

#[tokio::test]
async fn test_content_mode_without_providers_fails_before_fetching() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(None, &dir);
    let analyzer = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::in_memory(),
    )
    .unwrap();

    let result = analyzer
        .run(&RunRequest::new(site.uri()), Mode::Content, today())
        .await;
    assert!(matches!(result, Err(AnalysisError::NoUsableProvider { .. })));
}

#[tokio::test]
async fn test_topical_needs_a_niche() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(None, &dir);
    config.keys.tavily_api_key = Some("key".to_string());
    let analyzer = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::in_memory(),
    )
    .unwrap();

    let without = analyzer.plan(Mode::Content, &RunRequest::new("example.com"));
    assert!(without.is_err());

    let with = analyzer
        .plan(Mode::Content, &RunRequest::new("example.com").with_niche("coffee"))
        .unwrap();
    assert_eq!(with, vec![ModuleKind::Topical]);
}

// ============================================================================
// Technical mode
// ============================================================================

#[tokio::test]
async fn test_technical_run_without_providers() {
    let site = MockServer::start().await;
    mount_site(&site).await;

    let dir = TempDir::new().unwrap();
    let config = config_for(None, &dir);
    let analyzer = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::in_memory(),
    )
    .unwrap();

    let ctx = analyzer
        .run(&RunRequest::new(site.uri()), Mode::Technical, today())
        .await
        .unwrap();

    assert!(ctx.decay.is_none());
    assert!(ctx.health.is_none());

    let architecture = ctx.architecture.unwrap();
    assert_eq!(architecture.status, ModuleStatus::Ok);
    assert_eq!(architecture.data.pages_crawled, 3);
    assert!(architecture.data.orphans.is_empty());

    // No robots.txt mounted, so the mock answers 404.
    let robots = ctx.robots.unwrap();
    assert!(!robots.data.found);
    assert!(robots.data.issues.iter().any(|i| i.severity == Severity::High));

    let pagespeed = ctx.pagespeed.unwrap();
    assert_eq!(pagespeed.status.label(), "skipped");
}

// ============================================================================
// Content mode and the cache
// ============================================================================

#[tokio::test]
async fn test_content_run_flags_thin_and_cannibalized_pages() {
    let site = MockServer::start().await;
    let gsc = MockServer::start().await;
    mount_site(&site).await;
    mount_search_console(&gsc, &site.uri()).await;

    let dir = TempDir::new().unwrap();
    let config = config_for(Some(&gsc), &dir);
    let analyzer = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::in_memory(),
    )
    .unwrap();

    let ctx = analyzer
        .run(&RunRequest::new(site.uri()), Mode::Content, today())
        .await
        .unwrap();

    let thin = ctx.thin_content.unwrap();
    assert_eq!(thin.status, ModuleStatus::Ok);
    assert_eq!(thin.data.total, 1);
    assert_eq!(thin.data.pages[0].url, format!("{}/a", site.uri()));
    assert_eq!(thin.data.pages[0].severity, Severity::High);

    let cannibal = ctx.cannibalization.unwrap();
    assert_eq!(cannibal.data.total, 1);
    assert_eq!(cannibal.data.groups[0].query, "coffee grinder");

    let decay = ctx.decay.unwrap();
    assert_eq!(decay.status, ModuleStatus::Ok);
    assert_eq!(decay.data.total, 0);

    // Topical was selected but has no search provider.
    assert_eq!(ctx.topical.unwrap().status.label(), "skipped");

    let health = ctx.health.unwrap();
    assert_eq!(health.status, ModuleStatus::Ok);
    assert_eq!(health.data.score, 100 - 5 - 2);
    assert!(ctx.architecture.is_none());
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let site = MockServer::start().await;
    let gsc = MockServer::start().await;
    mount_site(&site).await;
    mount_search_console(&gsc, &site.uri()).await;

    let dir = TempDir::new().unwrap();
    let config = config_for(Some(&gsc), &dir);
    let database = Arc::new(Database::new(&config.database_path()).unwrap());
    let cache = FetchCache::new(database, false);
    let analyzer = Analyzer::new(config.clone(), Integrations::from_config(&config), cache).unwrap();
    let request = RunRequest::new(site.uri());

    let first = analyzer.run(&request, Mode::Content, today()).await.unwrap();
    let gsc_calls = gsc.received_requests().await.unwrap().len();
    let site_calls = site.received_requests().await.unwrap().len();
    // Three decay windows, two change windows, one cannibalization and one thin-content query.
    assert_eq!(gsc_calls, 7);
    assert_eq!(site_calls, 2);

    let second = analyzer.run(&request, Mode::Content, today()).await.unwrap();
    assert_eq!(gsc.received_requests().await.unwrap().len(), gsc_calls);
    assert_eq!(site.received_requests().await.unwrap().len(), site_calls);

    assert_eq!(
        first.health.unwrap().data.score,
        second.health.unwrap().data.score
    );
}

#[tokio::test]
async fn test_refresh_bypasses_cache_reads() {
    let site = MockServer::start().await;
    let gsc = MockServer::start().await;
    mount_site(&site).await;
    mount_search_console(&gsc, &site.uri()).await;

    let dir = TempDir::new().unwrap();
    let config = config_for(Some(&gsc), &dir);
    let store = Arc::new(seoscope_core::MemoryCache::new());
    let request = RunRequest::new(site.uri());

    let warm = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::new(store.clone(), false),
    )
    .unwrap();
    warm.run(&request, Mode::Content, today()).await.unwrap();
    let gsc_calls = gsc.received_requests().await.unwrap().len();

    let refreshing = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::new(store, true),
    )
    .unwrap();
    refreshing.run(&request, Mode::Content, today()).await.unwrap();
    assert_eq!(gsc.received_requests().await.unwrap().len(), gsc_calls * 2);
}

// ============================================================================
// Full mode baselines
// ============================================================================

#[tokio::test]
async fn test_full_run_saves_baseline() {
    let site = MockServer::start().await;
    let gsc = MockServer::start().await;
    mount_site(&site).await;
    mount_search_console(&gsc, &site.uri()).await;

    let dir = TempDir::new().unwrap();
    let config = config_for(Some(&gsc), &dir);
    let database = Arc::new(Database::new(&config.database_path()).unwrap());
    let analyzer = Analyzer::new(
        config.clone(),
        Integrations::from_config(&config),
        FetchCache::new(database.clone(), false),
    )
    .unwrap()
    .with_database(database.clone());
    let request = RunRequest::new(site.uri());

    let first = analyzer.run(&request, Mode::Full, today()).await.unwrap();
    assert!(first.baseline_saved);
    assert!(first.previous_baseline.is_none());
    assert!(first.architecture.unwrap().has_data());

    let baseline = database.latest_baseline(&site.uri()).unwrap().unwrap();
    assert_eq!(baseline.date, "2026-03-15");
    assert_eq!(baseline.health_score, 93);
    assert_eq!(baseline.top_queries, vec!["burr vs blade", "coffee grinder"]);

    let second = analyzer.run(&request, Mode::Full, today()).await.unwrap();
    assert_eq!(second.previous_baseline.unwrap().health_score, 93);
}
