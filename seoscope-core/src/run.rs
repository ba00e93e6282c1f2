// Run orchestration: mode planning, module execution and baselines

use crate::architecture::{ArchitectureReport, analyze_architecture};
use crate::cache::FetchCache;
use crate::cannibal::{CannibalizationReport, detect_cannibalization};
use crate::changes::{PositionChanges, detect_position_changes};
use crate::config::AnalysisConfig;
use crate::crawl::{CrawlOptions, CrawlProgressCallback, cached_crawl};
use crate::data::{Baseline, Database};
use crate::decay::{DecayReport, detect_decay};
use crate::error::{AnalysisError, Result};
use crate::model::ModuleReport;
use crate::pagespeed::{PageSpeedSummary, audit_page_speed};
use crate::providers::{
    DisabledPageSpeed, DisabledPerformance, DisabledSearch, Dimension, PageSpeedInsights,
    PageSpeedProvider, PerformanceProvider, PerformanceQuery, SearchConsole, SearchProvider,
    TavilySearch, cached_query,
};
use crate::robots::{RobotsReport, check_robots};
use crate::score::HealthScore;
use crate::thin::{ThinContentReport, detect_thin_content};
use crate::topical::{TopicalMap, map_topical_coverage};
use crate::windows::{change_windows, recent_window};
use chrono::NaiveDate;
use reqwest::Client;
use seoscope_scanner::crawler::build_client;
use seoscope_scanner::normalize_url;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

const BASELINE_TOP_QUERIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Full,
    Content,
    Technical,
}

impl Mode {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" => Some(Mode::Full),
            "content" => Some(Mode::Content),
            "technical" | "tech" => Some(Mode::Technical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Content => "content",
            Mode::Technical => "technical",
        }
    }

    pub fn modules(&self) -> &'static [ModuleKind] {
        use ModuleKind::*;
        match self {
            Mode::Full => &[
                Decay,
                PositionChanges,
                Cannibalization,
                ThinContent,
                Topical,
                Health,
                Architecture,
                Robots,
                PageSpeed,
            ],
            Mode::Content => &[
                Decay,
                PositionChanges,
                Cannibalization,
                ThinContent,
                Topical,
                Health,
            ],
            Mode::Technical => &[Architecture, Robots, PageSpeed],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Decay,
    PositionChanges,
    Cannibalization,
    ThinContent,
    Topical,
    Health,
    Architecture,
    Robots,
    PageSpeed,
}

/// The provider clients a run talks to. Missing credentials yield
/// disabled stand-ins, never `None`.
#[derive(Clone)]
pub struct Integrations {
    pub search: Arc<dyn SearchProvider>,
    pub performance: Arc<dyn PerformanceProvider>,
    pub pagespeed: Arc<dyn PageSpeedProvider>,
}

impl Integrations {
    pub fn disabled() -> Self {
        Self {
            search: Arc::new(DisabledSearch::new("TAVILY_API_KEY not set")),
            performance: Arc::new(DisabledPerformance::new("GSC_OAUTH_TOKEN not set")),
            pagespeed: Arc::new(DisabledPageSpeed::new("PAGESPEED_API_KEY not set")),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut integrations = Self::disabled();
        let timeout = config.provider_timeout_secs;

        if let Some(key) = config.keys.tavily() {
            match TavilySearch::new(key, &config.endpoints.tavily, timeout) {
                Ok(provider) => integrations.search = Arc::new(provider),
                Err(e) => {
                    warn!("Search provider disabled: {}", e);
                    integrations.search = Arc::new(DisabledSearch::new(e.to_string()));
                }
            }
        }
        if let Some(token) = config.keys.gsc() {
            match SearchConsole::new(token, &config.endpoints.search_console, timeout) {
                Ok(provider) => integrations.performance = Arc::new(provider),
                Err(e) => {
                    warn!("Performance provider disabled: {}", e);
                    integrations.performance = Arc::new(DisabledPerformance::new(e.to_string()));
                }
            }
        }
        if let Some(key) = config.keys.pagespeed() {
            match PageSpeedInsights::new(key, &config.endpoints.pagespeed, config.pagespeed_timeout_secs) {
                Ok(provider) => integrations.pagespeed = Arc::new(provider),
                Err(e) => {
                    warn!("PageSpeed provider disabled: {}", e);
                    integrations.pagespeed = Arc::new(DisabledPageSpeed::new(e.to_string()));
                }
            }
        }

        integrations
    }

    pub fn status(&self) -> IntegrationStatus {
        IntegrationStatus {
            search: self.search.is_configured(),
            performance: self.performance.is_configured(),
            pagespeed: self.pagespeed.is_configured(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub search: bool,
    pub performance: bool,
    pub pagespeed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub site: String,
    pub niche: Option<String>,
    pub competitors: Vec<String>,
}

impl RunRequest {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            ..Default::default()
        }
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    pub fn with_competitors(mut self, competitors: Vec<String>) -> Self {
        self.competitors = competitors;
        self
    }
}

/// Everything a run produced, in the shape the renderers consume.
/// Modules the mode did not select stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub site: String,
    pub root_url: String,
    pub mode: Mode,
    pub date: NaiveDate,
    pub generated_at: String,
    pub integrations: IntegrationStatus,
    pub niche: Option<String>,
    pub competitors: Vec<String>,
    pub decay: Option<ModuleReport<DecayReport>>,
    pub position_changes: Option<ModuleReport<PositionChanges>>,
    pub cannibalization: Option<ModuleReport<CannibalizationReport>>,
    pub thin_content: Option<ModuleReport<ThinContentReport>>,
    pub topical: Option<ModuleReport<TopicalMap>>,
    pub health: Option<ModuleReport<HealthScore>>,
    pub architecture: Option<ModuleReport<ArchitectureReport>>,
    pub robots: Option<ModuleReport<RobotsReport>>,
    pub pagespeed: Option<ModuleReport<PageSpeedSummary>>,
    pub previous_baseline: Option<Baseline>,
    pub baseline_saved: bool,
}

impl RunContext {
    fn new(request: &RunRequest, mode: Mode, date: NaiveDate, integrations: IntegrationStatus) -> Self {
        Self {
            site: request.site.clone(),
            root_url: normalize_url(&request.site),
            mode,
            date,
            generated_at: chrono::Utc::now().to_rfc3339(),
            integrations,
            niche: request.niche.clone(),
            competitors: request.competitors.clone(),
            decay: None,
            position_changes: None,
            cannibalization: None,
            thin_content: None,
            topical: None,
            health: None,
            architecture: None,
            robots: None,
            pagespeed: None,
            previous_baseline: None,
            baseline_saved: false,
        }
    }
}

/// Health from whichever content modules produced data.
pub fn health_from(
    decay: Option<&ModuleReport<DecayReport>>,
    cannibalization: Option<&ModuleReport<CannibalizationReport>>,
    thin: Option<&ModuleReport<ThinContentReport>>,
) -> ModuleReport<HealthScore> {
    let decay = decay.filter(|r| r.has_data()).map(|r| r.data.total);
    let groups = cannibalization.filter(|r| r.has_data()).map(|r| r.data.total);
    let thin = thin.filter(|r| r.has_data()).map(|r| r.data.total);

    if decay.is_none() && groups.is_none() && thin.is_none() {
        return ModuleReport::skipped("no content module produced data");
    }

    let score = HealthScore::compute(
        decay.unwrap_or(0),
        groups.unwrap_or(0),
        thin.unwrap_or(0),
    );

    let mut missing = Vec::new();
    if decay.is_none() {
        missing.push("decay");
    }
    if groups.is_none() {
        missing.push("cannibalization");
    }
    if thin.is_none() {
        missing.push("thin content");
    }

    if missing.is_empty() {
        ModuleReport::ok(score)
    } else {
        ModuleReport::partial(score, format!("computed without {}", missing.join(", ")))
    }
}

pub struct Analyzer {
    config: AnalysisConfig,
    integrations: Integrations,
    cache: FetchCache,
    client: Client,
    database: Option<Arc<Database>>,
    progress_callback: Option<CrawlProgressCallback>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, integrations: Integrations, cache: FetchCache) -> Result<Self> {
        let client = build_client(&config.user_agent, config.site_timeout_secs)?;
        Ok(Self {
            config,
            integrations,
            cache,
            client,
            database: None,
            progress_callback: None,
        })
    }

    /// Store used for baseline snapshots in full mode.
    pub fn with_database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn can_run(&self, module: ModuleKind, request: &RunRequest) -> bool {
        match module {
            ModuleKind::Decay
            | ModuleKind::PositionChanges
            | ModuleKind::Cannibalization
            | ModuleKind::ThinContent => self.integrations.performance.is_configured(),
            ModuleKind::Topical => self.integrations.search.is_configured() && request.niche.is_some(),
            ModuleKind::PageSpeed => self.integrations.pagespeed.is_configured(),
            ModuleKind::Architecture | ModuleKind::Robots => true,
            // Derived from other modules.
            ModuleKind::Health => false,
        }
    }

    /// Modules of `mode` that can run, or `NoUsableProvider` when none can.
    pub fn plan(&self, mode: Mode, request: &RunRequest) -> Result<Vec<ModuleKind>> {
        let runnable: Vec<ModuleKind> = mode
            .modules()
            .iter()
            .copied()
            .filter(|m| self.can_run(*m, request))
            .collect();

        if runnable.is_empty() {
            let status = self.integrations.status();
            return Err(AnalysisError::NoUsableProvider {
                mode: mode.as_str().to_string(),
                reason: format!(
                    "search configured: {}, performance configured: {}, niche given: {}",
                    status.search,
                    status.performance,
                    request.niche.is_some()
                ),
            });
        }
        Ok(runnable)
    }

    pub async fn run(&self, request: &RunRequest, mode: Mode, today: NaiveDate) -> Result<RunContext> {
        let plan = self.plan(mode, request)?;
        info!(
            "Analyzing {} in {} mode ({} runnable modules)",
            request.site,
            mode.as_str(),
            plan.len()
        );

        let mut ctx = RunContext::new(request, mode, today, self.integrations.status());
        let site = request.site.as_str();
        let thresholds = &self.config.thresholds;
        let performance = self.integrations.performance.as_ref();
        let selected = |m: ModuleKind| mode.modules().contains(&m);

        if selected(ModuleKind::Decay) {
            ctx.decay = Some(detect_decay(performance, &self.cache, site, today, thresholds).await);
        }
        if selected(ModuleKind::PositionChanges) {
            ctx.position_changes =
                Some(detect_position_changes(performance, &self.cache, site, today, thresholds).await);
        }
        if selected(ModuleKind::Cannibalization) {
            ctx.cannibalization =
                Some(detect_cannibalization(performance, &self.cache, site, today, thresholds).await);
        }
        if selected(ModuleKind::ThinContent) {
            ctx.thin_content = Some(
                detect_thin_content(performance, &self.cache, &self.client, site, today, thresholds)
                    .await,
            );
        }
        if selected(ModuleKind::Topical) {
            ctx.topical = Some(match request.niche.as_deref() {
                Some(niche) => {
                    map_topical_coverage(
                        self.integrations.search.as_ref(),
                        performance,
                        &self.cache,
                        site,
                        niche,
                        &request.competitors,
                        today,
                        thresholds,
                    )
                    .await
                }
                None => ModuleReport::skipped("no niche given"),
            });
        }
        if selected(ModuleKind::Health) {
            ctx.health = Some(health_from(
                ctx.decay.as_ref(),
                ctx.cannibalization.as_ref(),
                ctx.thin_content.as_ref(),
            ));
        }

        if selected(ModuleKind::Architecture) {
            ctx.architecture = Some(self.run_architecture(site, &ctx.root_url, today).await);
        }
        if selected(ModuleKind::Robots) {
            ctx.robots = Some(check_robots(&self.client, &ctx.root_url).await);
        }
        if selected(ModuleKind::PageSpeed) {
            ctx.pagespeed = Some(
                audit_page_speed(self.integrations.pagespeed.as_ref(), &self.cache, &ctx.root_url)
                    .await,
            );
        }

        if mode == Mode::Full {
            self.save_baseline(&mut ctx, today).await;
        }

        Ok(ctx)
    }

    async fn run_architecture(&self, site: &str, root_url: &str, today: NaiveDate) -> ModuleReport<ArchitectureReport> {
        let options = CrawlOptions::from_config(root_url, &self.config);
        let graph = match cached_crawl(options, &self.cache, self.progress_callback.clone()).await {
            Ok(graph) => graph,
            Err(e) => {
                warn!("Crawl of {} failed: {}", root_url, e);
                return ModuleReport::error(e.to_string());
            }
        };

        let known_pages = if self.integrations.performance.is_configured() {
            self.indexed_pages(site, today).await
        } else {
            Vec::new()
        };

        ModuleReport::ok(analyze_architecture(
            &graph,
            &known_pages,
            &self.config.generic_anchors,
            &self.config.thresholds,
        ))
    }

    /// Pages Search Console knows about; shares the thin-content query.
    async fn indexed_pages(&self, site: &str, today: NaiveDate) -> Vec<String> {
        let window = recent_window(today, 30);
        let query = PerformanceQuery {
            site: site.to_string(),
            start_date: window.start,
            end_date: window.end,
            dimensions: vec![Dimension::Page],
            row_limit: self.config.thresholds.thin_candidate_limit,
        };
        match cached_query(self.integrations.performance.as_ref(), &self.cache, &query).await {
            Ok(rows) => rows.iter().filter_map(|r| r.key(0).map(str::to_string)).collect(),
            Err(e) => {
                warn!("Indexed pages for {} unavailable: {}", site, e);
                Vec::new()
            }
        }
    }

    /// Top queries by clicks; shares the position-change query.
    async fn top_queries(&self, site: &str, today: NaiveDate) -> Vec<String> {
        let (current, _) = change_windows(today);
        let query = PerformanceQuery {
            site: site.to_string(),
            start_date: current.start,
            end_date: current.end,
            dimensions: vec![Dimension::Query],
            row_limit: self.config.thresholds.changes_row_limit,
        };
        let Ok(mut rows) = cached_query(self.integrations.performance.as_ref(), &self.cache, &query).await
        else {
            return Vec::new();
        };
        rows.sort_by(|a, b| b.clicks.partial_cmp(&a.clicks).unwrap_or(Ordering::Equal));
        rows.iter()
            .filter_map(|r| r.key(0).map(str::to_string))
            .take(BASELINE_TOP_QUERIES)
            .collect()
    }

    async fn save_baseline(&self, ctx: &mut RunContext, today: NaiveDate) {
        let Some(ref database) = self.database else {
            return;
        };
        let Some(health) = ctx.health.as_ref().filter(|h| h.has_data()).map(|h| h.data) else {
            return;
        };

        match database.latest_baseline(&ctx.site) {
            Ok(previous) => ctx.previous_baseline = previous,
            Err(e) => warn!("Could not read previous baseline: {}", e),
        }

        let top_queries = if self.integrations.performance.is_configured() {
            self.top_queries(&ctx.site, today).await
        } else {
            Vec::new()
        };

        let baseline = Baseline {
            site: ctx.site.clone(),
            date: today.format("%Y-%m-%d").to_string(),
            health_score: health.score,
            top_queries,
            created_at: crate::cache::current_timestamp(),
        };
        match database.save_baseline(&baseline) {
            Ok(_) => {
                info!("Saved baseline for {} (score {})", ctx.site, health.score);
                ctx.baseline_saved = true;
            }
            Err(e) => warn!("Could not save baseline: {}", e),
        }
    }
}
