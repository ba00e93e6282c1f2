use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use seoscope_core::cache::current_timestamp;
use seoscope_core::config::expand_path;
use seoscope_core::crawl::{CrawlOptions, cached_crawl, generate_crawl_report};
use seoscope_core::report::{ReportFormat, render_report, save_report};
use seoscope_core::run::ModuleKind;
use seoscope_core::{
    AnalysisConfig, AnalysisError, Analyzer, Database, FetchCache, Integrations, Mode, RunContext,
    RunRequest,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Default log filter for a `-v` count, used when RUST_LOG is unset.
pub fn log_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Logs go to stderr so a report printed on stdout stays clean.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Accepts a bare domain or a URL and returns the site as the user meant it,
/// without a trailing slash.
pub fn parse_site(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("Site must not be empty");
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let parsed = Url::parse(&with_scheme).with_context(|| format!("Invalid site '{}'", raw))?;
    if parsed.host_str().is_none() {
        bail!("Site '{}' has no host", raw);
    }

    Ok(trimmed.to_string())
}

/// Flattens repeated and comma separated competitor values, dropping blanks
/// and duplicates while keeping the order given.
pub fn parse_competitors<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut competitors: Vec<String> = Vec::new();
    for value in values {
        for domain in value.split(',') {
            let domain = domain.trim().trim_end_matches('/').to_lowercase();
            if !domain.is_empty() && !competitors.contains(&domain) {
                competitors.push(domain);
            }
        }
    }
    competitors
}

/// Picks the report format, letting the output file's extension win over
/// the default when `--format` was not given explicitly.
pub fn resolve_format(format: Option<&str>, explicit: bool, output: Option<&Path>) -> ReportFormat {
    let from_flag = format.and_then(ReportFormat::from_str);
    if explicit {
        return from_flag.unwrap_or(ReportFormat::Markdown);
    }
    output
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .and_then(ReportFormat::from_str)
        .or(from_flag)
        .unwrap_or(ReportFormat::Markdown)
}

fn optional<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
    args.try_get_one::<T>(id).ok().flatten()
}

/// Assembles an [`AnalysisConfig`] from whichever of the shared arguments
/// this subcommand defines.
pub fn build_config(args: &ArgMatches) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();

    if let Some(dir) = optional::<String>(args, "cache-dir") {
        config.cache_dir = expand_path(dir);
    }
    if let Some(max_pages) = optional::<usize>(args, "max-pages") {
        config.max_pages = *max_pages;
    }
    if let Some(timeout) = optional::<u64>(args, "timeout") {
        config.site_timeout_secs = *timeout;
    }
    config.respect_robots = optional::<bool>(args, "respect-robots").copied().unwrap_or(false);
    config.refresh = optional::<bool>(args, "refresh").copied().unwrap_or(false);
    config.show_progress = !optional::<bool>(args, "quiet").copied().unwrap_or(false);

    config.keys.tavily_api_key = optional::<String>(args, "tavily-key").cloned();
    config.keys.gsc_oauth_token = optional::<String>(args, "gsc-token").cloned();
    config.keys.pagespeed_api_key = optional::<String>(args, "pagespeed-key").cloned();

    config
}

/// Opens (creating if needed) the cache database under the configured dir.
pub fn open_database(config: &AnalysisConfig) -> Result<Arc<Database>> {
    fs::create_dir_all(&config.cache_dir).with_context(|| {
        format!("Failed to create cache directory {}", config.cache_dir.display())
    })?;
    let path = config.database_path();
    let database = Database::new(&path)
        .with_context(|| format!("Failed to open cache database {}", path.display()))?;
    Ok(Arc::new(database))
}

fn write_output(report: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            save_report(report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("{} Report saved to {}", "✓".green().bold(), path.display().to_string().bright_white());
        }
        None => print!("{}", report),
    }
    Ok(())
}

fn print_run_summary(ctx: &RunContext) {
    eprintln!();
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!("{}", format!("  {} ({} mode)", ctx.site, ctx.mode.as_str()).bright_white().bold());
    eprintln!("{}", "═".repeat(60).bright_blue().bold());

    if let Some(health) = ctx.health.as_ref().filter(|h| h.has_data()) {
        let score = health.data.score.to_string();
        let colored_score = match health.data.score {
            80..=100 => score.green().bold(),
            60..=79 => score.yellow().bold(),
            _ => score.red().bold(),
        };
        eprintln!("  Content health: {}/100 ({})", colored_score, health.data.label());
    }
    if let Some(arch) = ctx.architecture.as_ref().filter(|a| a.has_data()) {
        eprintln!("  Architecture:   {}/100", arch.data.score.to_string().cyan().bold());
    }

    let statuses = [
        ("decay", ctx.decay.as_ref().map(|r| &r.status)),
        ("position changes", ctx.position_changes.as_ref().map(|r| &r.status)),
        ("cannibalization", ctx.cannibalization.as_ref().map(|r| &r.status)),
        ("thin content", ctx.thin_content.as_ref().map(|r| &r.status)),
        ("topical map", ctx.topical.as_ref().map(|r| &r.status)),
        ("architecture", ctx.architecture.as_ref().map(|r| &r.status)),
        ("robots.txt", ctx.robots.as_ref().map(|r| &r.status)),
        ("page speed", ctx.pagespeed.as_ref().map(|r| &r.status)),
    ];
    for (name, status) in statuses {
        let Some(status) = status else {
            continue;
        };
        let label = match status.label() {
            "ok" => "ok".green(),
            "partial" => "partial".yellow(),
            "skipped" => "skipped".bright_black(),
            other => other.red(),
        };
        match status.detail() {
            Some(detail) => eprintln!("  {} {}: {} ({})", "→".blue(), name, label, detail),
            None => eprintln!("  {} {}: {}", "→".blue(), name, label),
        }
    }
    if ctx.baseline_saved {
        eprintln!("  {} Baseline snapshot saved", "✓".green().bold());
    }
    eprintln!();
}

pub async fn handle_analyze(args: &ArgMatches) -> Result<()> {
    let raw_site = args.get_one::<String>("SITE").context("A site is required")?;
    let site = parse_site(raw_site)?;
    let mode = args
        .get_one::<String>("mode")
        .and_then(|m| Mode::from_name(m))
        .unwrap_or(Mode::Full);
    let niche = args
        .get_one::<String>("niche")
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let competitors = parse_competitors(args.get_many::<String>("competitor").into_iter().flatten());
    let output = args.get_one::<PathBuf>("output");
    let explicit_format = args.value_source("format") == Some(clap::parser::ValueSource::CommandLine);
    let format = resolve_format(
        args.get_one::<String>("format").map(String::as_str),
        explicit_format,
        output.map(PathBuf::as_path),
    );
    let quiet = args.get_flag("quiet");

    let config = build_config(args);
    let database = open_database(&config)?;
    let cache = FetchCache::new(database.clone(), config.refresh);
    let integrations = Integrations::from_config(&config);
    let analyzer = Analyzer::new(config, integrations, cache)
        .context("Failed to set up the analyzer")?
        .with_database(database);

    let mut request = RunRequest::new(site).with_competitors(competitors);
    if let Some(niche) = niche {
        request = request.with_niche(niche);
    }

    info!("Starting {} analysis of {}", mode.as_str(), request.site);
    let today = chrono::Utc::now().date_naive();
    let ctx = analyzer.run(&request, mode, today).await?;

    if !quiet {
        print_run_summary(&ctx);
    }

    let report = render_report(&ctx, format).context("Failed to render report")?;
    write_output(&report, output)
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let url = args.get_one::<String>("URL").context("A URL is required")?;
    let site = parse_site(url)?;
    let output = args.get_one::<PathBuf>("output");

    let config = build_config(args);
    let database = open_database(&config)?;
    let cache = FetchCache::new(database, config.refresh);
    let options = CrawlOptions::from_config(&site, &config);

    if config.show_progress {
        eprintln!("\n{} Crawling {}", "→".blue().bold(), options.url.bright_white());
        eprintln!("Page budget: {}", options.max_pages);
        eprintln!(
            "robots.txt: {}\n",
            if options.respect_robots { "respected" } else { "ignored" }
        );
    }

    let graph = cached_crawl(options, &cache, None)
        .await
        .with_context(|| format!("Crawl of {} failed", site))?;

    if config.show_progress {
        eprintln!("{} Crawl complete!\n", "✓".green().bold());
    }

    let report = generate_crawl_report(&graph, output.is_none());
    write_output(&report, output)
}

fn module_name(module: ModuleKind) -> &'static str {
    match module {
        ModuleKind::Decay => "decay",
        ModuleKind::PositionChanges => "position changes",
        ModuleKind::Cannibalization => "cannibalization",
        ModuleKind::ThinContent => "thin content",
        ModuleKind::Topical => "topical map",
        ModuleKind::Health => "health score",
        ModuleKind::Architecture => "architecture",
        ModuleKind::Robots => "robots.txt",
        ModuleKind::PageSpeed => "page speed",
    }
}

pub fn handle_check(args: &ArgMatches) -> Result<()> {
    let config = build_config(args);
    let integrations = Integrations::from_config(&config);
    let status = integrations.status();

    println!("{}", "INTEGRATIONS".bright_blue().bold());
    let mark = |ok: bool| if ok { "✓".green().bold() } else { "✗".red().bold() };
    println!("  {} Tavily search (TAVILY_API_KEY)", mark(status.search));
    println!("  {} Search Console (GSC_OAUTH_TOKEN)", mark(status.performance));
    println!("  {} PageSpeed Insights (PAGESPEED_API_KEY)", mark(status.pagespeed));
    println!();

    let mut request = RunRequest::new("example.com");
    if let Some(niche) = args.get_one::<String>("niche") {
        request = request.with_niche(niche.clone());
    }

    let cache_dir = config.cache_dir.clone();
    let database_path = config.database_path();
    let analyzer = Analyzer::new(config, integrations, FetchCache::in_memory())
        .context("Failed to set up the analyzer")?;

    println!("{}", "MODES".bright_blue().bold());
    for mode in [Mode::Full, Mode::Content, Mode::Technical] {
        match analyzer.plan(mode, &request) {
            Ok(modules) => {
                let names: Vec<&str> = modules.iter().map(|m| module_name(*m)).collect();
                println!("  {} {}: {}", "✓".green().bold(), mode.as_str(), names.join(", "));
            }
            Err(AnalysisError::NoUsableProvider { reason, .. }) => {
                println!("  {} {}: nothing can run ({})", "✗".red().bold(), mode.as_str(), reason);
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!();

    println!("{}", "CACHE".bright_blue().bold());
    println!("  Directory: {}", cache_dir.display().to_string().bright_white());
    if Database::exists(&database_path) {
        let database = Database::new(&database_path)
            .with_context(|| format!("Failed to open {}", database_path.display()))?;
        let total: i64 = database.cache_counts()?.iter().map(|(_, n)| n).sum();
        println!("  Entries:   {}", total.to_string().cyan());
    } else {
        println!("  Entries:   {}", "none (database not created yet)".bright_black());
    }

    Ok(())
}

pub fn handle_cache_clear(args: &ArgMatches) -> Result<()> {
    let config = build_config(args);
    let database = open_database(&config)?;
    let expired_only = args.get_flag("expired");

    let removed = if expired_only {
        database.purge_expired(current_timestamp())?
    } else {
        database.clear_cache()?
    };

    println!(
        "{} Removed {} {}cache entries from {}",
        "✓".green().bold(),
        removed.to_string().cyan(),
        if expired_only { "expired " } else { "" },
        config.database_path().display().to_string().bright_white()
    );
    Ok(())
}

pub fn handle_cache_stats(args: &ArgMatches) -> Result<()> {
    let config = build_config(args);
    let database = open_database(&config)?;
    let counts = database.cache_counts()?;

    if counts.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }
    for (kind, count) in counts {
        println!("  {:<12} {}", kind, count.to_string().cyan());
    }
    Ok(())
}
