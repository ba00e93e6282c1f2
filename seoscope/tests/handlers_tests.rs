use seoscope::commands::command_argument_builder;
use seoscope::extract_url_path;
use seoscope::handlers::*;
use seoscope_core::ReportFormat;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_log_filter_levels() {
    assert_eq!(log_filter(0), "warn");
    assert_eq!(log_filter(1), "info");
    assert_eq!(log_filter(2), "debug");
    assert_eq!(log_filter(5), "debug");
}

#[test]
fn test_parse_site_accepts_domains_and_urls() {
    assert_eq!(parse_site("example.com").unwrap(), "example.com");
    assert_eq!(parse_site(" example.com/ ").unwrap(), "example.com");
    assert_eq!(
        parse_site("https://example.com/blog/").unwrap(),
        "https://example.com/blog"
    );
}

#[test]
fn test_parse_site_rejects_garbage() {
    assert!(parse_site("").is_err());
    assert!(parse_site("   ").is_err());
    assert!(parse_site("not a valid site!!!").is_err());
}

#[test]
fn test_parse_competitors_flattens_and_dedupes() {
    let values = vec![
        "rival.com, other.com".to_string(),
        "Rival.com/".to_string(),
        " ,third.com".to_string(),
    ];
    assert_eq!(
        parse_competitors(&values),
        vec!["rival.com", "other.com", "third.com"]
    );
    assert!(parse_competitors(&Vec::<String>::new()).is_empty());
}

#[test]
fn test_resolve_format() {
    // Explicit flag wins.
    assert_eq!(
        resolve_format(Some("json"), true, Some(Path::new("report.md"))),
        ReportFormat::Json
    );
    // Otherwise the output extension decides.
    assert_eq!(
        resolve_format(Some("markdown"), false, Some(Path::new("report.json"))),
        ReportFormat::Json
    );
    assert_eq!(
        resolve_format(Some("markdown"), false, Some(Path::new("report.txt"))),
        ReportFormat::Markdown
    );
    assert_eq!(resolve_format(None, false, None), ReportFormat::Markdown);
}

#[test]
fn test_build_config_from_analyze_args() {
    let matches = command_argument_builder()
        .try_get_matches_from([
            "seoscope",
            "--cache-dir",
            "/tmp/seoscope-test",
            "analyze",
            "example.com",
            "--max-pages",
            "25",
            "--timeout",
            "3",
            "--respect-robots",
            "--refresh",
            "--gsc-token",
            "token",
            "-q",
        ])
        .unwrap();
    let (name, args) = matches.subcommand().unwrap();
    assert_eq!(name, "analyze");

    let config = build_config(args);
    assert_eq!(config.cache_dir, Path::new("/tmp/seoscope-test"));
    assert_eq!(config.max_pages, 25);
    assert_eq!(config.site_timeout_secs, 3);
    assert!(config.respect_robots);
    assert!(config.refresh);
    assert!(!config.show_progress);
    assert_eq!(config.keys.gsc(), Some("token"));
}

#[test]
fn test_build_config_tolerates_missing_args() {
    // `cache clear` defines none of the site or provider arguments.
    let matches = command_argument_builder()
        .try_get_matches_from(["seoscope", "cache", "clear", "--expired"])
        .unwrap();
    let (_, cache) = matches.subcommand().unwrap();
    let (_, clear) = cache.subcommand().unwrap();

    let config = build_config(clear);
    assert_eq!(config.max_pages, 60);
    assert!(!config.respect_robots);
    assert!(config.show_progress);
}

#[test]
fn test_analyze_rejects_unknown_mode() {
    let result = command_argument_builder().try_get_matches_from([
        "seoscope", "analyze", "example.com", "--mode", "everything",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_competitor_flag_repeats() {
    let matches = command_argument_builder()
        .try_get_matches_from([
            "seoscope", "analyze", "example.com", "-c", "a.com", "-c", "b.com,c.com",
        ])
        .unwrap();
    let (_, args) = matches.subcommand().unwrap();
    let competitors = parse_competitors(args.get_many::<String>("competitor").unwrap());
    assert_eq!(competitors, vec!["a.com", "b.com", "c.com"]);
}

#[test]
fn test_open_database_creates_cache_dir() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("nested").join("cache");

    let matches = command_argument_builder()
        .try_get_matches_from([
            "seoscope",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
            "cache",
            "stats",
        ])
        .unwrap();
    let (_, cache) = matches.subcommand().unwrap();
    let (_, stats) = cache.subcommand().unwrap();

    let config = build_config(stats);
    let database = open_database(&config).unwrap();
    assert!(config.database_path().exists());
    assert!(database.cache_counts().unwrap().is_empty());
}

#[test]
fn test_extract_url_path() {
    assert_eq!(
        extract_url_path("https://example.com/blog/post"),
        "/blog/post"
    );
    assert_eq!(extract_url_path("https://example.com/"), "/");
    assert_eq!(extract_url_path("https://example.com"), "/");
}
