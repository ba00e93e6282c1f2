use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command, value_parser};
use seoscope_core::config::DEFAULT_CACHE_DIR;
use std::path::PathBuf;

/// Credentials for the external providers. Each falls back to its
/// environment variable.
fn with_provider_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"tavily-key" <KEY>)
            .required(false)
            .help("Tavily API key for web search")
            .env("TAVILY_API_KEY")
            .hide_env_values(true),
    )
    .arg(
        arg!(--"gsc-token" <TOKEN>)
            .required(false)
            .help("OAuth token for the Search Console API")
            .env("GSC_OAUTH_TOKEN")
            .hide_env_values(true),
    )
    .arg(
        arg!(--"pagespeed-key" <KEY>)
            .required(false)
            .help("PageSpeed Insights API key")
            .env("PAGESPEED_API_KEY")
            .hide_env_values(true),
    )
}

/// Knobs that control how the target site itself is fetched.
fn with_site_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-p --"max-pages" <NUM_PAGES>)
            .required(false)
            .help("Maximum number of pages to fetch while crawling")
            .value_parser(value_parser!(usize))
            .default_value("60"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Per-request timeout for the target site")
            .value_parser(value_parser!(u64))
            .default_value("8"),
    )
    .arg(
        arg!(--"respect-robots")
            .required(false)
            .help("Skip URLs disallowed by the site's robots.txt while crawling")
            .action(ArgAction::SetTrue),
    )
    .arg(
        arg!(--"refresh")
            .required(false)
            .help("Ignore cached results and fetch everything again")
            .action(ArgAction::SetTrue),
    )
    .arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: print to stdout)")
            .value_parser(value_parser!(PathBuf)),
    )
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("seoscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("seoscope")
        .about("Content health and site architecture reports for SEO")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress progress spinners and the run summary").global(true))
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            arg!(--"cache-dir" <PATH>)
                .required(false)
                .help("Directory holding the cache database")
                .env("SEOSCOPE_CACHE_DIR")
                .default_value(DEFAULT_CACHE_DIR)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(with_provider_args(with_site_args(
            command!("analyze")
                .about("Analyze a site and render a scored report")
                .arg(arg!(<SITE>).help("Domain or URL of the site to analyze"))
                .arg(
                    arg!(-m --"mode" <MODE>)
                        .required(false)
                        .help("Which modules to run")
                        .value_parser(["full", "content", "technical"])
                        .default_value("full"),
                )
                .arg(
                    arg!(-n --"niche" <NICHE>)
                        .required(false)
                        .help("Niche or market segment, used for the topical map"),
                )
                .arg(
                    arg!(-c --"competitor" <DOMAIN>)
                        .required(false)
                        .help("Competitor domain (repeatable, or comma separated)")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: markdown, json")
                        .value_parser(["markdown", "md", "json"])
                        .default_value("markdown"),
                ),
        )))
        .subcommand(with_site_args(
            command!("crawl")
                .about("Crawl a site and list every page it links to internally")
                .arg(arg!(<URL>).help("Root URL to start from")),
        ))
        .subcommand(with_provider_args(
            command!("check")
                .about("Show which integrations are configured and what each mode would run")
                .arg(
                    arg!(-n --"niche" <NICHE>)
                        .required(false)
                        .help("Assume this niche when planning the topical map"),
                ),
        ))
        .subcommand(
            command!("cache")
                .about("Manage the local cache")
                .subcommand_required(true)
                .subcommand(
                    command!("clear").about("Delete cached provider and crawl results").arg(
                        arg!(--"expired")
                            .required(false)
                            .help("Only delete entries older than their time-to-live")
                            .action(ArgAction::SetTrue),
                    ),
                )
                .subcommand(command!("stats").about("Count cached entries by kind")),
        )
}
