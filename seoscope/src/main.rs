use colored::Colorize;
use seoscope::commands::command_argument_builder;
use seoscope::handlers::{
    handle_analyze, handle_cache_clear, handle_cache_stats, handle_check, handle_crawl,
    init_logging,
};

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    init_logging(chosen_command.get_count("verbose"));

    let result = match chosen_command.subcommand() {
        Some(("analyze", primary_command)) => handle_analyze(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("check", primary_command)) => handle_check(primary_command),
        Some(("cache", primary_command)) => match primary_command.subcommand() {
            Some(("clear", secondary_command)) => handle_cache_clear(secondary_command),
            Some(("stats", secondary_command)) => handle_cache_stats(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
