// Report rendering from a finished run

use crate::model::{Issue, ModuleReport};
use crate::run::RunContext;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

pub fn render_report(ctx: &RunContext, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Markdown => Ok(generate_markdown_report(ctx)),
        ReportFormat::Json => generate_json_report(ctx),
    }
}

/// Row for a module's status in the summary table.
fn status_row<T>(out: &mut String, name: &str, report: Option<&ModuleReport<T>>) {
    let Some(report) = report else {
        return;
    };
    let detail = report.status.detail().unwrap_or("");
    let _ = writeln!(out, "| {} | {} | {} |", name, report.status.label(), cell(detail));
}

/// Writes a heading and returns the data when the module produced any.
/// Otherwise an honest "not available" line stands in for the section body.
fn section<'a, T: Default>(out: &mut String, title: &str, report: Option<&'a ModuleReport<T>>) -> Option<&'a T> {
    let report = report?;
    let _ = writeln!(out, "## {}\n", title);
    if !report.has_data() {
        let reason = report.status.detail().unwrap_or("no data");
        let _ = writeln!(out, "_Not available ({}): {}_\n", report.status.label(), reason);
        return None;
    }
    if let Some(reason) = report.status.detail() {
        let _ = writeln!(out, "_Partial: {}_\n", reason);
    }
    Some(&report.data)
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn issues_table(out: &mut String, issues: &[Issue]) {
    if issues.is_empty() {
        out.push_str("No issues found.\n\n");
        return;
    }
    out.push_str("| Severity | Issue | Action |\n|---|---|---|\n");
    for issue in issues {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            issue.severity,
            cell(&issue.message),
            cell(&issue.action)
        );
    }
    out.push('\n');
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Markdown document with a fixed section order. Modules outside the run's
/// mode are left out; modules that ran without data get a "not available" line.
pub fn generate_markdown_report(ctx: &RunContext) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# SEO Report: {}\n", ctx.site);
    let _ = writeln!(out, "- **Date:** {}", ctx.date);
    let _ = writeln!(out, "- **Mode:** {}", ctx.mode.as_str());
    let _ = writeln!(out, "- **Root URL:** {}", ctx.root_url);
    if let Some(ref niche) = ctx.niche {
        let _ = writeln!(out, "- **Niche:** {}", niche);
    }
    if !ctx.competitors.is_empty() {
        let _ = writeln!(out, "- **Competitors:** {}", ctx.competitors.join(", "));
    }
    let _ = writeln!(
        out,
        "- **Integrations:** search {}, performance {}, page speed {}\n",
        yes_no(ctx.integrations.search),
        yes_no(ctx.integrations.performance),
        yes_no(ctx.integrations.pagespeed)
    );

    out.push_str("## Summary\n\n| Module | Status | Detail |\n|---|---|---|\n");
    status_row(&mut out, "Content health", ctx.health.as_ref());
    status_row(&mut out, "Content decay", ctx.decay.as_ref());
    status_row(&mut out, "Position changes", ctx.position_changes.as_ref());
    status_row(&mut out, "Cannibalization", ctx.cannibalization.as_ref());
    status_row(&mut out, "Thin content", ctx.thin_content.as_ref());
    status_row(&mut out, "Topical map", ctx.topical.as_ref());
    status_row(&mut out, "Site architecture", ctx.architecture.as_ref());
    status_row(&mut out, "robots.txt", ctx.robots.as_ref());
    status_row(&mut out, "Page speed", ctx.pagespeed.as_ref());
    out.push('\n');

    if let Some(health) = section(&mut out, "Content Health Score", ctx.health.as_ref()) {
        let _ = writeln!(out, "**{}/100** ({})\n", health.score, health.label());
        let _ = writeln!(
            out,
            "| Penalty | Points |\n|---|---|\n| Decay | -{} |\n| Cannibalization | -{} |\n| Thin content | -{} |\n",
            health.decay_penalty, health.cannibalization_penalty, health.thin_penalty
        );
        if let Some(ref previous) = ctx.previous_baseline {
            let delta = i16::from(health.score) - i16::from(previous.health_score);
            let _ = writeln!(
                out,
                "Previous baseline ({}): {}/100, change {:+}\n",
                previous.date, previous.health_score, delta
            );
        }
        if ctx.baseline_saved {
            out.push_str("Baseline snapshot saved.\n\n");
        }
    }

    if let Some(decay) = section(&mut out, "Content Decay", ctx.decay.as_ref()) {
        if decay.pages.is_empty() {
            out.push_str("No decaying pages.\n\n");
        } else {
            let _ = writeln!(out, "{} decaying pages, showing {}.\n", decay.total, decay.pages.len());
            out.push_str("| Priority | Page | Clicks (oldest → newest) | Drop | Likely cause |\n|---|---|---|---|---|\n");
            for page in &decay.pages {
                let _ = writeln!(
                    out,
                    "| {} | {} | {:.0} → {:.0} → {:.0} | {:.1}% | {} |",
                    page.priority,
                    cell(&page.url),
                    page.clicks_oldest,
                    page.clicks_middle,
                    page.clicks_newest,
                    page.drop_pct,
                    page.cause
                );
            }
            out.push_str("\nRefresh decaying pages with current data and re-promote them internally.\n\n");
        }
    }

    if let Some(changes) = section(&mut out, "Position Changes", ctx.position_changes.as_ref()) {
        if changes.drops.is_empty() && changes.gains.is_empty() && changes.new_queries.is_empty() {
            out.push_str("No significant position changes.\n\n");
        }
        if !changes.drops.is_empty() {
            out.push_str("### Drops\n\n| Query | Previous | Current | Delta | Impressions | Est. clicks lost |\n|---|---|---|---|---|---|\n");
            for change in &changes.drops {
                let _ = writeln!(
                    out,
                    "| {} | {:.1} | {:.1} | {:+.1} | {:.0} | {:.0} |",
                    cell(&change.query),
                    change.previous_position.unwrap_or_default(),
                    change.current_position,
                    change.delta,
                    change.impressions,
                    change.clicks_lost_est
                );
            }
            out.push('\n');
        }
        if !changes.gains.is_empty() {
            out.push_str("### Gains\n\n| Query | Previous | Current | Delta | Impressions |\n|---|---|---|---|---|\n");
            for change in &changes.gains {
                let _ = writeln!(
                    out,
                    "| {} | {:.1} | {:.1} | {:+.1} | {:.0} |",
                    cell(&change.query),
                    change.previous_position.unwrap_or_default(),
                    change.current_position,
                    change.delta,
                    change.impressions
                );
            }
            out.push('\n');
        }
        if !changes.new_queries.is_empty() {
            out.push_str("### New queries\n\n| Query | Position | Impressions |\n|---|---|---|\n");
            for change in &changes.new_queries {
                let _ = writeln!(
                    out,
                    "| {} | {:.1} | {:.0} |",
                    cell(&change.query),
                    change.current_position,
                    change.impressions
                );
            }
            out.push('\n');
        }
    }

    if let Some(cannibal) = section(&mut out, "Keyword Cannibalization", ctx.cannibalization.as_ref()) {
        if cannibal.groups.is_empty() {
            out.push_str("No queries split across several pages.\n\n");
        } else {
            let _ = writeln!(out, "{} cannibalized queries, showing {}.\n", cannibal.total, cannibal.groups.len());
            for group in &cannibal.groups {
                let _ = writeln!(out, "### \"{}\" ({:.0} clicks)\n", group.query, group.total_clicks);
                out.push_str("| Page | Position | Clicks | Impressions |\n|---|---|---|---|\n");
                for page in &group.pages {
                    let _ = writeln!(
                        out,
                        "| {} | {:.1} | {:.0} | {:.0} |",
                        cell(&page.url),
                        page.position,
                        page.clicks,
                        page.impressions
                    );
                }
                let _ = writeln!(out, "\nAction: {}\n", group.action);
            }
        }
    }

    if let Some(thin) = section(&mut out, "Thin Content", ctx.thin_content.as_ref()) {
        let _ = writeln!(
            out,
            "Sampled {} of {} candidate pages{}.\n",
            thin.budget.sampled,
            thin.budget.candidates,
            if thin.budget.budget_exhausted { " (sampling budget reached)" } else { "" }
        );
        if thin.unreadable > 0 {
            let _ = writeln!(out, "{} sampled pages could not be read.\n", thin.unreadable);
        }
        if thin.pages.is_empty() {
            out.push_str("No thin pages.\n\n");
        } else {
            out.push_str("| Severity | Page | Words | Impressions | Action |\n|---|---|---|---|---|\n");
            for page in &thin.pages {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {:.0} | {} |",
                    page.severity,
                    cell(&page.url),
                    page.word_count,
                    page.impressions,
                    cell(&page.action)
                );
            }
            out.push('\n');
        }
    }

    if let Some(topical) = section(&mut out, "Topical Map", ctx.topical.as_ref()) {
        if topical.entries.is_empty() {
            let _ = writeln!(out, "No subtopics discovered for \"{}\".\n", topical.niche);
        } else {
            let competitors: Vec<&str> = topical
                .entries
                .first()
                .map(|e| e.competitors.iter().map(|c| c.competitor.as_str()).collect())
                .unwrap_or_default();

            out.push_str("| Subtopic | You |");
            for competitor in &competitors {
                let _ = write!(out, " {} |", cell(competitor));
            }
            out.push_str(" Priority |\n|---|---|");
            for _ in &competitors {
                out.push_str("---|");
            }
            out.push_str("---|\n");

            for entry in &topical.entries {
                let _ = write!(out, "| {} | {} |", cell(&entry.subtopic), entry.own.as_str());
                for competitor in &entry.competitors {
                    let _ = write!(out, " {} |", competitor.coverage.as_str());
                }
                let _ = writeln!(out, " {} |", entry.priority.as_str());
            }
            out.push('\n');
        }
    }

    if let Some(arch) = section(&mut out, "Site Architecture", ctx.architecture.as_ref()) {
        let _ = writeln!(out, "**Score: {}/100**\n", arch.score);
        let _ = writeln!(
            out,
            "Crawled {} pages from {} ({}).\n",
            arch.pages_crawled,
            arch.root,
            match arch.termination {
                seoscope_scanner::CrawlTermination::FrontierExhausted => "all reachable pages visited",
                seoscope_scanner::CrawlTermination::BudgetReached => "page budget reached",
            }
        );

        out.push_str("| Depth | Pages |\n|---|---|\n");
        for (depth, count) in &arch.depth_histogram {
            let _ = writeln!(out, "| {} | {} |", depth, count);
        }
        let _ = writeln!(
            out,
            "\nOrphan pages: {}. Deep pages: {}. Generic anchors: {}% of {} links.\n",
            arch.orphans.len(),
            arch.deep_total,
            arch.anchors.generic_pct,
            arch.anchors.total
        );

        if !arch.deep_pages.is_empty() {
            out.push_str("### Deep pages\n\n| Page | Depth |\n|---|---|\n");
            for page in &arch.deep_pages {
                let _ = writeln!(out, "| {} | {} |", cell(&page.url), page.depth);
            }
            out.push('\n');
        }
        if !arch.top_linked.is_empty() {
            out.push_str("### Most linked pages\n\n| Page | Inbound links | Linking pages |\n|---|---|---|\n");
            for page in &arch.top_linked {
                let _ = writeln!(out, "| {} | {} | {} |", cell(&page.url), page.inbound, page.linking_pages);
            }
            out.push('\n');
        }
        issues_table(&mut out, &arch.issues);
    }

    if let Some(robots) = section(&mut out, "robots.txt", ctx.robots.as_ref()) {
        let _ = writeln!(out, "{} found: {}\n", robots.url, yes_no(robots.found));
        if !robots.disallowed.is_empty() {
            let _ = writeln!(out, "Disallowed: `{}`\n", robots.disallowed.join("`, `"));
        }
        if !robots.sitemaps.is_empty() {
            let _ = writeln!(out, "Sitemaps: {}\n", robots.sitemaps.join(", "));
        }
        issues_table(&mut out, &robots.issues);
    }

    if let Some(speed) = section(&mut out, "Page Speed", ctx.pagespeed.as_ref()) {
        for audit in [speed.mobile.as_ref(), speed.desktop.as_ref()].into_iter().flatten() {
            let _ = writeln!(out, "### {}\n", audit.strategy.as_str());
            let score = |s: Option<u8>| s.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "Performance {}, accessibility {}, best practices {}, SEO {}.\n",
                score(audit.scores.performance),
                score(audit.scores.accessibility),
                score(audit.scores.best_practices),
                score(audit.scores.seo)
            );
            if !audit.lab.is_empty() {
                out.push_str("| Metric | Value | Rating |\n|---|---|---|\n");
                for metric in &audit.lab {
                    let _ = writeln!(out, "| {} | {} | {} |", metric.key, cell(&metric.display), metric.rating.as_str());
                }
                out.push('\n');
            }
            if !audit.opportunities.is_empty() {
                out.push_str("| Opportunity | Savings |\n|---|---|\n");
                for opportunity in &audit.opportunities {
                    let _ = writeln!(
                        out,
                        "| {} | {} ms, {:.0} KB |",
                        cell(&opportunity.title),
                        opportunity.savings_ms,
                        opportunity.savings_kb
                    );
                }
                out.push('\n');
            }
        }
        issues_table(&mut out, &speed.issues);
    }

    let _ = writeln!(out, "---\n\nGenerated by SEOscope {} at {}", env!("CARGO_PKG_VERSION"), ctx.generated_at);
    out
}

pub fn generate_json_report(ctx: &RunContext) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "SEOscope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": ctx.generated_at,
                "format": "json"
            },
            "site": ctx.site,
            "root_url": ctx.root_url,
            "date": ctx.date,
            "mode": ctx.mode,
            "niche": ctx.niche,
            "competitors": ctx.competitors,
            "integrations": ctx.integrations,
            "summary": {
                "health_score": ctx.health.as_ref().filter(|h| h.has_data()).map(|h| h.data.score),
                "architecture_score": ctx.architecture.as_ref().filter(|a| a.has_data()).map(|a| a.data.score),
                "baseline_saved": ctx.baseline_saved,
                "previous_baseline": ctx.previous_baseline
            },
            "modules": {
                "health": ctx.health,
                "decay": ctx.decay,
                "position_changes": ctx.position_changes,
                "cannibalization": ctx.cannibalization,
                "thin_content": ctx.thin_content,
                "topical": ctx.topical,
                "architecture": ctx.architecture,
                "robots": ctx.robots,
                "pagespeed": ctx.pagespeed
            }
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decay::{DecayRecord, DecayReport};
    use crate::model::Severity;
    use crate::run::{IntegrationStatus, Mode};
    use crate::score::HealthScore;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn context() -> RunContext {
        let ctx = serde_json::json!({
            "site": "example.com",
            "root_url": "https://example.com",
            "mode": "content",
            "date": "2026-03-01",
            "generated_at": "2026-03-01T00:00:00+00:00",
            "integrations": IntegrationStatus::default(),
            "niche": null,
            "competitors": [],
            "decay": null,
            "position_changes": null,
            "cannibalization": null,
            "thin_content": null,
            "topical": null,
            "health": null,
            "architecture": null,
            "robots": null,
            "pagespeed": null,
            "previous_baseline": null,
            "baseline_saved": false
        });
        serde_json::from_value(ctx).unwrap()
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("pdf"), None);
    }

    #[test]
    fn test_markdown_renders_not_available_rows() {
        let mut ctx = context();
        ctx.thin_content = Some(ModuleReport::skipped("GSC_OAUTH_TOKEN not set"));
        ctx.decay = Some(ModuleReport::ok(DecayReport {
            pages: vec![DecayRecord {
                url: "https://example.com/guide".to_string(),
                clicks_oldest: 100.0,
                clicks_middle: 70.0,
                clicks_newest: 40.0,
                drop_pct: 60.0,
                cause: "strongly superseded by competitors or outdated".to_string(),
                priority: Severity::Critical,
            }],
            total: 1,
        }));
        ctx.health = Some(ModuleReport::partial(HealthScore::compute(1, 0, 0), "computed without thin content"));

        let report = generate_markdown_report(&ctx);
        assert!(report.starts_with("# SEO Report: example.com"));
        assert!(report.contains("| Thin content | skipped | GSC_OAUTH_TOKEN not set |"));
        assert!(report.contains("_Not available (skipped): GSC_OAUTH_TOKEN not set_"));
        assert!(report.contains("**96/100** (healthy)"));
        assert!(report.contains("| CRITICAL | https://example.com/guide | 100 → 70 → 40 | 60.0% |"));
        // Modules outside the mode get no section at all.
        assert!(!report.contains("## Site Architecture"));
    }

    #[test]
    fn test_markdown_section_order_is_fixed() {
        let mut ctx = context();
        ctx.mode = Mode::Full;
        ctx.health = Some(ModuleReport::skipped("no content module produced data"));
        ctx.decay = Some(ModuleReport::error("boom"));
        ctx.robots = Some(ModuleReport::ok(Default::default()));

        let report = generate_markdown_report(&ctx);
        let health = report.find("## Content Health Score").unwrap();
        let decay = report.find("## Content Decay").unwrap();
        let robots = report.find("## robots.txt").unwrap();
        assert!(health < decay && decay < robots);
    }

    #[test]
    fn test_json_report_metadata_and_modules() {
        let mut ctx = context();
        ctx.date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        ctx.health = Some(ModuleReport::ok(HealthScore::compute(0, 2, 0)));

        let json = generate_json_report(&ctx).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let report = &value["report"];
        assert_eq!(report["metadata"]["generator"], "SEOscope");
        assert_eq!(report["date"], "2026-03-02");
        assert_eq!(report["mode"], "content");
        assert_eq!(report["summary"]["health_score"], 90);
        assert_eq!(report["modules"]["health"]["status"]["state"], "ok");
        assert!(report["modules"]["decay"].is_null());
    }

    #[test]
    fn test_save_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.md");
        save_report("# hello\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");
    }
}
