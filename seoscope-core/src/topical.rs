// Topical coverage: niche subtopics the site and its competitors cover

use crate::cache::FetchCache;
use crate::config::Thresholds;
use crate::model::ModuleReport;
use crate::providers::{
    Dimension, PerformanceProvider, PerformanceQuery, SearchDepth, SearchProvider, SearchRequest,
    cached_query, cached_search,
};
use crate::windows::recent_window;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const SUBTOPIC_KEY_CHARS: usize = 40;
const MIN_SUBTOPIC_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Absent,
    Weak,
    Strong,
    /// The coverage check itself failed.
    Unknown,
}

impl Coverage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Coverage::Absent => "absent",
            Coverage::Weak => "weak",
            Coverage::Strong => "strong",
            Coverage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicPriority {
    FirstToCover,
    Urgent,
    Improve,
    Maintain,
}

impl TopicPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicPriority::FirstToCover => "first to cover",
            TopicPriority::Urgent => "urgent",
            TopicPriority::Improve => "improve",
            TopicPriority::Maintain => "maintain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorCoverage {
    pub competitor: String,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicalEntry {
    pub subtopic: String,
    pub own: Coverage,
    pub competitors: Vec<CompetitorCoverage>,
    pub priority: TopicPriority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicalMap {
    pub niche: String,
    pub entries: Vec<TopicalEntry>,
}

pub fn exploratory_queries(niche: &str) -> [String; 3] {
    [
        format!("{} complete guide topics", niche),
        format!("what to know about {}", niche),
        format!("{} frequently asked questions", niche),
    ]
}

/// Text of a Markdown heading line of level 1 to 3, if the line is one.
fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim();
    (!text.is_empty()).then_some(text)
}

/// Headings found in result snippets, deduplicated on a lower-cased prefix.
pub fn extract_subtopics<'a>(contents: impl IntoIterator<Item = &'a str>, cap: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut subtopics = Vec::new();

    for content in contents {
        for line in content.lines() {
            let Some(text) = heading_text(line) else {
                continue;
            };
            if text.chars().count() <= MIN_SUBTOPIC_CHARS {
                continue;
            }
            let key: String = text.to_lowercase().chars().take(SUBTOPIC_KEY_CHARS).collect();
            if subtopics.len() < cap && seen.insert(key) {
                subtopics.push(text.to_string());
            }
        }
    }

    subtopics
}

/// Strong when a query shares two words with the subtopic, weak when a
/// long subtopic word appears inside a query.
pub fn own_coverage(subtopic: &str, queries: &[String]) -> Coverage {
    let lower = subtopic.to_lowercase();
    let words: HashSet<&str> = lower.split_whitespace().collect();

    let strong = queries.iter().any(|query| {
        let query_words: HashSet<&str> = query.split_whitespace().collect();
        words.intersection(&query_words).count() >= 2
    });
    if strong {
        return Coverage::Strong;
    }

    let weak = queries.iter().any(|query| {
        words
            .iter()
            .any(|word| word.chars().count() > 4 && query.contains(word))
    });
    if weak { Coverage::Weak } else { Coverage::Absent }
}

pub fn topic_priority(own: Coverage, competitors: &[Coverage]) -> TopicPriority {
    match own {
        Coverage::Strong => TopicPriority::Maintain,
        Coverage::Weak => TopicPriority::Improve,
        Coverage::Absent | Coverage::Unknown => {
            if competitors.iter().any(|c| *c == Coverage::Strong) {
                TopicPriority::Urgent
            } else {
                TopicPriority::FirstToCover
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn map_topical_coverage(
    search: &dyn SearchProvider,
    performance: &dyn PerformanceProvider,
    cache: &FetchCache,
    site: &str,
    niche: &str,
    competitors: &[String],
    today: NaiveDate,
    thresholds: &Thresholds,
) -> ModuleReport<TopicalMap> {
    if !search.is_configured() {
        return ModuleReport::skipped(format!(
            "topical map needs a search provider ({} unavailable)",
            search.name()
        ));
    }

    let mut snippets: Vec<String> = Vec::new();
    let mut failures = 0;
    for query in exploratory_queries(niche) {
        let request = SearchRequest::new(query, 5, SearchDepth::Advanced);
        match cached_search(search, cache, niche, &request).await {
            Ok(response) => snippets.extend(response.results.into_iter().map(|r| r.content)),
            Err(e) if e.is_malformed() => {
                debug!("Exploratory search '{}' returned no usable data: {}", request.query, e);
            }
            Err(e) => {
                warn!("Exploratory search '{}' failed: {}", request.query, e);
                failures += 1;
            }
        }
    }
    if failures == 3 {
        return ModuleReport::error("every exploratory search failed");
    }

    let subtopics = extract_subtopics(snippets.iter().map(String::as_str), thresholds.subtopic_cap);
    debug!("Found {} subtopics for '{}'", subtopics.len(), niche);

    let window = recent_window(today, 90);
    let query = PerformanceQuery {
        site: site.to_string(),
        start_date: window.start,
        end_date: window.end,
        dimensions: vec![Dimension::Query],
        row_limit: thresholds.topical_row_limit,
    };
    let (own_queries, degraded) = match cached_query(performance, cache, &query).await {
        Ok(rows) => (
            rows.iter()
                .filter_map(|row| row.key(0).map(str::to_lowercase))
                .collect::<Vec<_>>(),
            None,
        ),
        Err(e) => {
            warn!("Own coverage for {} unavailable: {}", site, e);
            (Vec::new(), Some(e.to_string()))
        }
    };

    let rivals: Vec<&String> = competitors.iter().take(thresholds.competitor_cap).collect();
    let mut entries = Vec::with_capacity(subtopics.len());
    for subtopic in subtopics {
        let own = own_coverage(&subtopic, &own_queries);

        let mut coverage = Vec::with_capacity(rivals.len());
        for competitor in &rivals {
            let request = SearchRequest::new(
                format!("site:{} {}", competitor, subtopic),
                3,
                SearchDepth::Basic,
            );
            let found = match cached_search(search, cache, competitor, &request).await {
                Ok(response) if !response.results.is_empty() => Coverage::Strong,
                Ok(_) => Coverage::Absent,
                Err(e) => {
                    debug!("  -> coverage check for {} failed: {}", competitor, e);
                    Coverage::Unknown
                }
            };
            coverage.push(CompetitorCoverage {
                competitor: competitor.to_string(),
                coverage: found,
            });
        }

        let levels: Vec<Coverage> = coverage.iter().map(|c| c.coverage).collect();
        entries.push(TopicalEntry {
            priority: topic_priority(own, &levels),
            subtopic,
            own,
            competitors: coverage,
        });
    }

    info!("Topical map for '{}': {} subtopics", niche, entries.len());
    let map = TopicalMap {
        niche: niche.to_string(),
        entries,
    };
    match degraded {
        None => ModuleReport::ok(map),
        Some(reason) => ModuleReport::partial(
            map,
            format!("own coverage unknown, treated as absent: {}", reason),
        ),
    }
}
