// Visible-text extraction for word counting

use crate::error::Result;
use reqwest::Client;
use scraper::{Html, Node};
use tracing::debug;

/// Subtrees whose text never counts as page content.
pub const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header"];

/// Only this many bytes of a body are parsed when sampling.
pub const MAX_SAMPLE_BYTES: usize = 100_000;

/// Concatenates the visible text of an HTML document, one space between
/// text nodes, ignoring everything inside [`SKIPPED_TAGS`].
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

pub fn word_count(html: &str) -> usize {
    extract_visible_text(html).split_whitespace().count()
}

/// Cuts a body down to [`MAX_SAMPLE_BYTES`] without splitting a character.
pub fn truncate_body(body: &str) -> &str {
    if body.len() <= MAX_SAMPLE_BYTES {
        return body;
    }
    let mut end = MAX_SAMPLE_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Fetches a page and counts its visible words.
///
/// Returns `Ok(None)` when the server answers with anything but 200.
pub async fn fetch_word_count(client: &Client, url: &str) -> Result<Option<usize>> {
    debug!("Sampling text of {}", url);
    let response = client.get(url).send().await?;
    if response.status().as_u16() != 200 {
        debug!("Skipping {} (status {})", url, response.status());
        return Ok(None);
    }
    let body = response.text().await?;
    Ok(Some(word_count(truncate_body(&body))))
}
