//! Feed source contract: fetch a syndicated feed and reduce it to raw items
//! the pipeline can ingest.

use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::io;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use crate::error::SiftError;
use crate::TARGET_WEB_REQUEST;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_RETRIES: usize = 3;

/// One raw feed item. Guaranteed to have a link and at least some textual
/// content; anything without both is filtered during parsing.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub excerpt: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetches and parses one feed, retrying transient failures. A feed that
/// stays unreachable surfaces `TransientIO`; the caller logs and moves to
/// the next source.
pub async fn fetch_feed(feed_url: &str) -> Result<Vec<FeedItem>, SiftError> {
    let mut last_error = String::new();

    for attempt in 1..=MAX_RETRIES {
        debug!(target: TARGET_WEB_REQUEST, "Loading feed from {} (attempt {}/{})", feed_url, attempt, MAX_RETRIES);

        match timeout(REQUEST_TIMEOUT, reqwest::get(feed_url)).await {
            Ok(Ok(response)) if response.status().is_success() => {
                match response.text().await {
                    Ok(body) => {
                        let reader = io::Cursor::new(body);
                        match parser::parse(reader) {
                            Ok(feed) => {
                                let items = items_from_feed(feed);
                                debug!(target: TARGET_WEB_REQUEST, "Parsed {} usable items from {}", items.len(), feed_url);
                                return Ok(items);
                            }
                            Err(err) => {
                                // Malformed markup will not fix itself on retry.
                                warn!(target: TARGET_WEB_REQUEST, "Failed to parse feed from {}: {}", feed_url, err);
                                return Err(SiftError::TransientIO(format!(
                                    "unparseable feed {}: {}",
                                    feed_url, err
                                )));
                            }
                        }
                    }
                    Err(err) => last_error = format!("failed to read body: {}", err),
                }
            }
            Ok(Ok(response)) => {
                last_error = format!("status {}", response.status());
                warn!(target: TARGET_WEB_REQUEST, "Non-success status {} from {}", response.status(), feed_url);
            }
            Ok(Err(err)) => {
                last_error = err.to_string();
                warn!(target: TARGET_WEB_REQUEST, "Request to {} failed: {}", feed_url, err);
            }
            Err(_) => {
                last_error = format!("timed out after {:?}", REQUEST_TIMEOUT);
                warn!(target: TARGET_WEB_REQUEST, "Request to {} timed out", feed_url);
            }
        }

        if attempt < MAX_RETRIES {
            sleep(RETRY_DELAY).await;
        }
    }

    Err(SiftError::TransientIO(format!(
        "feed {} unreachable: {}",
        feed_url, last_error
    )))
}

fn items_from_feed(feed: feed_rs::model::Feed) -> Vec<FeedItem> {
    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.links.first().map(|link| link.href.clone())?;
            if url.trim().is_empty() {
                return None;
            }

            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default();
            let excerpt = entry
                .summary
                .map(|s| s.content.trim().to_string())
                .unwrap_or_default();

            // An item with a link but no text at all gives the pipeline
            // nothing to work with.
            if title.is_empty() && excerpt.is_empty() {
                return None;
            }

            let author = entry
                .authors
                .first()
                .map(|a| a.name.trim().to_string())
                .filter(|name| !name.is_empty());

            Some(FeedItem {
                url,
                title,
                author,
                excerpt,
                published_at: entry.published,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <item>
    <title>Story with everything</title>
    <link>https://example.com/full</link>
    <description>An excerpt.</description>
    <author>writer@example.com (Jane Doe)</author>
  </item>
  <item>
    <title>Story without a link</title>
    <description>Orphaned text.</description>
  </item>
  <item>
    <link>https://example.com/bare-link</link>
  </item>
  <item>
    <title>Title only</title>
    <link>https://example.com/title-only</link>
  </item>
</channel></rss>"#;

    #[test]
    fn unusable_items_are_filtered() {
        let feed = parser::parse(io::Cursor::new(SAMPLE_RSS)).unwrap();
        let items = items_from_feed(feed);

        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/full", "https://example.com/title-only"]
        );
    }

    #[test]
    fn item_fields_are_populated() {
        let feed = parser::parse(io::Cursor::new(SAMPLE_RSS)).unwrap();
        let items = items_from_feed(feed);

        let full = &items[0];
        assert_eq!(full.title, "Story with everything");
        assert_eq!(full.excerpt, "An excerpt.");
        assert!(full.author.is_some());
    }
}
