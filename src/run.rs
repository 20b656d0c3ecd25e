//! Batch runner: drives configured sources through the pipeline.
//!
//! Articles within one source are processed sequentially; model calls and
//! extraction are the only suspension points and both carry hard timeouts.
//! Cancellation is honored between articles, never mid-article, which is
//! safe because processing is idempotent under the dedup check.

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::SiftError;
use crate::extract::ContentExtractor;
use crate::feeds::{fetch_feed, FeedItem};
use crate::llm::ModelInvoker;
use crate::pipeline::{process_item, PipelineOutcome};
use crate::router::{decide_route, ScoringRoute};
use crate::types::{Article, ContentSource, ExtractionStatus, Relevance};
use crate::TARGET_DB;

/// Items published this long ago are recorded as filtered without model
/// calls, so backfilled feeds don't burn spend.
const MAX_ARTICLE_AGE_DAYS: i64 = 30;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub deduped: usize,
    pub failed_feeds: usize,
}

impl RunSummary {
    /// True when the run had nothing new to do.
    pub fn is_noop(&self) -> bool {
        self.processed == 0 && self.skipped == 0
    }
}

/// Processes every configured source once. Per-article and per-feed
/// failures are contained; only run-level failures (configuration, storage
/// unreachable) surface as errors.
pub async fn run_sources<M, E>(
    config: &Config,
    db: &Database,
    gateway: &M,
    extractor: &E,
    cancel_rx: &watch::Receiver<bool>,
) -> Result<RunSummary, SiftError>
where
    M: ModelInvoker,
    E: ContentExtractor,
{
    // One routing decision per batch; profile presence is not re-checked
    // per article.
    let route = decide_route(db).await?;
    let mut summary = RunSummary::default();

    for feed_url in &config.feed_urls {
        if *cancel_rx.borrow() {
            info!("Cancellation received, stopping before feed {}.", feed_url);
            break;
        }

        let items = match fetch_feed(feed_url).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to fetch feed {}: {}", feed_url, e);
                summary.failed_feeds += 1;
                continue;
            }
        };

        info!("Processing {} items from {}.", items.len(), feed_url);
        process_batch(
            items,
            &route,
            &config.topic,
            db,
            gateway,
            extractor,
            cancel_rx,
            &mut summary,
        )
        .await;
    }

    info!(
        "Run finished: {} processed, {} skipped, {} already seen, {} feeds failed.",
        summary.processed, summary.skipped, summary.deduped, summary.failed_feeds
    );
    Ok(summary)
}

async fn process_batch<M, E>(
    items: Vec<FeedItem>,
    route: &ScoringRoute,
    topic: &str,
    db: &Database,
    gateway: &M,
    extractor: &E,
    cancel_rx: &watch::Receiver<bool>,
    summary: &mut RunSummary,
) where
    M: ModelInvoker,
    E: ContentExtractor,
{
    for item in items {
        // Checkpoint at article boundaries only.
        if *cancel_rx.borrow() {
            info!("Cancellation received, stopping article processing.");
            return;
        }

        let id = match Article::id_for_url(&item.url) {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping item with invalid URL {}: {}", item.url, e);
                summary.skipped += 1;
                continue;
            }
        };

        // Idempotent ingestion: an already-seen identifier is a no-op.
        match db.has_article(&id).await {
            Ok(true) => {
                debug!(target: TARGET_DB, "Already seen, skipping: {}", item.url);
                summary.deduped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                error!(target: TARGET_DB, "Storage lookup failed for {}: {}", item.url, e);
                summary.skipped += 1;
                continue;
            }
        }

        if is_stale(&item) {
            debug!("Recording stale article without analysis: {}", item.url);
            if let Err(e) = db.put_article(&stale_record(id, &item)).await {
                error!(target: TARGET_DB, "Failed to store stale article {}: {}", item.url, e);
            } else {
                summary.processed += 1;
            }
            continue;
        }

        let url = item.url.clone();
        match process_item(item, route, topic, gateway, extractor).await {
            PipelineOutcome::Completed(article) => {
                // A write failure leaves the article unmarked; the next run
                // retries it naturally through the dedup check.
                match db.put_article(&article).await {
                    Ok(()) => summary.processed += 1,
                    Err(e) => {
                        error!(target: TARGET_DB, "Failed to store article {}: {}", url, e);
                        summary.skipped += 1;
                    }
                }
            }
            PipelineOutcome::Skipped {
                url,
                reason,
                issues,
            } => {
                warn!(
                    "Article skipped: {} ({}){}",
                    url,
                    reason,
                    if issues.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", issues.join("; "))
                    }
                );
                summary.skipped += 1;
            }
        }
    }
}

fn is_stale(item: &FeedItem) -> bool {
    item.published_at
        .map(|published| Utc::now().signed_duration_since(published) > ChronoDuration::days(MAX_ARTICLE_AGE_DAYS))
        .unwrap_or(false)
}

fn stale_record(id: String, item: &FeedItem) -> Article {
    let now = Utc::now();
    Article {
        id,
        url: item.url.clone(),
        title: item.title.clone(),
        author: item.author.clone(),
        excerpt: item.excerpt.clone(),
        extracted_text: None,
        content_source: ContentSource::Excerpt,
        extraction_status: ExtractionStatus::Pending,
        content_length: item.excerpt.chars().count(),
        published_at: item.published_at,
        fetched_at: now,
        ai_summary: None,
        ai_score: None,
        ai_category: None,
        relevance: Relevance::Unrated,
        rated_at: None,
        topic_filtered: true,
        topic_filtered_at: Some(now),
    }
}
