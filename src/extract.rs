//! Full-text content extraction.
//!
//! Extraction failures are routine (anti-bot defenses, paywalls, malformed
//! markup) and never abort the pipeline; callers always fall back to the
//! feed-provided excerpt.

use readability::extractor;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::types::ExtractionStatus;
use crate::TARGET_WEB_REQUEST;

/// Text below this floor is treated as a failed extraction.
pub const MIN_CONTENT_CHARS: usize = 50;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one extraction attempt. `status == Failed` means the caller
/// should use its fallback content; it is never an error.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub status: ExtractionStatus,
    pub text: String,
    pub title: Option<String>,
    pub byline: Option<String>,
    pub length: usize,
}

impl Extraction {
    pub fn failed() -> Extraction {
        Extraction {
            status: ExtractionStatus::Failed,
            text: String::new(),
            title: None,
            byline: None,
            length: 0,
        }
    }
}

/// The pipeline depends only on this contract, so the concrete rendering
/// technology stays swappable.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, url: &str) -> impl std::future::Future<Output = Extraction> + Send;
}

/// Readability-based extractor: render the page, strip boilerplate, keep the
/// primary article body.
#[derive(Debug, Clone, Default)]
pub struct ReadabilityExtractor;

impl ContentExtractor for ReadabilityExtractor {
    async fn extract(&self, url: &str) -> Extraction {
        let target = url.to_string();
        debug!(target: TARGET_WEB_REQUEST, "Extracting URL: {}", target);

        let scrape = tokio::task::spawn_blocking(move || extractor::scrape(&target));

        match timeout(EXTRACTION_TIMEOUT, scrape).await {
            Ok(Ok(Ok(product))) => {
                let text = product.text.trim().to_string();
                if text.chars().count() < MIN_CONTENT_CHARS {
                    warn!(target: TARGET_WEB_REQUEST, "Extracted only {} chars from {}, treating as failed.", text.chars().count(), url);
                    return Extraction::failed();
                }
                let length = text.chars().count();
                let title = if product.title.trim().is_empty() {
                    None
                } else {
                    Some(product.title.trim().to_string())
                };
                debug!(target: TARGET_WEB_REQUEST, "Successfully extracted {} chars from {}.", length, url);
                Extraction {
                    status: ExtractionStatus::Success,
                    text,
                    title,
                    byline: None,
                    length,
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(target: TARGET_WEB_REQUEST, "Error extracting {}: {:#?}.", url, e);
                Extraction::failed()
            }
            Ok(Err(join_err)) => {
                warn!(target: TARGET_WEB_REQUEST, "Extraction task failed for {}: {}.", url, join_err);
                Extraction::failed()
            }
            Err(_) => {
                warn!(target: TARGET_WEB_REQUEST, "Extraction timed out for {}.", url);
                Extraction::failed()
            }
        }
    }
}
