//! Per-article analysis pipeline:
//! `Preprocess → Extract → TopicFilter → {Skip | Score} → QualityCheck →
//! {Retry → Score | Done}`.
//!
//! Every failure here is contained to the article being processed; the
//! batch always continues.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::SiftError;
use crate::extract::{ContentExtractor, MIN_CONTENT_CHARS};
use crate::feeds::FeedItem;
use crate::llm::{ModelInvoker, ModelTier};
use crate::prompt;
use crate::retry::attempt_with_feedback;
use crate::router::ScoringRoute;
use crate::types::{Article, Category, ContentSource, ExtractionStatus, Relevance};
use crate::validate::{parse_json_block, validate_analysis, AnalysisDraft};
use crate::TARGET_LLM_REQUEST;

/// Content handed to a model call is truncated to this many characters to
/// bound per-article cost.
pub const MAX_CONTENT_CHARS: usize = 4000;
/// The topic filter only needs the opening of the article.
const FILTER_SNIPPET_CHARS: usize = 1500;
/// Quality-check regeneration attempts per article.
pub const MAX_QUALITY_ATTEMPTS: usize = 3;

/// Transient per-article working state. Created at pipeline entry, mutated
/// by each stage, discarded once an outcome is produced. Never persisted.
pub struct PipelineState {
    pub article: Article,
    pub content: String,
    pub issues: Vec<String>,
    pub retry_count: usize,
    pub max_retries: usize,
    pub should_skip: bool,
    pub last_error: Option<String>,
}

impl PipelineState {
    fn new(article: Article) -> PipelineState {
        PipelineState {
            article,
            content: String::new(),
            issues: Vec::new(),
            retry_count: 0,
            max_retries: MAX_QUALITY_ATTEMPTS,
            should_skip: false,
            last_error: None,
        }
    }

    fn skip(&mut self, reason: &str) {
        self.should_skip = true;
        self.last_error = Some(reason.to_string());
    }
}

/// What the pipeline hands back to its caller. Persistence is the caller's
/// job; skipped articles must never reach storage half-scored.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(Article),
    Skipped {
        url: String,
        reason: String,
        issues: Vec<String>,
    },
}

/// Runs one feed item through the full stage sequence.
pub async fn process_item<M, E>(
    item: FeedItem,
    route: &ScoringRoute,
    topic: &str,
    gateway: &M,
    extractor: &E,
) -> PipelineOutcome
where
    M: ModelInvoker,
    E: ContentExtractor,
{
    let article = match working_article(&item) {
        Ok(article) => article,
        Err(reason) => {
            return PipelineOutcome::Skipped {
                url: item.url,
                reason,
                issues: Vec::new(),
            }
        }
    };

    let mut state = PipelineState::new(article);

    preprocess(&mut state);
    if state.should_skip {
        return skipped(state);
    }

    run_extract(&mut state, extractor).await;

    let relevant = match topic_filter(&mut state, topic, gateway).await {
        Ok(relevant) => relevant,
        Err(e) => {
            state.skip(&e.to_string());
            return skipped(state);
        }
    };

    if !relevant {
        let mut article = state.article;
        article.topic_filtered = true;
        article.topic_filtered_at = Some(Utc::now());
        // Filtered articles carry no score; the cheap gate exists so the
        // expensive call is never paid for irrelevant content.
        article.ai_score = None;
        debug!(target: TARGET_LLM_REQUEST, "Article not about the topic, recording as filtered: {}", article.url);
        return PipelineOutcome::Completed(article);
    }

    match score(&mut state, route, gateway).await {
        Ok(()) => PipelineOutcome::Completed(state.article),
        Err(e) => {
            if let SiftError::MalformedModelOutput { issues } = &e {
                state.issues.extend(issues.clone());
            }
            state.skip(&e.to_string());
            skipped(state)
        }
    }
}

fn skipped(state: PipelineState) -> PipelineOutcome {
    let reason = state
        .last_error
        .unwrap_or_else(|| "unspecified".to_string());
    warn!(target: TARGET_LLM_REQUEST, "Skipping article {}: {} ({} issues)",
        state.article.url, reason, state.issues.len());
    PipelineOutcome::Skipped {
        url: state.article.url,
        reason,
        issues: state.issues,
    }
}

fn working_article(item: &FeedItem) -> Result<Article, String> {
    let id = Article::id_for_url(&item.url)
        .map_err(|e| format!("invalid article URL: {}", e))?;
    Ok(Article {
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
        fetched_at: Utc::now(),
        ai_summary: None,
        ai_score: None,
        ai_category: None,
        relevance: Relevance::Unrated,
        rated_at: None,
        topic_filtered: false,
        topic_filtered_at: None,
    })
}

/// Selects the best available content (extracted text, then any prior
/// summary, then the excerpt), truncates it, and rejects articles with
/// nothing usable.
fn preprocess(state: &mut PipelineState) {
    let article = &state.article;
    let best = article
        .extracted_text
        .as_deref()
        .filter(|text| usable(text))
        .or(article.ai_summary.as_deref().filter(|text| usable(text)))
        .unwrap_or(&article.excerpt);

    state.content = truncate_chars(best.trim(), MAX_CONTENT_CHARS);

    if !usable(&state.content) {
        state.article.content_source = ContentSource::Failed;
        state.skip("no content source above the minimum floor");
    }
}

fn usable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_CONTENT_CHARS
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Attempts full-text extraction and records the outcome either way.
/// Extraction failure never blocks the pipeline; the excerpt stands in.
async fn run_extract<E: ContentExtractor>(state: &mut PipelineState, extractor: &E) {
    let extraction = extractor.extract(&state.article.url).await;

    match extraction.status {
        ExtractionStatus::Success => {
            state.article.extraction_status = ExtractionStatus::Success;
            state.article.content_source = ContentSource::Extracted;
            state.article.content_length = extraction.length;
            if state.article.author.is_none() {
                state.article.author = extraction.byline;
            }
            state.article.extracted_text = Some(extraction.text);
            preprocess(state);
        }
        _ => {
            state.article.extraction_status = ExtractionStatus::Failed;
            debug!("Extraction failed for {}, falling back to excerpt.", state.article.url);
        }
    }
}

/// Cheap-tier yes/no gate. An ambiguous reply is retried once, then fails
/// closed to not-relevant so borderline cases never inflate spend.
async fn topic_filter<M: ModelInvoker>(
    state: &mut PipelineState,
    topic: &str,
    gateway: &M,
) -> Result<bool, SiftError> {
    let snippet = truncate_chars(&state.content, FILTER_SNIPPET_CHARS);
    let prompt = prompt::topic_filter_prompt(&snippet, topic);

    for attempt in 0..2 {
        let response = gateway.invoke(ModelTier::Cheap, &prompt).await?;
        match parse_yes_no(&response) {
            Some(verdict) => return Ok(verdict),
            None => {
                warn!(target: TARGET_LLM_REQUEST, "Ambiguous topic filter reply for {} (attempt {}): {}",
                    state.article.url, attempt + 1, response.trim());
                state
                    .issues
                    .push(format!("ambiguous topic filter reply: {}", response.trim()));
            }
        }
    }

    info!(target: TARGET_LLM_REQUEST, "Topic filter stayed ambiguous for {}, defaulting to not relevant.", state.article.url);
    Ok(false)
}

/// The reply must contain exactly one of "yes"/"no" to count.
fn parse_yes_no(response: &str) -> Option<bool> {
    let lower = response.to_lowercase();
    let has_yes = lower.contains("yes");
    let has_no = lower.contains("no");
    match (has_yes, has_no) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Score + QualityCheck loop. Both variants share the retry-with-feedback
/// combinator; they differ in tier, prompt, and whether a score is expected.
async fn score<M: ModelInvoker>(
    state: &mut PipelineState,
    route: &ScoringRoute,
    gateway: &M,
) -> Result<(), SiftError> {
    let (tier, base_prompt, expect_score) = match route {
        ScoringRoute::TopicOnly => (
            ModelTier::Cheap,
            prompt::topic_summary_prompt(&state.content),
            false,
        ),
        ScoringRoute::ProfileAware(profile) => (
            ModelTier::Expensive,
            prompt::profile_scoring_prompt(&state.content, profile),
            true,
        ),
    };

    let draft: AnalysisDraft = attempt_with_feedback(
        state.max_retries,
        &base_prompt,
        |p| async move { gateway.invoke(tier, &p).await },
        |prompt, response| {
            let draft: AnalysisDraft = parse_json_block(response).map_err(|e| vec![e])?;
            let report = validate_analysis(&draft, expect_score, prompt);
            if report.valid {
                Ok(draft)
            } else {
                Err(report.issues)
            }
        },
        prompt::with_issue_feedback,
    )
    .await?;

    state.article.ai_summary = Some(draft.summary.trim().to_string());
    state.article.ai_category = Category::parse(&draft.category);
    state.article.ai_score = if expect_score { draft.score } else { None };
    Ok(())
}
