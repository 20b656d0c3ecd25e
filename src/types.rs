//! Domain types shared by the pipeline, router, learner and storage layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use urlnorm::UrlNormalizer;

/// Upper bound on likes/dislikes entries in a profile.
pub const MAX_LIST_ENTRIES: usize = 15;
/// Minimum trimmed length of a single likes/dislikes entry.
pub const MIN_ENTRY_LEN: usize = 5;

/// Where the working content of an article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Excerpt,
    Extracted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Unrated,
    Relevant,
    NotRelevant,
}

impl Relevance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::Unrated => "unrated",
            Relevance::Relevant => "relevant",
            Relevance::NotRelevant => "not_relevant",
        }
    }

    pub fn parse(s: &str) -> Option<Relevance> {
        match s {
            "unrated" => Some(Relevance::Unrated),
            "relevant" => Some(Relevance::Relevant),
            "not_relevant" | "not-relevant" => Some(Relevance::NotRelevant),
            _ => None,
        }
    }
}

/// Closed category enumeration; anything the model invents outside this set
/// fails quality validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technology,
    Science,
    Business,
    Politics,
    Health,
    Culture,
    Sports,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Technology,
        Category::Science,
        Category::Business,
        Category::Politics,
        Category::Health,
        Category::Culture,
        Category::Sports,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Business => "business",
            Category::Politics => "politics",
            Category::Health => "health",
            Category::Culture => "culture",
            Category::Sports => "sports",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        let normalized = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
    }

    /// Comma-separated list for prompt construction and validator messages.
    pub fn allowed_list() -> String {
        Category::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One ingested piece of content, keyed by the hash of its normalized URL.
///
/// Optional fields are omitted from any serialized document rather than
/// written as nulls; some backing stores reject null-like sentinels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub content_source: ContentSource,
    pub extraction_status: ExtractionStatus,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_category: Option<Category>,
    pub relevance: Relevance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated_at: Option<DateTime<Utc>>,
    pub topic_filtered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_filtered_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Content-addressed identifier: SHA-256 of the normalized URL, so
    /// tracking-parameter variants of the same page dedup to one record.
    pub fn id_for_url(url: &str) -> Result<String, url::ParseError> {
        let parsed = Url::parse(url)?;
        let normalizer = UrlNormalizer::default();
        let normalized = normalizer.compute_normalization_string(&parsed);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Singleton per-installation preference profile. Either wholly absent or
/// wholly valid; there is no partial-profile state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub changelog: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    /// Every violation found, or empty when the profile is valid. Violating
    /// profiles must never be persisted; the prior profile stays untouched.
    pub fn validation_issues(&self) -> Vec<String> {
        let mut issues = validate_preference_list("likes", &self.likes);
        issues.extend(validate_preference_list("dislikes", &self.dislikes));
        if self.changelog.trim().is_empty() {
            issues.push("changelog must not be empty".to_string());
        }
        issues
    }
}

/// Per-item rules shared by the learner and the manual edit path: bounded
/// count, minimum trimmed length. Violations are reported, never truncated
/// away.
pub fn validate_preference_list(label: &str, entries: &[String]) -> Vec<String> {
    let mut issues = Vec::new();
    if entries.len() > MAX_LIST_ENTRIES {
        issues.push(format!(
            "{} has {} entries, maximum is {}",
            label,
            entries.len(),
            MAX_LIST_ENTRIES
        ));
    }
    for entry in entries {
        if entry.trim().chars().count() < MIN_ENTRY_LEN {
            issues.push(format!(
                "{} entry '{}' is shorter than {} characters",
                label,
                entry.trim(),
                MIN_ENTRY_LEN
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_tracking_params() {
        let a = Article::id_for_url("https://example.com/story?utm_source=feed").unwrap();
        let b = Article::id_for_url("https://example.com/story").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_per_page() {
        let a = Article::id_for_url("https://example.com/story-one").unwrap();
        let b = Article::id_for_url("https://example.com/story-two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(Article::id_for_url("not a url").is_err());
    }

    #[test]
    fn preference_list_bounds() {
        let too_many: Vec<String> = (0..16).map(|i| format!("topic number {}", i)).collect();
        let issues = validate_preference_list("likes", &too_many);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("maximum is 15"));
    }

    #[test]
    fn preference_entry_min_length() {
        let entries = vec!["rust".to_string(), "rust async runtimes".to_string()];
        let issues = validate_preference_list("dislikes", &entries);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("shorter than 5"));
    }

    #[test]
    fn whitespace_does_not_count_toward_length() {
        let entries = vec!["  ab  ".to_string()];
        let issues = validate_preference_list("likes", &entries);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse(" Technology "), Some(Category::Technology));
        assert_eq!(Category::parse("finance"), None);
    }
}
