//! Schema and range checks for LLM-produced structured output.
//!
//! On failure, the issue list is fed back verbatim into the retry prompt so
//! the model is told exactly which constraints it violated; that feedback is
//! what makes retries converge instead of repeating the same mistake.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::types::Category;

pub const MIN_SUMMARY_WORDS: usize = 20;
pub const MAX_SUMMARY_WORDS: usize = 100;
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Structured analysis as returned by a Score call, before validation.
/// `score` is absent on the topic-only variant.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisDraft {
    #[serde(default)]
    pub score: Option<f64>,
    pub category: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<String>) -> ValidationReport {
        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Checks a parsed analysis against all constraints. Every check must pass
/// for `valid == true`; all violations are reported, not just the first.
pub fn validate_analysis(
    draft: &AnalysisDraft,
    expect_score: bool,
    prompt: &str,
) -> ValidationReport {
    let mut issues = Vec::new();

    if expect_score {
        match draft.score {
            None => issues.push(format!(
                "a numeric score between {} and {} is required",
                MIN_SCORE, MAX_SCORE
            )),
            Some(score) if !(MIN_SCORE..=MAX_SCORE).contains(&score) => issues.push(format!(
                "score {} is outside the range [{}, {}]",
                score, MIN_SCORE, MAX_SCORE
            )),
            Some(_) => {}
        }
    }

    if Category::parse(&draft.category).is_none() {
        issues.push(format!(
            "category '{}' is not one of: {}",
            draft.category.trim(),
            Category::allowed_list()
        ));
    }

    let summary = draft.summary.trim();
    if summary.is_empty() {
        issues.push("summary must not be empty".to_string());
    } else {
        let words = summary.split_whitespace().count();
        if !(MIN_SUMMARY_WORDS..=MAX_SUMMARY_WORDS).contains(&words) {
            issues.push(format!(
                "summary has {} words, expected between {} and {}",
                words, MIN_SUMMARY_WORDS, MAX_SUMMARY_WORDS
            ));
        }
        if prompt.contains(summary) {
            issues.push("summary is a verbatim copy of the prompt".to_string());
        }
    }

    ValidationReport::from_issues(issues)
}

/// Parses the first JSON object out of a model response, tolerating the
/// code fences and prose some models wrap their output in.
pub fn parse_json_block<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    let trimmed = response.trim();
    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok(parsed);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<T>(&trimmed[start..=end])
                .map_err(|e| format!("response is not valid JSON: {}", e))
        }
        _ => Err("response contains no JSON object".to_string()),
    }
}
