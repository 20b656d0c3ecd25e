use crate::types::Category;
use crate::validate::{MAX_SUMMARY_WORDS, MIN_SUMMARY_WORDS};

/// Cheap-tier summarization for the topic-only route. No score is requested;
/// unscored articles keep a null stored score by design.
pub fn topic_summary_prompt(content: &str) -> String {
    format!(
        "{} | Carefully read and thoroughly understand the provided text.

Reply with a single JSON object with exactly these fields:
{{\"category\": \"...\", \"summary\": \"...\"}}

The category must be one of: {}. The summary must be between {} and {} words
in clear American English, written in your own words.

Do not tell me what you're doing, do not wrap the JSON in markdown fences,
reply with the JSON object only.",
        content,
        Category::allowed_list(),
        MIN_SUMMARY_WORDS,
        MAX_SUMMARY_WORDS
    )
}
