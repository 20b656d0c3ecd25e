use crate::types::{Category, UserProfile};
use crate::validate::{MAX_SCORE, MAX_SUMMARY_WORDS, MIN_SCORE, MIN_SUMMARY_WORDS};

/// Expensive-tier scoring with explicit reference to the learned profile.
/// Only reached once the cheap topic filter has passed.
pub fn profile_scoring_prompt(content: &str, profile: &UserProfile) -> String {
    format!(
        "{} | Carefully read and thoroughly understand the provided text.

The reader has expressed these preferences.
They like reading about:
{}

They dislike reading about:
{}

Reply with a single JSON object with exactly these fields:
{{\"score\": <number>, \"category\": \"...\", \"summary\": \"...\"}}

The score must be a number from {} to {}, where {} means the reader would
certainly skip this article and {} means they would certainly want to read
it, judged against the preferences above. The category must be one of: {}.
The summary must be between {} and {} words in clear American English,
written in your own words.

Do not tell me what you're doing, do not wrap the JSON in markdown fences,
reply with the JSON object only.",
        content,
        bullet_list(&profile.likes),
        bullet_list(&profile.dislikes),
        MIN_SCORE,
        MAX_SCORE,
        MIN_SCORE,
        MAX_SCORE,
        Category::allowed_list(),
        MIN_SUMMARY_WORDS,
        MAX_SUMMARY_WORDS
    )
}

fn bullet_list(entries: &[String]) -> String {
    if entries.is_empty() {
        return "- (nothing recorded)".to_string();
    }
    entries
        .iter()
        .map(|entry| format!("- {}", entry))
        .collect::<Vec<_>>()
        .join("\n")
}
