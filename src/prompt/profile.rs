use crate::types::{Article, Relevance, UserProfile, MAX_LIST_ENTRIES, MIN_ENTRY_LEN};

/// Expensive-tier profile synthesis. When a prior profile exists it is
/// included so the model revises it rather than overwriting blindly.
pub fn profile_generation_prompt(rated: &[Article], existing: Option<&UserProfile>) -> String {
    let ratings = rated
        .iter()
        .map(|article| {
            let verdict = match article.relevance {
                Relevance::Relevant => "relevant",
                _ => "not relevant",
            };
            format!(
                "- [{}] {}: {}",
                verdict,
                article.title,
                article.ai_summary.as_deref().unwrap_or(&article.excerpt)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prior = match existing {
        Some(profile) => format!(
            "The reader already has a preference profile. Revise it in light of the new
ratings instead of starting over; keep entries that the ratings still support.

Current likes:
{}

Current dislikes:
{}

Most recent change: {}",
            profile.likes.join("\n"),
            profile.dislikes.join("\n"),
            profile.changelog
        ),
        None => "The reader has no preference profile yet; build one from the ratings alone."
            .to_string(),
    };

    format!(
        "A reader rated these articles:
{}

{}

Reply with a single JSON object with exactly these fields:
{{\"likes\": [\"...\"], \"dislikes\": [\"...\"], \"changelog\": \"...\"}}

Each likes/dislikes entry is a short free-text preference phrase of at least
{} characters. Each list holds at most {} entries and at least one. The
changelog is one sentence describing what changed in this revision and why.

Do not tell me what you're doing, do not wrap the JSON in markdown fences,
reply with the JSON object only.",
        ratings, prior, MIN_ENTRY_LEN, MAX_LIST_ENTRIES
    )
}
