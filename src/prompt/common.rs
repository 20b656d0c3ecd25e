/// Appends the validator's issue list to a base prompt so a retry states
/// exactly which constraints the previous answer violated.
pub fn with_issue_feedback(base_prompt: &str, issues: &[String]) -> String {
    format!(
        "{}

Your previous answer was rejected for the following reasons:
{}

Produce a corrected answer that fixes every listed problem. Reply with the
corrected answer only.",
        base_prompt,
        issues
            .iter()
            .map(|issue| format!("- {}", issue))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_lists_every_issue() {
        let augmented = with_issue_feedback(
            "Score this article.",
            &["score missing".to_string(), "summary too short".to_string()],
        );
        assert!(augmented.starts_with("Score this article."));
        assert!(augmented.contains("- score missing"));
        assert!(augmented.contains("- summary too short"));
    }
}
