/// Strict yes/no gate: is this article about the configured topic?
/// The reply contract is a single word so the parse rule in the pipeline
/// can stay unambiguous.
pub fn topic_filter_prompt(content: &str, topic: &str) -> String {
    format!(
        "{} | Is this article specifically about the following topic: {}? Answer with the single
word 'yes' or 'no', without any further analysis or explanation.",
        content, topic
    )
}
