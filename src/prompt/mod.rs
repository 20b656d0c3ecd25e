// Declare submodules
mod common;
mod decisions;
mod profile;
mod scoring;
mod summarization;

pub use common::with_issue_feedback;
pub use decisions::topic_filter_prompt;
pub use profile::profile_generation_prompt;
pub use scoring::profile_scoring_prompt;
pub use summarization::topic_summary_prompt;
