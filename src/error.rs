use thiserror::Error;

/// Failure taxonomy for the pipeline and the learner.
///
/// Per-article failures (`TransientIO`, `ModelUnavailable`,
/// `MalformedModelOutput`) are contained to that article: the batch logs and
/// moves on. `ConfigurationInvalid` aborts the run before any item is
/// touched. `StorageFailure` on a write leaves the article unmarked so the
/// next run picks it up again through the dedup check.
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("transient I/O failure: {0}")]
    TransientIO(String),

    #[error("model unavailable after {attempts} attempts: {reason}")]
    ModelUnavailable { attempts: usize, reason: String },

    #[error("malformed model output: {}", issues.join("; "))]
    MalformedModelOutput { issues: Vec<String> },

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] sqlx::Error),

    #[error("profile rejected: {}", issues.join("; "))]
    InvalidProfile { issues: Vec<String> },

    #[error("another profile generation is already in progress")]
    LearnerBusy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert_without_claiming_a_write() {
        let e = SiftError::from(sqlx::Error::PoolTimedOut);
        assert!(e.to_string().starts_with("storage failure:"));
    }
}
