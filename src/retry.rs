//! Attempt → validate → retry-with-feedback combinator.
//!
//! Both the quality-check loop and profile generation need the same shape:
//! call the model, validate the structured output, and on failure retry with
//! a prompt that names the violated constraints. Implemented once here
//! rather than duplicated per call site.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::SiftError;
use crate::TARGET_LLM_REQUEST;

/// Runs up to `max_attempts` generate/validate cycles.
///
/// `generate` sends a prompt to the model; `validate` parses and checks the
/// response, returning either the typed result or the violation list;
/// `augment` builds the retry prompt from the base prompt and those
/// violations. Gateway-level failures (`ModelUnavailable`) propagate
/// immediately since the gateway already retried transport errors.
/// Exhausting validation attempts yields `MalformedModelOutput` carrying the
/// last issue list for diagnostics.
pub async fn attempt_with_feedback<T, G, Fut, V, A>(
    max_attempts: usize,
    base_prompt: &str,
    mut generate: G,
    mut validate: V,
    mut augment: A,
) -> Result<T, SiftError>
where
    G: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, SiftError>>,
    V: FnMut(&str, &str) -> Result<T, Vec<String>>,
    A: FnMut(&str, &[String]) -> String,
{
    let mut prompt = base_prompt.to_string();
    let mut last_issues = Vec::new();

    for attempt in 1..=max_attempts {
        let response = generate(prompt.clone()).await?;

        match validate(&prompt, &response) {
            Ok(value) => {
                debug!(target: TARGET_LLM_REQUEST, "Valid structured output on attempt {}/{}.", attempt, max_attempts);
                return Ok(value);
            }
            Err(issues) => {
                warn!(target: TARGET_LLM_REQUEST, "Attempt {}/{} failed validation: {}.",
                    attempt, max_attempts, issues.join("; "));
                if attempt < max_attempts {
                    prompt = augment(base_prompt, &issues);
                }
                last_issues = issues;
            }
        }
    }

    Err(SiftError::MalformedModelOutput {
        issues: last_issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn first_valid_attempt_wins() {
        let calls = Cell::new(0usize);
        let result = attempt_with_feedback(
            3,
            "base",
            |p| {
                calls.set(calls.get() + 1);
                async move { Ok(format!("response to {}", p)) }
            },
            |_prompt, response| Ok::<_, Vec<String>>(response.len()),
            |base, issues| format!("{} [{}]", base, issues.join("; ")),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_carry_issue_feedback() {
        let calls = Cell::new(0usize);
        let result = attempt_with_feedback(
            3,
            "base",
            |p| {
                calls.set(calls.get() + 1);
                async move { Ok(p) }
            },
            |_prompt, response: &str| {
                if response.contains("too short") {
                    Ok(response.to_string())
                } else {
                    Err(vec!["too short".to_string()])
                }
            },
            |base, issues| format!("{} (previous attempt failed: {})", base, issues.join("; ")),
        )
        .await;
        // Second attempt sees the augmented prompt and passes.
        assert!(result.is_ok());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn exhaustion_reports_last_issues() {
        let result: Result<(), _> = attempt_with_feedback(
            3,
            "base",
            |_p| async move { Ok("bad".to_string()) },
            |_prompt, _response| Err(vec!["score missing".to_string()]),
            |base, _issues| base.to_string(),
        )
        .await;
        match result {
            Err(SiftError::MalformedModelOutput { issues }) => {
                assert_eq!(issues, vec!["score missing".to_string()]);
            }
            other => panic!("expected MalformedModelOutput, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn gateway_failure_propagates_immediately() {
        let calls = Cell::new(0usize);
        let result: Result<(), _> = attempt_with_feedback(
            3,
            "base",
            |_p| {
                calls.set(calls.get() + 1);
                async move {
                    Err(SiftError::ModelUnavailable {
                        attempts: 3,
                        reason: "connection refused".to_string(),
                    })
                }
            },
            |_prompt, _response: &str| Err(vec!["unreached".to_string()]),
            |base, _issues| base.to_string(),
        )
        .await;
        assert!(matches!(result, Err(SiftError::ModelUnavailable { .. })));
        assert_eq!(calls.get(), 1);
    }
}
