//! Model gateway: the single call boundary to both LLM tiers.

use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};

use crate::error::SiftError;
use crate::{LLMClient, ModelProfile, TARGET_LLM_REQUEST};

const CALL_TIMEOUT: Duration = Duration::from_secs(120);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// The cheap tier handles binary filtering and short summaries; the
/// expensive tier handles nuanced scoring and profile synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Cheap,
    Expensive,
}

impl ModelTier {
    /// Retries beyond the first attempt. The expensive tier gets one more
    /// because its calls are the ones worth waiting for.
    pub fn max_retries(self) -> usize {
        match self {
            ModelTier::Cheap => 2,
            ModelTier::Expensive => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Cheap => "cheap",
            ModelTier::Expensive => "expensive",
        }
    }
}

/// Call boundary the pipeline and learner depend on; `ModelGateway` is the
/// production implementation, tests script their own.
pub trait ModelInvoker: Send + Sync {
    fn invoke(
        &self,
        tier: ModelTier,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, SiftError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ModelGateway {
    cheap: ModelProfile,
    expensive: ModelProfile,
}

impl ModelGateway {
    pub fn new(cheap: ModelProfile, expensive: ModelProfile) -> Self {
        ModelGateway { cheap, expensive }
    }

    pub fn profile(&self, tier: ModelTier) -> &ModelProfile {
        match tier {
            ModelTier::Cheap => &self.cheap,
            ModelTier::Expensive => &self.expensive,
        }
    }

}

impl ModelInvoker for ModelGateway {
    /// Sends a prompt to the selected tier, retrying network errors, rate
    /// limits, timeouts and empty responses with exponential backoff.
    /// Exhausting retries surfaces `ModelUnavailable`; the caller decides
    /// whether to skip the current article (yes) or abort the batch (no).
    async fn invoke(&self, tier: ModelTier, prompt: &str) -> Result<String, SiftError> {
        let profile = self.profile(tier);
        let attempts = tier.max_retries() + 1;
        let mut backoff = INITIAL_BACKOFF;
        let mut last_reason = String::new();

        for attempt in 0..attempts {
            debug!(target: TARGET_LLM_REQUEST, "[{} {}]: sending prompt ({} chars), attempt {}/{}.",
                tier.as_str(), profile.model, prompt.len(), attempt + 1, attempts);

            match timeout(CALL_TIMEOUT, generate_once(profile, prompt)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    debug!(target: TARGET_LLM_REQUEST, "[{} {}]: response received ({} chars).",
                        tier.as_str(), profile.model, text.len());
                    return Ok(text);
                }
                Ok(Ok(_)) => {
                    last_reason = "empty response".to_string();
                    warn!(target: TARGET_LLM_REQUEST, "[{} {}]: empty response.", tier.as_str(), profile.model);
                }
                Ok(Err(reason)) => {
                    last_reason = reason;
                    warn!(target: TARGET_LLM_REQUEST, "[{} {}]: request failed: {}.",
                        tier.as_str(), profile.model, last_reason);
                }
                Err(_) => {
                    last_reason = format!("timed out after {:?}", CALL_TIMEOUT);
                    warn!(target: TARGET_LLM_REQUEST, "[{} {}]: request timed out.", tier.as_str(), profile.model);
                }
            }

            if attempt < attempts - 1 {
                debug!(target: TARGET_LLM_REQUEST, "[{} {}]: backing off {:?} before retry.",
                    tier.as_str(), profile.model, backoff);
                sleep(backoff).await;
                backoff *= 2;
            }
        }

        error!(target: TARGET_LLM_REQUEST, "[{} {}]: no response after {} attempts: {}.",
            tier.as_str(), profile.model, attempts, last_reason);
        Err(SiftError::ModelUnavailable {
            attempts,
            reason: last_reason,
        })
    }
}

async fn generate_once(profile: &ModelProfile, prompt: &str) -> Result<String, String> {
    match &profile.llm_client {
        LLMClient::Ollama(ollama) => {
            let mut request = GenerationRequest::new(profile.model.clone(), prompt.to_string());
            request.options =
                Some(GenerationOptions::default().temperature(profile.temperature));
            ollama
                .generate(request)
                .await
                .map(|response| response.response)
                .map_err(|e| e.to_string())
        }
        LLMClient::OpenAI(client) => {
            let message = ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| e.to_string())?;
            let request = CreateChatCompletionRequestArgs::default()
                .model(&profile.model)
                .temperature(profile.temperature)
                .messages([message.into()])
                .build()
                .map_err(|e| e.to_string())?;
            let response = client.chat().create(request).await.map_err(|e| e.to_string())?;
            response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .ok_or_else(|| "response contained no choices".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expensive_tier_retries_more() {
        assert_eq!(ModelTier::Cheap.max_retries(), 2);
        assert_eq!(ModelTier::Expensive.max_retries(), 3);
    }
}
