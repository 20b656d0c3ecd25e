use std::env;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;
use tracing::info;

use crate::error::SiftError;
use crate::llm::ModelGateway;
use crate::{LLMClient, ModelProfile};

/// Retrieves an environment variable and splits it into a vector of strings
/// based on a delimiter.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Everything the core consumes: feed sources, the topic description used by
/// the filter, storage location, and the two model tiers.
#[derive(Clone)]
pub struct Config {
    pub feed_urls: Vec<String>,
    pub topic: String,
    pub database_path: String,
    pub gateway: ModelGateway,
}

impl Config {
    /// Loads and validates configuration from the environment. Missing
    /// credentials or an empty topic abort the run before any item is
    /// processed.
    pub fn from_env() -> Result<Config, SiftError> {
        let feed_urls = get_env_var_as_vec("SIFT_FEED_URLS", ';');
        if feed_urls.is_empty() {
            return Err(SiftError::ConfigurationInvalid(
                "SIFT_FEED_URLS must list at least one feed URL".to_string(),
            ));
        }

        let topic = env::var("SIFT_TOPIC").unwrap_or_default();
        if topic.trim().is_empty() {
            return Err(SiftError::ConfigurationInvalid(
                "SIFT_TOPIC must describe the topic to filter for".to_string(),
            ));
        }

        let database_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "sift.db".to_string());

        let temperature: f32 = env::var("LLM_TEMPERATURE")
            .unwrap_or_else(|_| "0.0".to_string())
            .parse()
            .unwrap_or(0.0);

        let llm_client = build_client()?;

        let cheap_model = env::var("SIFT_CHEAP_MODEL")
            .map_err(|_| SiftError::ConfigurationInvalid("SIFT_CHEAP_MODEL is not set".to_string()))?;
        let expensive_model = env::var("SIFT_EXPENSIVE_MODEL").map_err(|_| {
            SiftError::ConfigurationInvalid("SIFT_EXPENSIVE_MODEL is not set".to_string())
        })?;

        let gateway = ModelGateway::new(
            ModelProfile {
                llm_client: llm_client.clone(),
                model: cheap_model,
                temperature,
            },
            ModelProfile {
                llm_client,
                model: expensive_model,
                temperature,
            },
        );

        Ok(Config {
            feed_urls,
            topic: topic.trim().to_string(),
            database_path,
            gateway,
        })
    }
}

fn build_client() -> Result<LLMClient, SiftError> {
    match env::var("LLM_PROVIDER").as_deref() {
        Ok("openai") => {
            let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
                SiftError::ConfigurationInvalid(
                    "OPENAI_API_KEY must be set when LLM_PROVIDER=openai".to_string(),
                )
            })?;
            let config = OpenAIConfig::new().with_api_key(api_key);
            Ok(LLMClient::OpenAI(OpenAIClient::with_config(config)))
        }
        _ => {
            let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port: u16 = env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434);

            info!("Connecting to Ollama at {}:{}", host, port);
            Ok(LLMClient::Ollama(Ollama::new(host, port)))
        }
    }
}
