pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod feeds;
pub mod learner;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod router;
pub mod run;
pub mod types;
pub mod validate;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

/// One backing model: a client, a model name, and the sampling temperature.
/// The gateway holds one of these per tier.
#[derive(Clone, Debug)]
pub struct ModelProfile {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
}
