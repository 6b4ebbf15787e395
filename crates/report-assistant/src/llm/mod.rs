//! LLM Module - text generation over an external completion API

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod external;

pub use external::ExternalGenerator;

/// External API providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiProvider {
    OpenAI,
    Anthropic,
    OpenRouter,
    Google,
    Ollama,
    Custom { endpoint: String },
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl From<&crate::config::GeneratorConfig> for GenerationConfig {
    fn from(config: &crate::config::GeneratorConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A single-round-trip completion service.
///
/// Implementations send `system_prompt` as the system role and
/// [`format_human_turn`] of `context` and `question` as the user role.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, system_prompt: &str, context: &str, question: &str)
        -> Result<String>;
}

/// The user-role message carrying retrieved context and the cleaned question.
pub fn format_human_turn(context: &str, question: &str) -> String {
    format!("Context:\n{}\n\nQuestion: {}", context, question)
}
