//! External completion API client for OpenAI-compatible, Anthropic and Gemini endpoints

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use super::{format_human_turn, ApiProvider, GenerationConfig, GenerationService};
use crate::config::GeneratorConfig;

pub struct ExternalGenerator {
    provider: ApiProvider,
    api_key: String,
    model: String,
    generation: GenerationConfig,
    client: Client,
}

impl ExternalGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            provider = ?config.provider,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Creating ExternalGenerator"
        );

        Ok(Self {
            provider: config.provider.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            generation: GenerationConfig::from(config),
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            ApiProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions".to_string(),
            ApiProvider::Google => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
            ApiProvider::Ollama => "http://localhost:11434/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    fn request_body(&self, system_prompt: &str, human_turn: &str) -> JsonValue {
        let config = &self.generation;
        match &self.provider {
            ApiProvider::Anthropic => json!({
                "model": self.model,
                "system": system_prompt,
                "messages": [
                    {"role": "user", "content": human_turn}
                ],
                "max_tokens": config.max_tokens,
                "temperature": config.temperature,
            }),
            ApiProvider::Google => json!({
                "systemInstruction": {
                    "parts": [{"text": system_prompt}]
                },
                "contents": [{
                    "role": "user",
                    "parts": [{"text": human_turn}]
                }],
                "generationConfig": {
                    "temperature": config.temperature,
                    "maxOutputTokens": config.max_tokens,
                }
            }),
            _ => json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": human_turn}
                ],
                "max_tokens": config.max_tokens,
                "temperature": config.temperature,
                "stream": false
            }),
        }
    }

    async fn send(&self, body: &JsonValue) -> Result<(reqwest::StatusCode, String)> {
        let endpoint = self.endpoint();
        let request = self.client.post(&endpoint).json(body);
        let request = match &self.provider {
            ApiProvider::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            ApiProvider::Google => request.header("x-goog-api-key", &self.api_key),
            _ => request.header("Authorization", format!("Bearer {}", self.api_key)),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(endpoint = %endpoint, "Generation request timed out");
                anyhow!("Request to {} timed out", endpoint)
            } else if e.is_connect() {
                tracing::error!(endpoint = %endpoint, error = %e, "Connection failed");
                anyhow!("Failed to connect to {}: {}", endpoint, e)
            } else {
                tracing::error!(endpoint = %endpoint, error = %e, "Request failed");
                anyhow!("Request to {} failed: {}", endpoint, e)
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;
        Ok((status, text))
    }
}

/// Parse a response body as JSON, returning a clear error if the server returned
/// an error status or an HTML page instead of JSON.
fn parse_json_body<T: serde::de::DeserializeOwned>(
    status: reqwest::StatusCode,
    body: &str,
    endpoint: &str,
) -> Result<T> {
    if !status.is_success() {
        tracing::error!(endpoint = %endpoint, status = %status, "API returned error");
        let preview: String = body.chars().take(300).collect();
        return Err(anyhow!("API error ({}): {}", status, preview));
    }

    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!(
            "Endpoint {} returned HTML instead of JSON (HTTP {}): {}",
            endpoint,
            status,
            preview
        ));
    }

    serde_json::from_str::<T>(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!(
            "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
            endpoint,
            status,
            e,
            preview
        )
    })
}

fn extract_text(
    provider: &ApiProvider,
    status: reqwest::StatusCode,
    body: &str,
    endpoint: &str,
) -> Result<String> {
    let text = match provider {
        ApiProvider::Anthropic => {
            let result: AnthropicResponse = parse_json_body(status, body, endpoint)?;
            result.content.into_iter().next().map(|c| c.text)
        }
        ApiProvider::Google => {
            let result: GoogleResponse = parse_json_body(status, body, endpoint)?;
            result
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().next())
                .map(|p| p.text)
        }
        _ => {
            let result: OpenAIResponse = parse_json_body(status, body, endpoint)?;
            result.choices.into_iter().next().map(|c| c.message.content)
        }
    };

    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("No completion returned from {}", endpoint))
}

#[async_trait]
impl GenerationService for ExternalGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        question: &str,
    ) -> Result<String> {
        let human_turn = format_human_turn(context, question);
        let body = self.request_body(system_prompt, &human_turn);
        let endpoint = self.endpoint();

        tracing::debug!(
            endpoint = %endpoint,
            model = %self.model,
            context_len = context.len(),
            "Sending generation request"
        );

        let (status, response_body) = self.send(&body).await?;
        let text = extract_text(&self.provider, status, &response_body, &endpoint)?;

        tracing::debug!(chars = text.len(), "Generation response received");
        Ok(text)
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Deserialize)]
struct GoogleContent {
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: String,
}
