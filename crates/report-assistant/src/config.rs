use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::ApiProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub document: DocumentConfig,
    pub retrieval: RetrievalConfig,
    pub llm: GeneratorConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Name used in prompts and canned answers
    pub title: String,
    /// Front-matter pages preceding printed page 0
    pub page_offset: i64,
    /// JSON file written by the ingestion job
    pub chunks_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub provider: ApiProvider,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub log_path: PathBuf,
}

impl AssistantConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.document.title.trim().is_empty() {
            return Err("document.title must not be empty".into());
        }
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.retrieval.timeout_secs == 0 {
            return Err("retrieval.timeout_secs must be > 0".into());
        }
        if self.llm.model.trim().is_empty() {
            return Err("llm.model must not be empty".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be in [0.0, 2.0]".into());
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be > 0".into());
        }
        if self.llm.timeout_secs == 0 {
            return Err("llm.timeout_secs must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file. An empty `llm.api_key` is filled from the environment.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        if config.llm.api_key.is_empty() {
            config.llm.api_key = api_key_from_env();
        }
        config.validate()?;
        Ok(config)
    }
}

fn api_key_from_env() -> String {
    ["LLM_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("report-assistant");

        let chunks_path = match std::env::var("REPORT_CHUNKS_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("chunks.json"),
        };

        Self {
            document: DocumentConfig {
                title: "Annual Report".to_string(),
                page_offset: 9,
                chunks_path,
            },
            retrieval: RetrievalConfig {
                top_k: 4,
                timeout_secs: 10,
            },
            llm: GeneratorConfig {
                provider: ApiProvider::Google,
                model: "gemini-2.5-flash".to_string(),
                api_key: api_key_from_env(),
                temperature: 0.0,
                max_tokens: 1024,
                timeout_secs: 60,
            },
            audit: AuditConfig {
                log_path: PathBuf::from("logs").join("interactions.jsonl"),
            },
        }
    }
}
