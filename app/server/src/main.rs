use anyhow::anyhow;
use std::path::PathBuf;
use std::time::Duration;

use report_assistant::{Assistant, AssistantConfig};
use report_assistant_server::{start_server, AppState, DEFAULT_SESSION_TTL};

const DEFAULT_ADDR: &str = "127.0.0.1:8787";

fn load_config() -> anyhow::Result<AssistantConfig> {
    match std::env::var("REPORT_ASSISTANT_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "Loading configuration");
            AssistantConfig::from_file(&path).map_err(|e| anyhow!(e))
        }
        Err(_) => {
            tracing::info!("REPORT_ASSISTANT_CONFIG not set, using defaults");
            Ok(AssistantConfig::default())
        }
    }
}

fn session_ttl() -> Duration {
    std::env::var("REPORT_ASSISTANT_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SESSION_TTL)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = load_config()?;
    let assistant = Assistant::from_config(&config)?;
    tracing::info!(
        document = %config.document.title,
        chunks = %config.document.chunks_path.display(),
        "Report assistant ready"
    );

    let addr =
        std::env::var("REPORT_ASSISTANT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let state = AppState::new(assistant, config).with_session_ttl(session_ttl());
    start_server(state, &addr).await
}
