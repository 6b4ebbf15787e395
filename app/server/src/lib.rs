//! HTTP server for the report assistant
//!
//! Thin adapter between a client UI and [`Assistant`]: one endpoint per query,
//! one per confirmation signal, plus read-only resources.

use axum::{
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use report_assistant::resources::{self, CapabilitiesResource, PolicyResource};
use report_assistant::{
    Assistant, AssistantConfig, AssistantError, CancellationRecord, CompletedTaskRecord,
    PendingAction, ResponseEnvelope, Session,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub pending: Option<PendingAction>,
}

/// Default idle lifetime of a session before the sweeper drops it
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_touched: Instant,
}

impl SessionSlot {
    fn new(id: &str) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::with_id(id))),
            last_touched: Instant::now(),
        }
    }

    fn touch(&mut self) -> Arc<Mutex<Session>> {
        self.last_touched = Instant::now();
        self.session.clone()
    }
}

/// Each session sits behind its own lock so concurrent requests for one
/// conversation are applied one at a time.
#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
    config: Arc<AssistantConfig>,
    sessions: Arc<DashMap<String, SessionSlot>>,
    session_ttl: Duration,
}

impl AppState {
    pub fn new(assistant: Assistant, config: AssistantConfig) -> Self {
        Self {
            assistant: Arc::new(assistant),
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionSlot::new(id))
            .touch()
    }

    fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, (StatusCode, String)> {
        self.sessions
            .get_mut(id)
            .map(|mut slot| slot.touch())
            .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown session {}", id)))
    }

    /// Drop sessions untouched for longer than the TTL. A session a request
    /// still holds is kept until the next sweep. Returns the number removed.
    pub fn evict_expired_sessions(&self) -> usize {
        let ttl = self.session_ttl;
        let mut evicted = 0;
        self.sessions.retain(|_, slot| {
            let keep =
                slot.last_touched.elapsed() < ttl || Arc::strong_count(&slot.session) > 1;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }
}

/// Periodically evict expired sessions for as long as the server runs.
pub fn spawn_session_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = (state.session_ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.evict_expired_sessions();
            if evicted > 0 {
                tracing::debug!(
                    evicted,
                    remaining = state.session_count(),
                    "Evicted expired sessions"
                );
            }
        }
    })
}

async fn handle_query(
    AxumState(state): AxumState<AppState>,
    Json(payload): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    if payload.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query must not be empty".to_string()));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(session = %session_id, "Received query");

    let session = state.session_or_create(&session_id);
    let mut session = session.lock().await;
    let response = state.assistant.respond(&payload.query, &mut session).await;

    Ok(Json(QueryResponse {
        session_id,
        response,
    }))
}

fn invalid_state(e: AssistantError) -> (StatusCode, String) {
    match e {
        AssistantError::InvalidState { .. } => (StatusCode::CONFLICT, e.to_string()),
        other => {
            tracing::error!(error = %other, "Unexpected confirmation failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Confirmation failed".to_string(),
            )
        }
    }
}

async fn handle_confirm(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<CompletedTaskRecord> {
    let session = state.session(&session_id)?;
    let mut session = session.lock().await;
    state
        .assistant
        .confirm(&mut session)
        .map(Json)
        .map_err(invalid_state)
}

async fn handle_cancel(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<CancellationRecord> {
    let session = state.session(&session_id)?;
    let mut session = session.lock().await;
    state
        .assistant
        .decline(&mut session)
        .map(Json)
        .map_err(invalid_state)
}

async fn handle_session_status(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionStatus> {
    let session = state.session(&session_id)?;
    let session = session.lock().await;
    Ok(Json(SessionStatus {
        session_id,
        pending: session.pending().cloned(),
    }))
}

async fn handle_policies(AxumState(state): AxumState<AppState>) -> Json<PolicyResource> {
    Json(resources::policies(&state.config))
}

async fn handle_capabilities() -> Json<CapabilitiesResource> {
    Json(resources::capabilities())
}

async fn health_check() -> &'static str {
    "Report assistant API is running"
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .route("/api/query", post(handle_query))
        .route("/api/sessions/:id", get(handle_session_status))
        .route("/api/sessions/:id/confirm", post(handle_confirm))
        .route("/api/sessions/:id/cancel", post(handle_cancel))
        .route("/api/resources/policies", get(handle_policies))
        .route("/api/resources/capabilities", get(handle_capabilities))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        session_ttl_secs = state.session_ttl.as_secs(),
        "Report assistant listening on http://{}",
        addr
    );
    spawn_session_sweeper(state.clone());
    axum::serve(listener, router(state)).await?;
    Ok(())
}
