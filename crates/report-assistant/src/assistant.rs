//! Query entry point
//!
//! Routes a raw utterance through intent extraction, page lookup or ranked
//! search, answer composition and the session's confirmation state, and returns
//! one [`ResponseEnvelope`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::{extract_intent, CancellationRecord, CompletedTaskRecord, PendingAction, Session};
use crate::audit::{AuditCategory, AuditEntry, AuditSink, JsonLinesAuditLog};
use crate::config::AssistantConfig;
use crate::error::{AssistantError, Result};
use crate::llm::{ExternalGenerator, GenerationService};
use crate::rag::{no_content_message, strip_task_language, AnswerComposer, PageLocator, PageLookup};
use crate::search::{ChunkIndex, DocumentIndex};
use crate::types::{ChunkSource, ComposedAnswer};

/// Utterances that only make sense as a reply to a pending action
const CONFIRMATION_WORDS: &[&str] = &["yes", "no", "confirm", "cancel"];

const USE_CONTROLS_NOTICE: &str =
    "Please use the Confirm / Cancel buttons to proceed with enterprise actions.";

/// Sent to the generation service when the query held nothing but task language
const GENERIC_QUESTION: &str = "Summarize the relevant content";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    SystemNotice {
        data: String,
    },
    Answer {
        data: String,
        sources: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<PendingAction>,
    },
}

impl ResponseEnvelope {
    fn category(&self) -> AuditCategory {
        match self {
            Self::SystemNotice { .. } => AuditCategory::SystemNotice,
            Self::Answer { .. } => AuditCategory::Answer,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::SystemNotice { data } | Self::Answer { data, .. } => data,
        }
    }

    pub fn action(&self) -> Option<&PendingAction> {
        match self {
            Self::Answer { action, .. } => action.as_ref(),
            Self::SystemNotice { .. } => None,
        }
    }
}

pub struct Assistant {
    index: Arc<dyn DocumentIndex>,
    composer: AnswerComposer,
    locator: PageLocator,
    audit: Arc<dyn AuditSink>,
    top_k: usize,
    retrieval_timeout: Duration,
}

impl Assistant {
    pub fn new(
        config: &AssistantConfig,
        index: Arc<dyn DocumentIndex>,
        generator: Arc<dyn GenerationService>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            index,
            composer: AnswerComposer::new(
                generator,
                config.document.title.clone(),
                Duration::from_secs(config.llm.timeout_secs),
            ),
            locator: PageLocator::new(config.document.page_offset),
            audit,
            top_k: config.retrieval.top_k,
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
        }
    }

    /// Wire up the default collaborators: chunk file index, external
    /// generation API and JSON Lines audit log.
    pub fn from_config(config: &AssistantConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;
        let index = ChunkIndex::load(&config.document.chunks_path)?;
        let generator =
            ExternalGenerator::new(&config.llm).context("Failed to create generation client")?;
        let audit = JsonLinesAuditLog::open(&config.audit.log_path)?;
        Ok(Self::new(
            config,
            Arc::new(index),
            Arc::new(generator),
            Arc::new(audit),
        ))
    }

    /// Answer `query` for `session`.
    ///
    /// A new pending action is only held once the answer path succeeded, so a
    /// failed query leaves the session untouched.
    pub async fn answer(&self, query: &str, session: &mut Session) -> Result<ResponseEnvelope> {
        let normalized = query.trim().to_lowercase();
        if session.is_awaiting_confirmation() && CONFIRMATION_WORDS.contains(&normalized.as_str()) {
            tracing::debug!(session = %session.id(), "Bare confirmation word while action pending");
            let envelope = ResponseEnvelope::SystemNotice {
                data: USE_CONTROLS_NOTICE.to_string(),
            };
            self.record(query, &envelope, envelope.category());
            return Ok(envelope);
        }

        let action = extract_intent(query);
        let composed = match self.resolve(query).await {
            Ok(composed) => composed,
            Err(e) => {
                tracing::warn!(session = %session.id(), error = %e, "Query failed");
                self.record(
                    query,
                    &serde_json::json!({ "error": e.to_string() }),
                    AuditCategory::Error,
                );
                return Err(e);
            }
        };

        if let Some(action) = &action {
            session.hold(action.clone());
        }

        let envelope = ResponseEnvelope::Answer {
            data: composed.text,
            sources: composed.sources,
            action,
        };
        tracing::info!(
            session = %session.id(),
            has_action = envelope.action().is_some(),
            "Answered query"
        );
        self.record(query, &envelope, envelope.category());
        Ok(envelope)
    }

    /// Like [`Assistant::answer`], but every failure becomes a system notice.
    pub async fn respond(&self, query: &str, session: &mut Session) -> ResponseEnvelope {
        match self.answer(query, session).await {
            Ok(envelope) => envelope,
            Err(e) => ResponseEnvelope::SystemNotice {
                data: failure_notice(&e).to_string(),
            },
        }
    }

    pub fn confirm(&self, session: &mut Session) -> Result<CompletedTaskRecord> {
        let record = session.confirm()?;
        tracing::info!(session = %session.id(), intent = %record.intent, "Action confirmed");
        self.record("CONFIRM_ACTION", &record, AuditCategory::ConfirmAction);
        Ok(record)
    }

    pub fn decline(&self, session: &mut Session) -> Result<CancellationRecord> {
        let record = session.decline()?;
        tracing::info!(session = %session.id(), intent = %record.task, "Action cancelled");
        self.record("CANCEL_ACTION", &record, AuditCategory::CancelAction);
        Ok(record)
    }

    async fn resolve(&self, query: &str) -> Result<ComposedAnswer> {
        let mut question = strip_task_language(query);
        if question.is_empty() {
            question = GENERIC_QUESTION.to_string();
        }

        let lookup = self
            .bounded(self.locator.locate(query, self.index.as_ref()))
            .await??;

        match lookup {
            PageLookup::NoContent { printed } => Ok(ComposedAnswer {
                text: no_content_message(&printed),
                sources: Vec::new(),
            }),
            PageLookup::Found {
                printed, chunks, ..
            } => {
                self.composer
                    .compose(&chunks, &question, ChunkSource::PrintedPage(printed))
                    .await
            }
            PageLookup::NotReferenced => {
                let chunks = self
                    .bounded(self.index.search(query, self.top_k))
                    .await?
                    .map_err(|e| AssistantError::Retrieval(e.to_string()))?;
                tracing::debug!(results = chunks.len(), "Search returned chunks");
                self.composer
                    .compose(&chunks, &question, ChunkSource::Search)
                    .await
            }
        }
    }

    async fn bounded<F: std::future::Future>(&self, fut: F) -> Result<F::Output> {
        tokio::time::timeout(self.retrieval_timeout, fut)
            .await
            .map_err(|_| {
                tracing::error!(timeout = ?self.retrieval_timeout, "Retrieval timed out");
                AssistantError::Retrieval(format!(
                    "no response within {:?}",
                    self.retrieval_timeout
                ))
            })
    }

    fn record<T: Serialize>(&self, query: &str, response: &T, category: AuditCategory) {
        match serde_json::to_value(response) {
            Ok(value) => self.audit.append(AuditEntry::new(query, value, category)),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize audit entry"),
        }
    }
}

fn failure_notice(error: &AssistantError) -> &'static str {
    if error.is_retryable() {
        "The report service is temporarily unavailable. Please try again."
    } else {
        "Something went wrong while answering. Please try again."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TaskIntent;
    use crate::audit::MemoryAuditLog;
    use crate::types::DocumentChunk;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Deterministic generator that echoes the question it was given
    #[derive(Default)]
    struct EchoGenerator {
        questions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationService for EchoGenerator {
        async fn generate(&self, _: &str, _: &str, question: &str) -> anyhow::Result<String> {
            self.questions.lock().push(question.to_string());
            Ok(format!("Answer to: {}", question))
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl GenerationService for DownGenerator {
        async fn generate(&self, _: &str, _: &str, _: &str) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// Index whose calls never complete within the retrieval timeout
    struct HangingIndex;

    #[async_trait]
    impl DocumentIndex for HangingIndex {
        async fn search(&self, _: &str, _: usize) -> anyhow::Result<Vec<DocumentChunk>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn fetch_by_page(&self, _: u32) -> anyhow::Result<Vec<DocumentChunk>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl DocumentIndex for BrokenIndex {
        async fn search(&self, _: &str, _: usize) -> anyhow::Result<Vec<DocumentChunk>> {
            Err(anyhow::anyhow!("index segment missing"))
        }

        async fn fetch_by_page(&self, _: u32) -> anyhow::Result<Vec<DocumentChunk>> {
            Err(anyhow::anyhow!("index segment missing"))
        }
    }

    fn chunks() -> Vec<DocumentChunk> {
        vec![
            DocumentChunk::new("Revenue for FY24 was $13.3 billion.", 15),
            DocumentChunk::new("FY24 revenue by segment and vertical.", 11),
            DocumentChunk::new("Revenue growth guidance for FY25.", 15),
            DocumentChunk::new("Message from the Chairperson.", 12),
            DocumentChunk::new("Sustainability highlights.", 12),
            DocumentChunk::new("IT ticket volumes fell year on year.", 20),
        ]
    }

    fn assistant_with(
        generator: Arc<dyn GenerationService>,
    ) -> (Assistant, Arc<MemoryAuditLog>) {
        let config = AssistantConfig::default();
        let audit = Arc::new(MemoryAuditLog::new());
        let index = Arc::new(ChunkIndex::from_chunks(chunks()).unwrap());
        let assistant = Assistant::new(&config, index, generator, audit.clone());
        (assistant, audit)
    }

    #[tokio::test]
    async fn test_empty_printed_page_message() {
        let generator = Arc::new(EchoGenerator::default());
        let (assistant, _) = assistant_with(generator.clone());
        let mut session = Session::new();

        let envelope = assistant.answer("What is on page 10?", &mut session).await.unwrap();

        assert_eq!(envelope.text(), "No content found for printed page 10.");
        assert!(generator.questions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_printed_page_answer_cites_printed_page() {
        let generator = Arc::new(EchoGenerator::default());
        let (assistant, _) = assistant_with(generator.clone());
        let mut session = Session::new();

        let envelope = assistant
            .answer("Summarize page 3 and schedule a meeting with HR at 2pm", &mut session)
            .await
            .unwrap();

        match &envelope {
            ResponseEnvelope::Answer {
                data,
                sources,
                action,
            } => {
                assert_eq!(sources, &vec!["Printed Page 3".to_string()]);
                assert!(data.ends_with("Sources: ['Printed Page 3']"));
                let action = action.as_ref().unwrap();
                assert_eq!(action.intent, TaskIntent::ScheduleMeeting);
                assert_eq!(action.parameter("time"), Some("2pm"));
            }
            other => panic!("expected answer, got {:?}", other),
        }

        let questions = generator.questions.lock();
        assert_eq!(questions.len(), 1);
        assert!(!questions[0].to_lowercase().contains("schedule"));
        assert!(session.is_awaiting_confirmation());
    }

    #[tokio::test]
    async fn test_search_sources_sorted_and_unique() {
        let (assistant, _) = assistant_with(Arc::new(EchoGenerator::default()));
        let mut session = Session::new();

        let envelope = assistant
            .answer("What was FY24 revenue?", &mut session)
            .await
            .unwrap();

        match envelope {
            ResponseEnvelope::Answer {
                sources, action, ..
            } => {
                assert_eq!(sources, vec!["Page 11", "Page 15"]);
                assert!(action.is_none());
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert!(!session.is_awaiting_confirmation());
    }

    #[tokio::test]
    async fn test_answer_is_idempotent() {
        let (assistant, _) = assistant_with(Arc::new(EchoGenerator::default()));
        let mut session = Session::new();

        let first = assistant.answer("FY24 revenue", &mut session).await.unwrap();
        let second = assistant.answer("FY24 revenue", &mut session).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_bare_yes_while_idle_is_a_normal_query() {
        let (assistant, _) = assistant_with(Arc::new(EchoGenerator::default()));
        let mut session = Session::new();

        let envelope = assistant.answer("yes", &mut session).await.unwrap();
        assert!(matches!(envelope, ResponseEnvelope::Answer { .. }));
    }

    #[tokio::test]
    async fn test_bare_confirm_word_while_pending_is_intercepted() {
        let generator = Arc::new(EchoGenerator::default());
        let (assistant, audit) = assistant_with(generator.clone());
        let mut session = Session::new();

        assistant
            .answer("raise ticket Outlook crashes", &mut session)
            .await
            .unwrap();
        let calls_before = generator.questions.lock().len();

        let envelope = assistant.answer("  Yes ", &mut session).await.unwrap();
        assert_eq!(
            envelope,
            ResponseEnvelope::SystemNotice {
                data: USE_CONTROLS_NOTICE.to_string()
            }
        );
        assert_eq!(generator.questions.lock().len(), calls_before);
        assert_eq!(
            session.pending().unwrap().intent,
            TaskIntent::RaiseItTicket
        );
        assert_eq!(
            audit.entries().last().unwrap().category,
            AuditCategory::SystemNotice
        );
    }

    #[tokio::test]
    async fn test_confirm_handshake_and_audit_trail() {
        let (assistant, audit) = assistant_with(Arc::new(EchoGenerator::default()));
        let mut session = Session::new();

        assert!(matches!(
            assistant.confirm(&mut session),
            Err(AssistantError::InvalidState { .. })
        ));

        assistant
            .answer("Schedule a meeting with HR, what was revenue in FY24?", &mut session)
            .await
            .unwrap();
        let record = assistant.confirm(&mut session).unwrap();
        assert_eq!(record.intent, TaskIntent::ScheduleMeeting);
        assert_eq!(record.parameters["department"], "HR");
        assert!(assistant.confirm(&mut session).is_err());

        assistant.answer("cancel meeting", &mut session).await.unwrap();
        let cancelled = assistant.decline(&mut session).unwrap();
        assert_eq!(cancelled.task, TaskIntent::CancelMeeting);

        let categories: Vec<_> = audit.entries().iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![
                AuditCategory::Answer,
                AuditCategory::ConfirmAction,
                AuditCategory::Answer,
                AuditCategory::CancelAction,
            ]
        );
        assert_eq!(audit.entries()[1].query, "CONFIRM_ACTION");
    }

    #[tokio::test]
    async fn test_task_only_query_uses_generic_question() {
        let generator = Arc::new(EchoGenerator::default());
        let (assistant, _) = assistant_with(generator.clone());

        let mut session = Session::new();
        let envelope = assistant
            .answer("schedule a meeting about page 3", &mut session)
            .await
            .unwrap();
        assert!(envelope.action().is_some());

        let mut session = Session::new();
        let envelope = assistant.answer("Raise an IT ticket", &mut session).await.unwrap();
        assert_eq!(envelope.action().unwrap().intent, TaskIntent::RaiseItTicket);

        let questions = generator.questions.lock();
        assert_eq!(*questions, vec!["About page 3".to_string(), GENERIC_QUESTION.to_string()]);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_session_idle() {
        let (assistant, audit) = assistant_with(Arc::new(DownGenerator));
        let mut session = Session::new();

        let err = assistant
            .answer("schedule a meeting, what was FY24 revenue?", &mut session)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!session.is_awaiting_confirmation());
        assert_eq!(audit.entries()[0].category, AuditCategory::Error);

        let envelope = assistant
            .respond("what was FY24 revenue?", &mut session)
            .await;
        assert!(matches!(envelope, ResponseEnvelope::SystemNotice { .. }));
        assert!(!envelope.text().contains("connection refused"));
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = ResponseEnvelope::Answer {
            data: "text".to_string(),
            sources: vec!["Page 2".to_string()],
            action: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "answer");
        assert!(json.get("action").is_none());

        let notice = serde_json::to_value(ResponseEnvelope::SystemNotice {
            data: "n".to_string(),
        })
        .unwrap();
        assert_eq!(notice, serde_json::json!({"type": "system_notice", "data": "n"}));
    }

    #[tokio::test]
    async fn test_retrieval_timeout_is_retryable_and_keeps_session_idle() {
        let mut config = AssistantConfig::default();
        config.retrieval.timeout_secs = 1;
        let generator = Arc::new(EchoGenerator::default());
        let audit = Arc::new(MemoryAuditLog::new());
        let assistant = Assistant::new(
            &config,
            Arc::new(HangingIndex),
            generator.clone(),
            audit.clone(),
        );
        let mut session = Session::new();

        let err = assistant
            .answer("Schedule a meeting with HR, what was FY24 revenue?", &mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::Retrieval(_)));
        assert!(err.is_retryable());
        assert!(!session.is_awaiting_confirmation());
        assert!(generator.questions.lock().is_empty());
        assert_eq!(audit.entries()[0].category, AuditCategory::Error);
    }

    #[tokio::test]
    async fn test_retrieval_failure_surfaces_as_retrieval_error() {
        let config = AssistantConfig::default();
        let assistant = Assistant::new(
            &config,
            Arc::new(BrokenIndex),
            Arc::new(EchoGenerator::default()),
            Arc::new(MemoryAuditLog::new()),
        );
        let mut session = Session::new();

        let err = assistant
            .answer("raise ticket VPN drops, what was FY24 revenue?", &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Retrieval(_)));
        assert!(!session.is_awaiting_confirmation());

        let err = assistant.answer("Summarize page 3", &mut session).await.unwrap_err();
        assert!(matches!(err, AssistantError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_unmappable_page_answers_no_content() {
        let generator = Arc::new(EchoGenerator::default());
        let (assistant, _) = assistant_with(generator.clone());
        let mut session = Session::new();

        let envelope = assistant
            .answer("Summarize page 99999999999", &mut session)
            .await
            .unwrap();
        assert_eq!(
            envelope.text(),
            "No content found for printed page 99999999999."
        );

        let mut config = AssistantConfig::default();
        config.document.page_offset = -20;
        let assistant = Assistant::new(
            &config,
            Arc::new(ChunkIndex::from_chunks(chunks()).unwrap()),
            generator.clone(),
            Arc::new(MemoryAuditLog::new()),
        );
        let envelope = assistant.answer("What is on page 3?", &mut session).await.unwrap();
        assert_eq!(envelope.text(), "No content found for printed page 3.");
        assert!(generator.questions.lock().is_empty());
    }
}
