use thiserror::Error;

/// Failures at the assistant's boundary.
///
/// `EmptyContext`, `InvalidPageReference` and `MalformedIntentParameters` are
/// recovered inside the pipeline and never reach a caller of
/// [`crate::Assistant::answer`]. The remaining variants are surfaced.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no document content available to answer from")]
    EmptyContext,

    #[error("page reference '{printed}' does not map to a document page")]
    InvalidPageReference { printed: String },

    #[error("generation service failed: {0}")]
    GenerationService(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("no pending action to {operation}")]
    InvalidState { operation: &'static str },

    #[error("intent parameter '{field}' was empty")]
    MalformedIntentParameters { field: &'static str },
}

impl AssistantError {
    /// Whether the same request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationService(_) | Self::Retrieval(_))
    }
}

pub type Result<T, E = AssistantError> = std::result::Result<T, E>;
