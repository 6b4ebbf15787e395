pub mod agent;
pub mod assistant;
pub mod audit;
pub mod config;
pub mod error;
pub mod llm;
pub mod rag;
pub mod resources;
pub mod search;
pub mod types;

// Re-export primary types for convenience
pub use assistant::{Assistant, ResponseEnvelope};
pub use config::AssistantConfig;
pub use error::AssistantError;
pub use types::{ChunkSource, ComposedAnswer, DocumentChunk};

pub use agent::{CancellationRecord, CompletedTaskRecord, PendingAction, Session, TaskIntent};
pub use audit::{AuditEntry, AuditSink, JsonLinesAuditLog, MemoryAuditLog};
pub use llm::{ApiProvider, ExternalGenerator, GenerationService};
pub use search::{ChunkIndex, DocumentIndex};
