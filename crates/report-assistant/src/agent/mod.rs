//! Task proposals - intent detection and the per-session confirmation handshake

pub mod intent;
pub mod session;

pub use intent::{extract_intent, PendingAction, TaskIntent};
pub use session::{
    CancellationRecord, CompletedTaskRecord, ConfirmationState, Session, TaskStatus,
};
