//! Per-conversation confirmation state
//!
//! A session holds at most one pending action. All transitions take `&mut self`,
//! so whoever owns the session is its only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::intent::{PendingAction, TaskIntent};
use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfirmationState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingAction),
}

/// Result of confirming a pending action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTaskRecord {
    pub intent: TaskIntent,
    pub parameters: BTreeMap<String, String>,
    pub message: String,
    pub status: TaskStatus,
    pub executed_at: DateTime<Utc>,
}

/// Result of declining a pending action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub status: TaskStatus,
    pub task: TaskIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    state: ConfirmationState,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ConfirmationState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        match &self.state {
            ConfirmationState::AwaitingConfirmation(action) => Some(action),
            ConfirmationState::Idle => None,
        }
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.pending().is_some()
    }

    /// Hold `action`, silently dropping any action that was still pending.
    pub fn hold(&mut self, action: PendingAction) {
        if let Some(previous) = self.pending() {
            tracing::debug!(
                session = %self.id,
                replaced = %previous.intent,
                "Replacing unconfirmed action"
            );
        }
        self.state = ConfirmationState::AwaitingConfirmation(action);
    }

    pub fn confirm(&mut self) -> Result<CompletedTaskRecord> {
        let action = self.take_pending("confirm")?;
        Ok(CompletedTaskRecord {
            intent: action.intent,
            parameters: action.parameters,
            message: action.confirmation_prompt,
            status: TaskStatus::Completed,
            executed_at: Utc::now(),
        })
    }

    pub fn decline(&mut self) -> Result<CancellationRecord> {
        let action = self.take_pending("cancel")?;
        Ok(CancellationRecord {
            status: TaskStatus::Cancelled,
            task: action.intent,
        })
    }

    fn take_pending(&mut self, operation: &'static str) -> Result<PendingAction> {
        match std::mem::take(&mut self.state) {
            ConfirmationState::AwaitingConfirmation(action) => Ok(action),
            ConfirmationState::Idle => Err(AssistantError::InvalidState { operation }),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::intent::extract_intent;

    fn schedule_action() -> PendingAction {
        extract_intent("schedule a meeting with HR at 4 pm").unwrap()
    }

    #[test]
    fn test_confirm_while_idle_is_invalid() {
        let mut session = Session::new();
        assert!(matches!(
            session.confirm(),
            Err(AssistantError::InvalidState { operation: "confirm" })
        ));
        assert!(matches!(
            session.decline(),
            Err(AssistantError::InvalidState { operation: "cancel" })
        ));
    }

    #[test]
    fn test_single_confirm_then_idle() {
        let mut session = Session::new();
        session.hold(schedule_action());
        assert!(session.is_awaiting_confirmation());

        let record = session.confirm().unwrap();
        assert_eq!(record.intent, TaskIntent::ScheduleMeeting);
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.parameters["time"], "4 pm");
        assert_eq!(*session.state(), ConfirmationState::Idle);

        assert!(session.confirm().is_err());
    }

    #[test]
    fn test_decline_records_intent_only() {
        let mut session = Session::new();
        session.hold(extract_intent("raise ticket screen flicker").unwrap());

        let record = session.decline().unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"status": "cancelled", "task": "raise_it_ticket"}));
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_new_action_replaces_pending_one() {
        let mut session = Session::with_id("s-1");
        session.hold(schedule_action());
        session.hold(extract_intent("cancel meeting").unwrap());

        assert_eq!(session.pending().unwrap().intent, TaskIntent::CancelMeeting);
        assert_eq!(session.confirm().unwrap().intent, TaskIntent::CancelMeeting);
        assert!(session.confirm().is_err());
    }

    #[test]
    fn test_completed_record_serializes_status() {
        let mut session = Session::new();
        session.hold(schedule_action());
        let json = serde_json::to_value(session.confirm().unwrap()).unwrap();

        assert_eq!(json["status"], "completed");
        assert_eq!(json["intent"], "schedule_meeting");
        assert!(json["executed_at"].is_string());
    }
}
