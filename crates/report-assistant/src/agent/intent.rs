//! Task Intent Extraction
//!
//! Keyword rules that turn an utterance into at most one proposed action.
//! Precedence is cancel meeting, then schedule meeting, then IT ticket.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::AssistantError;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s?(?:am|pm)").expect("time of day regex is valid"));

const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIntent {
    ScheduleMeeting,
    CancelMeeting,
    RaiseItTicket,
}

impl TaskIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleMeeting => "schedule_meeting",
            Self::CancelMeeting => "cancel_meeting",
            Self::RaiseItTicket => "raise_it_ticket",
        }
    }

    pub fn confirmation_prompt(&self) -> &'static str {
        match self {
            Self::ScheduleMeeting => "Do you want to schedule this meeting?",
            Self::CancelMeeting => "Do you want to cancel this meeting?",
            Self::RaiseItTicket => "Do you want to raise this IT ticket?",
        }
    }
}

impl fmt::Display for TaskIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action proposed from a query, awaiting explicit confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub intent: TaskIntent,
    pub parameters: BTreeMap<String, String>,
    #[serde(rename = "message")]
    pub confirmation_prompt: String,
}

impl PendingAction {
    fn new(intent: TaskIntent, parameters: BTreeMap<String, String>) -> Self {
        Self {
            intent,
            parameters,
            confirmation_prompt: intent.confirmation_prompt().to_string(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Detect a task in `query`. Matching is plain substring containment on a
/// lower-cased copy, so "three" counts as mentioning "hr".
pub fn extract_intent(query: &str) -> Option<PendingAction> {
    let q = query.to_lowercase();

    let intent = if q.contains("cancel") && q.contains("meeting") {
        TaskIntent::CancelMeeting
    } else if q.contains("schedule") && q.contains("meeting") {
        TaskIntent::ScheduleMeeting
    } else if q.contains("ticket") || q.contains("it issue") {
        TaskIntent::RaiseItTicket
    } else {
        return None;
    };

    let mut parameters = BTreeMap::new();
    match intent {
        TaskIntent::ScheduleMeeting | TaskIntent::CancelMeeting => {
            let department = if q.contains("hr") { "HR" } else { "General" };
            let time = TIME_RE
                .find(&q)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| UNSPECIFIED.to_string());
            parameters.insert("department".to_string(), department.to_string());
            parameters.insert("time".to_string(), time);
        }
        TaskIntent::RaiseItTicket => {
            let issue = ticket_issue(query).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Falling back to default ticket issue");
                UNSPECIFIED.to_string()
            });
            parameters.insert("issue".to_string(), issue);
        }
    }

    tracing::debug!(intent = %intent, ?parameters, "Detected task intent");
    Some(PendingAction::new(intent, parameters))
}

/// The original query minus the words "raise" and "ticket" (case-sensitive).
fn ticket_issue(query: &str) -> Result<String, AssistantError> {
    let issue = query.replace("raise", "").replace("ticket", "");
    let issue = issue.trim();
    if issue.is_empty() {
        return Err(AssistantError::MalformedIntentParameters { field: "issue" });
    }
    Ok(issue.to_string())
}
