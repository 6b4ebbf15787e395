//! Task Language Stripping
//!
//! Removes task-oriented phrases ("schedule a meeting", "raise ticket", ...) from a
//! user query so that only the document question reaches the generation service.

/// Phrases removed from the query, applied in this order.
///
/// "raise an it ticket" must run before "it ticket", otherwise "raise an" is left behind.
const TASK_PHRASES: &[&str] = &[
    "schedule a meeting",
    "schedule meeting",
    "cancel the meeting",
    "cancel meeting",
    "raise an it ticket",
    "raise ticket",
    "it ticket",
    "schedule a call",
    "book a meeting",
];

const EDGE_TRIM: &[char] = &[' ', '?', '.'];

/// Lower-case the query, drop every task phrase, trim edge punctuation and
/// capitalize the first letter. Returns an empty string when nothing but task
/// language was present.
pub fn strip_task_language(query: &str) -> String {
    let mut cleaned = query.to_lowercase();
    for phrase in TASK_PHRASES {
        cleaned = cleaned.replace(phrase, "");
    }

    capitalize(cleaned.trim_matches(EDGE_TRIM))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
