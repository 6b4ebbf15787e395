//! Append-only interaction log
//!
//! Every query, its envelope and every confirmation outcome is appended as one
//! JSON object per line. Sink failures are logged and never reach the caller.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Answer,
    SystemNotice,
    Error,
    ConfirmAction,
    CancelAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: serde_json::Value,
    #[serde(rename = "type")]
    pub category: AuditCategory,
}

impl AuditEntry {
    pub fn new(
        query: impl Into<String>,
        response: serde_json::Value,
        category: AuditCategory,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            response,
            category,
        }
    }
}

/// `append` runs inline on the async worker that answered the query, so
/// implementations must finish with a single short write and never wait on
/// the network.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

/// JSON Lines file sink. Each entry is written with a single `write_all` under
/// a lock, so concurrent appends never interleave.
pub struct JsonLinesAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesAuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;

        tracing::info!(path = %path.display(), "Audit log opened");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    fn write_entry(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.write_entry(&entry) {
            tracing::warn!(
                path = %self.path.display(),
                category = ?entry.category,
                error = %e,
                "Failed to append audit entry"
            );
        }
    }
}

/// Keeps entries in memory
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
