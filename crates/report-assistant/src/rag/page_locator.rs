//! Printed Page Lookup
//!
//! Queries such as "what is on page 10?" bypass ranked search. The printed number
//! is shifted by the document's front-matter offset to get the internal page
//! index, and every chunk on that page is fetched by exact match.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{AssistantError, Result};
use crate::search::DocumentIndex;
use crate::types::DocumentChunk;

static PAGE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)page\s+(\d+)").expect("page reference regex is valid"));

/// Outcome of looking for a printed-page reference in a query
#[derive(Debug, Clone, PartialEq)]
pub enum PageLookup {
    /// No "page N" in the query; ranked search should be used
    NotReferenced,
    /// A page was referenced but it holds no chunks, or could not be mapped
    NoContent { printed: String },
    Found {
        printed: u32,
        internal: u32,
        chunks: Vec<DocumentChunk>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PageLocator {
    offset: i64,
}

impl PageLocator {
    pub fn new(offset: i64) -> Self {
        Self { offset }
    }

    /// The digits of the first "page N" reference, as written.
    pub fn printed_reference(query: &str) -> Option<&str> {
        PAGE_REF_RE
            .captures(query)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Map a printed page number to the internal page index.
    pub fn internal_index(&self, printed: &str) -> Result<(u32, u32)> {
        let invalid = || AssistantError::InvalidPageReference {
            printed: printed.to_string(),
        };

        let printed_num: u32 = printed.parse().map_err(|_| invalid())?;
        let internal = i64::from(printed_num)
            .checked_add(self.offset)
            .ok_or_else(invalid)?;
        let internal = u32::try_from(internal).map_err(|_| invalid())?;
        Ok((printed_num, internal))
    }

    pub async fn locate(&self, query: &str, index: &dyn DocumentIndex) -> Result<PageLookup> {
        let Some(printed) = Self::printed_reference(query) else {
            return Ok(PageLookup::NotReferenced);
        };

        let (printed_num, internal) = match self.internal_index(printed) {
            Ok(mapped) => mapped,
            Err(e) => {
                tracing::warn!(error = %e, "Unmappable page reference");
                return Ok(PageLookup::NoContent {
                    printed: printed.to_string(),
                });
            }
        };

        let chunks = index
            .fetch_by_page(internal)
            .await
            .map_err(|e| AssistantError::Retrieval(e.to_string()))?;

        tracing::debug!(
            printed = printed_num,
            internal,
            chunks = chunks.len(),
            "Resolved printed page reference"
        );

        if chunks.is_empty() {
            return Ok(PageLookup::NoContent {
                printed: printed_num.to_string(),
            });
        }

        Ok(PageLookup::Found {
            printed: printed_num,
            internal,
            chunks,
        })
    }
}

/// Rendered answer for a referenced page with nothing on it.
pub fn no_content_message(printed: &str) -> String {
    format!("No content found for printed page {}.", printed)
}
