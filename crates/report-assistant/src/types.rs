use serde::{Deserialize, Serialize};

/// A span of extracted report content tagged with its internal page index.
///
/// `page` is the zero-based position of the page inside the ingested PDF, not the
/// number printed on the page. See [`crate::rag::page_locator`] for the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub page: u32,
}

impl DocumentChunk {
    pub fn new(content: impl Into<String>, page: u32) -> Self {
        Self {
            content: content.into(),
            page,
        }
    }
}

/// Where a set of chunks came from. Drives context formatting and citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// Ranked results from the search index
    Search,
    /// Every chunk of one page, looked up by its printed page number
    PrintedPage(u32),
}

/// Answer text plus the citation labels already rendered into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedAnswer {
    pub text: String,
    pub sources: Vec<String>,
}
