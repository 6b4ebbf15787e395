pub mod chunk_index;

pub use chunk_index::ChunkIndex;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::DocumentChunk;

/// Read access to the ingested report.
///
/// `search` is ranked retrieval over the whole document; `fetch_by_page` is an
/// exact match on the internal page index and must return every chunk of that
/// page in document order.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>>;

    async fn fetch_by_page(&self, page: u32) -> Result<Vec<DocumentChunk>>;
}
