use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, STORED, TEXT, Value as TantivyValue};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use super::DocumentIndex;
use crate::types::DocumentChunk;

/// Ingestion output, either our own `{content, page}` records or the
/// `{page_content, metadata: {page}}` shape most Python loaders emit.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredChunk {
    Flat { content: String, page: u32 },
    Loader { page_content: String, metadata: LoaderMetadata },
}

#[derive(Deserialize)]
struct LoaderMetadata {
    page: u32,
}

impl From<StoredChunk> for DocumentChunk {
    fn from(stored: StoredChunk) -> Self {
        match stored {
            StoredChunk::Flat { content, page } => DocumentChunk::new(content, page),
            StoredChunk::Loader {
                page_content,
                metadata,
            } => DocumentChunk::new(page_content, metadata.page),
        }
    }
}

/// Handles onto the tantivy index. Cloning is cheap, so a copy can move onto
/// the blocking pool for each search.
#[derive(Clone)]
struct TextIndex {
    index: Index,
    reader: IndexReader,
    ordinal_field: schema::Field,
    text_field: schema::Field,
}

impl TextIndex {
    fn build_schema() -> (Schema, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let ordinal_field = sb.add_u64_field("ordinal", STORED);
        let text_field = sb.add_text_field("text", TEXT);
        (sb.build(), ordinal_field, text_field)
    }

    fn build(chunks: &[DocumentChunk]) -> Result<Self> {
        let (schema, ordinal_field, text_field) = Self::build_schema();
        let index = Index::create_in_ram(schema);

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, 50_000_000)
            .context("Failed to create Tantivy writer")?;
        for (ordinal, chunk) in chunks.iter().enumerate() {
            writer.add_document(doc!(
                ordinal_field => ordinal as u64,
                text_field => chunk.content.as_str(),
            ))?;
        }
        writer.commit().context("Tantivy commit failed")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create Tantivy reader")?;

        Ok(Self {
            index,
            reader,
            ordinal_field,
            text_field,
        })
    }

    /// Ordinals of the top `k` chunks for `query`, best first.
    fn ranked(&self, query: &str, k: usize) -> Result<Vec<usize>> {
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (parsed_query, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(query = %query, errors = errors.len(), "Lenient query parse dropped terms");
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(k))?;

        let mut ordinals = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(address)?;
            if let Some(ordinal) = doc.get_first(self.ordinal_field).and_then(|v| v.as_u64()) {
                ordinals.push(ordinal as usize);
            }
        }
        Ok(ordinals)
    }
}

/// In-memory chunk store with a BM25 full-text index over chunk content.
///
/// Searches run on the blocking pool so a slow query never stalls the async
/// workers and the caller's timeout can still fire.
pub struct ChunkIndex {
    chunks: Vec<DocumentChunk>,
    text: TextIndex,
}

impl ChunkIndex {
    /// Load the chunk file written by the ingestion job and index it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chunk file {}", path.display()))?;
        let stored: Vec<StoredChunk> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse chunk file {}", path.display()))?;

        let chunks: Vec<DocumentChunk> = stored.into_iter().map(DocumentChunk::from).collect();
        tracing::info!(path = %path.display(), chunks = chunks.len(), "Loaded report chunks");
        Self::from_chunks(chunks)
    }

    pub fn from_chunks(chunks: Vec<DocumentChunk>) -> Result<Self> {
        let text = TextIndex::build(&chunks)?;
        Ok(Self { chunks, text })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl DocumentIndex for ChunkIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let text = self.text.clone();
        let query = query.to_string();
        let ordinals = tokio::task::spawn_blocking(move || text.ranked(&query, k))
            .await
            .context("Search task failed")??;

        Ok(ordinals
            .into_iter()
            .filter_map(|i| self.chunks.get(i).cloned())
            .collect())
    }

    async fn fetch_by_page(&self, page: u32) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .chunks
            .iter()
            .filter(|chunk| chunk.page == page)
            .cloned()
            .collect())
    }
}
