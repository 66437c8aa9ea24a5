//! Retrieval service: indexing, similarity search and context building

use futures::{StreamExt, TryStreamExt, stream};
use serde_json::json;
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use ka_core::{
    Chunk, Document, Embedder, Error, RagConfig, Result, SourceReference, check_dimension, preview,
};

use crate::chunker;
use crate::index::{ChunkStore, FlatL2Index};
use crate::persistence;

/// Separator placed between chunks in the generation context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Row counts of the index pair, for stats and invariant checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounts {
    pub vectors: usize,
    pub chunks: usize,
    pub documents: usize,
}

struct IndexState {
    index: FlatL2Index,
    store: ChunkStore,
}

/// Indexes documents into a flat vector index and answers similarity queries.
///
/// The vector index and chunk store sit behind a single lock and are only ever
/// mutated together, so every reader sees them with equal row counts. Indexing
/// calls are serialized by a separate writer mutex held from chunking until the
/// batch is persisted, which leaves searches free to run while a document's
/// chunks are being embedded.
pub struct RetrievalService<E: Embedder> {
    embedder: E,
    config: RagConfig,
    state: RwLock<IndexState>,
    writer: Mutex<()>,
}

/// Similarity in (0, 1], strictly decreasing in squared distance.
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

impl<E: Embedder> RetrievalService<E> {
    /// Create the service, loading any persisted index from `config.index_dir`.
    pub fn new(embedder: E, config: RagConfig) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.embedding_dimension {
            return Err(Error::Configuration(format!(
                "embedder {} produces dimension {}, configured dimension is {}",
                embedder.model_name(),
                embedder.dimension(),
                config.embedding_dimension
            )));
        }

        let (index, store) =
            persistence::load_or_empty(&config.index_dir, config.embedding_dimension);

        Ok(Self {
            embedder,
            config,
            state: RwLock::new(IndexState { index, store }),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Chunk, embed and append a document as one batch, then persist.
    ///
    /// Returns a reference of the form `doc_{id}_{chunks}_chunks`. On any failure
    /// the in-memory index and chunk store are left exactly as they were.
    pub async fn index_document(
        &self,
        document_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<String> {
        let _writer = self.writer.lock().await;
        info!(document_id, filename, "indexing document");

        let texts = chunker::split(content, self.config.chunk_size, self.config.chunk_overlap)
            .map_err(|e| Error::indexing(document_id, e))?;
        if texts.is_empty() {
            return Err(Error::indexing(
                document_id,
                Error::InvalidInput("document has no content".to_string()),
            ));
        }
        info!(document_id, chunks = texts.len(), "split document into chunks");

        let vectors = self
            .embed_all(&texts)
            .await
            .map_err(|e| Error::indexing(document_id, e))?;

        let mut state = self.state.write().await;
        let rows_before = state.index.size();

        state
            .index
            .append(&vectors)
            .map_err(|e| Error::indexing(document_id, e))?;
        for (chunk_index, content) in texts.into_iter().enumerate() {
            state.store.append(Chunk {
                document_id: document_id.to_string(),
                filename: filename.to_string(),
                chunk_index,
                content,
            });
        }

        if let Err(e) = persistence::save_pair(&self.config.index_dir, &state.index, &state.store) {
            state.index.truncate(rows_before);
            state.store.truncate(rows_before);
            if let Err(restore) =
                persistence::save_pair(&self.config.index_dir, &state.index, &state.store)
            {
                warn!(error = %restore, "could not restore persisted index after failed save");
            }
            return Err(Error::indexing(document_id, e));
        }

        debug_assert_eq!(state.index.size(), state.store.size());
        let reference = format!("doc_{}_{}_chunks", document_id, vectors.len());
        info!(reference = %reference, rows = state.index.size(), "indexed document");
        Ok(reference)
    }

    /// Index an extracted [`Document`], see [`RetrievalService::index_document`].
    pub async fn index(&self, document: &Document) -> Result<String> {
        self.index_document(&document.id, &document.filename, &document.content)
            .await
    }

    /// Embed every chunk with bounded parallelism, keeping chunk order.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dimension = self.config.embedding_dimension;

        stream::iter(texts.iter().cloned().enumerate())
            .map(|(i, text)| async move {
                debug!(chunk = i, "embedding chunk");
                let vector = self.embedder.embed(&text).await?;
                check_dimension(&vector, dimension)?;
                Ok::<_, Error>(vector)
            })
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await
    }

    /// The `k` chunks closest to `query`, most similar first.
    ///
    /// An empty index yields an empty result without calling the embedder.
    pub async fn search_similar(&self, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        if self.state.read().await.index.is_empty() {
            warn!("vector index is empty, no documents to search");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        check_dimension(&query_vector, self.config.embedding_dimension)?;

        let state = self.state.read().await;
        let results = state
            .index
            .search(&query_vector, k)?
            .into_iter()
            .map(|(row, distance)| Ok((state.store.get(row)?.clone(), similarity(distance))))
            .collect::<Result<Vec<_>>>()?;

        info!(
            results = results.len(),
            query = %preview(query, 50),
            "found similar chunks"
        );
        Ok(results)
    }

    /// Context text and deduplicated sources for `query`.
    ///
    /// Returns `("", [])` when nothing is indexed.
    pub async fn get_context_for_query(
        &self,
        query: &str,
    ) -> Result<(String, Vec<SourceReference>)> {
        let similar = self.search_similar(query, self.config.top_k).await?;
        Ok(build_context(&similar))
    }

    pub async fn counts(&self) -> IndexCounts {
        let state = self.state.read().await;
        IndexCounts {
            vectors: state.index.size(),
            chunks: state.store.size(),
            documents: state.store.document_count(),
        }
    }

    /// Get statistics about the index
    pub async fn stats(&self) -> serde_json::Value {
        let counts = self.counts().await;
        json!({
            "vectors": counts.vectors,
            "chunks": counts.chunks,
            "documents": counts.documents,
            "dimension": self.config.embedding_dimension,
            "embedding_model": self.embedder.model_name(),
            "chunk_size": self.config.chunk_size,
            "chunk_overlap": self.config.chunk_overlap,
        })
    }
}

/// Join chunk contents and collect one source per document, best chunk first.
pub fn build_context(similar: &[(Chunk, f32)]) -> (String, Vec<SourceReference>) {
    if similar.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut parts = Vec::with_capacity(similar.len());

    for (chunk, score) in similar {
        parts.push(chunk.content.as_str());
        if seen.insert(chunk.document_id.as_str()) {
            sources.push(SourceReference {
                document_id: chunk.document_id.clone(),
                filename: chunk.filename.clone(),
                relevance_score: *score,
            });
        }
    }

    (parts.join(CONTEXT_SEPARATOR), sources)
}
