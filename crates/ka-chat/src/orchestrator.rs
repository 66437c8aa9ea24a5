//! Query answering over the indexed corpus

use std::sync::Arc;
use tracing::{error, info};

use ka_core::{CacheStore, Embedder, GenerationConfig, LLMProvider, QueryAnswer, Result, preview};
use ka_rag::RetrievalService;

use crate::cache::ResponseCache;
use crate::prompt;

/// Answers queries from retrieved context, consulting the response cache first.
///
/// Only successful generations are cached. The "no documents" answer and
/// generation failures go back to the caller uncached, so a later query can
/// succeed once documents are indexed or the backend recovers.
pub struct ChatOrchestrator<E: Embedder, L: LLMProvider, S: CacheStore> {
    retrieval: Arc<RetrievalService<E>>,
    llm: L,
    cache: ResponseCache<S>,
    generation: GenerationConfig,
}

impl<E: Embedder, L: LLMProvider, S: CacheStore> ChatOrchestrator<E, L, S> {
    pub fn new(
        retrieval: Arc<RetrievalService<E>>,
        llm: L,
        cache: ResponseCache<S>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            retrieval,
            llm,
            cache,
            generation,
        }
    }

    pub fn retrieval(&self) -> &Arc<RetrievalService<E>> {
        &self.retrieval
    }

    pub fn cache(&self) -> &ResponseCache<S> {
        &self.cache
    }

    /// Answer `user_query`.
    ///
    /// Retrieval failures are returned as errors. Generation failures are not:
    /// they produce an error-message answer with the retrieved sources attached.
    pub async fn query(&self, user_query: &str) -> Result<QueryAnswer> {
        info!(query = %preview(user_query, 50), "processing query");

        if let Some(entry) = self.cache.get(user_query).await {
            info!("returning cached response");
            return Ok(QueryAnswer {
                answer: entry.answer,
                sources: entry.sources,
                cache_hit: true,
            });
        }

        let (context, sources) = self.retrieval.get_context_for_query(user_query).await?;
        if context.is_empty() {
            info!("no indexed documents to answer from");
            return Ok(QueryAnswer {
                answer: prompt::NO_DOCUMENTS.to_string(),
                sources: Vec::new(),
                cache_hit: false,
            });
        }

        let prompt = prompt::build_prompt(user_query, &context);

        match self.llm.generate_with_config(&prompt, &self.generation).await {
            Ok(result) => {
                let answer = result.text.trim().to_string();
                info!(
                    model = %result.model_id,
                    tokens = ?result.tokens_used,
                    sources = sources.len(),
                    "generated response"
                );
                self.cache
                    .put(user_query, &answer, &sources, self.cache.ttl())
                    .await;
                Ok(QueryAnswer {
                    answer,
                    sources,
                    cache_hit: false,
                })
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                Ok(QueryAnswer {
                    answer: prompt::generation_error(&e),
                    sources,
                    cache_hit: false,
                })
            }
        }
    }
}
