//! Local retrieval: embed the query, then search the vector store.

use crate::deadline::bounded;
use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::ScoredResult;
use ragbot_core::{AppError, AppResult, Upstream};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns a query into scored chunks.
///
/// Performs no retries or caching; collaborator failures and timeouts
/// surface as `UpstreamUnavailable`.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    embed_timeout: Duration,
    search_timeout: Duration,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, embed_timeout: Duration, search_timeout: Duration) -> Self {
        self.embed_timeout = embed_timeout;
        self.search_timeout = search_timeout;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Retrieve up to `limit` chunks for `query`, best first.
    ///
    /// # Errors
    /// `Validation` for a blank query or zero limit, `UpstreamUnavailable`
    /// when embedding or vector search fails.
    #[tracing::instrument(skip(self, query))]
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        document_filter: Option<&str>,
    ) -> AppResult<Vec<ScoredResult>> {
        if query.trim().is_empty() {
            return Err(AppError::validation("query must not be empty"));
        }
        if limit == 0 {
            return Err(AppError::validation("result limit must be greater than zero"));
        }

        let vector = bounded(
            Upstream::Embedding,
            self.embed_timeout,
            self.embedder.embed(query),
        )
        .await
        .map_err(|e| as_upstream(Upstream::Embedding, e))?;

        let hits = bounded(
            Upstream::VectorSearch,
            self.search_timeout,
            self.store.search(&vector, limit, document_filter),
        )
        .await
        .map_err(|e| as_upstream(Upstream::VectorSearch, e))?;

        let results: Vec<ScoredResult> = hits.into_iter().map(ScoredResult::from).collect();

        tracing::debug!(
            "Retrieved {} results, best score {:?}",
            results.len(),
            results.first().map(|r| r.score)
        );

        Ok(results)
    }
}

/// Collaborator errors that are not already typed are reported as
/// that collaborator being unavailable.
fn as_upstream(service: Upstream, err: AppError) -> AppError {
    match err {
        AppError::UpstreamUnavailable { .. } | AppError::Validation(_) => err,
        other => AppError::upstream(service, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;
    use crate::store::SqliteVectorStore;
    use crate::types::{Chunk, EmbeddedChunk};
    use chrono::Utc;

    async fn seeded() -> Retriever {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(256));
        let store = Arc::new(SqliteVectorStore::in_memory().unwrap());

        let texts = [
            "Rust ownership rules prevent data races at compile time.",
            "Sourdough bread needs a long fermentation.",
        ];
        let vectors = embedder
            .embed_batch(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let chunks: Vec<EmbeddedChunk> = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| EmbeddedChunk {
                chunk: Chunk::new(format!("c{}", i), i as u32, text.to_string(), Utc::now()),
                vector,
            })
            .collect();
        store.upsert("doc", &chunks).await.unwrap();

        Retriever::new(embedder, store)
    }

    #[tokio::test]
    async fn test_retrieve_ranks_relevant_first() {
        let retriever = seeded().await;
        let results = retriever
            .retrieve("How does rust ownership work?", 5, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c0");
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].document_id, "doc");
    }

    #[tokio::test]
    async fn test_retrieve_respects_limit() {
        let retriever = seeded().await;
        let results = retriever.retrieve("bread", 1, None).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_validates_input() {
        let retriever = seeded().await;
        assert!(matches!(
            retriever.retrieve("   ", 5, None).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            retriever.retrieve("query", 0, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_untyped_errors_become_upstream() {
        let err = as_upstream(Upstream::VectorSearch, AppError::Knowledge("disk".into()));
        assert!(err.is_upstream(Upstream::VectorSearch));

        let typed = AppError::upstream(Upstream::Embedding, "down");
        assert!(as_upstream(Upstream::VectorSearch, typed).is_upstream(Upstream::Embedding));
    }
}
