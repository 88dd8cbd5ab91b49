//! Vector storage for embedded chunks.
//!
//! The store persists one point per chunk and answers nearest-neighbour
//! queries. Scores are cosine similarities, bounded in `[-1, 1]`.

mod sqlite;

pub use sqlite::SqliteVectorStore;

use crate::types::{EmbeddedChunk, VectorHit};
use ragbot_core::AppResult;

/// Trait for vector storage backends.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend identifier for logs and health output.
    fn backend_name(&self) -> &str;

    /// Insert or replace the points of a document's chunks.
    ///
    /// Returns the number of points written.
    async fn upsert(&self, document_id: &str, chunks: &[EmbeddedChunk]) -> AppResult<usize>;

    /// Nearest neighbours of `query`, best first, at most `limit` hits.
    ///
    /// With a `document_filter` only that document's chunks are considered.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        document_filter: Option<&str>,
    ) -> AppResult<Vec<VectorHit>>;

    /// Remove every point belonging to a document.
    async fn delete_document(&self, document_id: &str) -> AppResult<usize>;

    /// Total number of stored points.
    async fn count(&self) -> AppResult<usize>;
}
