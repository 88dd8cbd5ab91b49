//! SQLite-backed vector store for knowledge chunks.

use super::VectorStore;
use crate::types::{ChunkPayload, EmbeddedChunk, VectorHit};
use ragbot_core::{AppError, AppResult, Upstream};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    length INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;

fn store_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::upstream(Upstream::VectorSearch, format!("{}: {}", context, e))
}

/// Vector store keeping embeddings as little-endian f32 blobs in SQLite.
///
/// Search is an exact scan scoring every candidate row. The connection
/// sits behind a mutex and all queries run on the blocking thread pool,
/// so one handle can be shared by concurrent requests.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("location", &self.location)
            .finish()
    }
}

impl SqliteVectorStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create vector store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| store_error("Failed to open SQLite vector store", e))?;

        tracing::debug!("Opened SQLite vector store at {:?}", db_path);
        Self::init(conn, db_path.display().to_string())
    }

    /// A private store that lives as long as the handle.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_error("Failed to open in-memory vector store", e))?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| store_error("Failed to create tables", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    /// Database location, `:memory:` for in-memory stores.
    pub fn location(&self) -> PathBuf {
        PathBuf::from(&self.location)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| store_error("Vector store lock poisoned", "a writer panicked"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| store_error("Vector store task failed", e))?
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    async fn upsert(&self, document_id: &str, chunks: &[EmbeddedChunk]) -> AppResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let document_id = document_id.to_string();
        let rows: Vec<(String, i64, String, i64, String, Vec<u8>)> = chunks
            .iter()
            .map(|c| {
                (
                    c.chunk.id.clone(),
                    c.chunk.index as i64,
                    c.chunk.text.clone(),
                    c.chunk.length as i64,
                    c.chunk.created_at.to_rfc3339(),
                    embedding_to_bytes(&c.vector),
                )
            })
            .collect();

        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| store_error("Failed to begin transaction", e))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO chunks
                         (id, document_id, chunk_index, text, length, created_at, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .map_err(|e| store_error("Failed to prepare insert", e))?;

                for (id, index, text, length, created_at, embedding) in &rows {
                    stmt.execute(params![
                        id,
                        document_id,
                        index,
                        text,
                        length,
                        created_at,
                        embedding
                    ])
                    .map_err(|e| store_error("Failed to insert chunk", e))?;
                }
            }
            tx.commit()
                .map_err(|e| store_error("Failed to commit chunks", e))?;

            tracing::debug!("Upserted {} chunks for document {}", rows.len(), document_id);
            Ok(rows.len())
        })
        .await
    }

    #[tracing::instrument(skip(self, query), fields(dims = query.len()))]
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        document_filter: Option<&str>,
    ) -> AppResult<Vec<VectorHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = query.to_vec();
        let filter = document_filter.map(str::to_string);

        self.with_conn(move |conn| {
            let (sql, args): (&str, Vec<String>) = match filter {
                Some(doc) => (
                    "SELECT id, document_id, chunk_index, text, embedding FROM chunks WHERE document_id = ?1",
                    vec![doc],
                ),
                None => (
                    "SELECT id, document_id, chunk_index, text, embedding FROM chunks",
                    Vec::new(),
                ),
            };

            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| store_error("Failed to prepare query", e))?;

            let rows = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                })
                .map_err(|e| store_error("Failed to query chunks", e))?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, document_id, chunk_index, text, blob) =
                    row.map_err(|e| store_error("Failed to read chunk row", e))?;

                let embedding = bytes_to_embedding(&blob)?;
                if embedding.len() != query.len() {
                    tracing::debug!(
                        "Skipping chunk {} with {} dims (query has {})",
                        id,
                        embedding.len(),
                        query.len()
                    );
                    continue;
                }

                hits.push(VectorHit {
                    id,
                    score: cosine_similarity(&query, &embedding),
                    payload: ChunkPayload {
                        document_id,
                        chunk_index: chunk_index as u32,
                        text,
                    },
                });
            }

            // Sort by score descending
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(limit);

            tracing::debug!("Retrieved {} chunks (requested top-{})", hits.len(), limit);
            Ok(hits)
        })
        .await
    }

    async fn delete_document(&self, document_id: &str) -> AppResult<usize> {
        let document_id = document_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
                .map_err(|e| store_error("Failed to delete chunks", e))?;
            tracing::debug!("Deleted {} chunks for document {}", removed, document_id);
            Ok(removed)
        })
        .await
    }

    async fn count(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| store_error("Failed to count chunks", e))
        })
        .await
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(store_error(
            "Invalid embedding",
            format!("{} bytes is not a whole number of f32 values", bytes.len()),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity, clamped to `[-1, 1]`; zero vectors score 0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use chrono::Utc;
    use tempfile::TempDir;

    fn embedded(document_id: &str, index: u32, text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk::new(
                format!("{}-{}", document_id, index),
                index,
                text.to_string(),
                Utc::now(),
            ),
            vector,
        }
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("vectors.sqlite");
        let store = SqliteVectorStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_upsert_and_search_ranked() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let chunks = vec![
            embedded("doc", 0, "east", vec![1.0, 0.0, 0.0]),
            embedded("doc", 1, "north-east", vec![0.7, 0.7, 0.0]),
            embedded("doc", 2, "up", vec![0.0, 0.0, 1.0]),
        ];
        assert_eq!(store.upsert("doc", &chunks).await.unwrap(), 3);

        let hits = store.search(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload.text, "east");
        assert!((hits[0].score - 1.0).abs() < 0.001);
        assert_eq!(hits[1].payload.text, "north-east");
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[1].payload.chunk_index, 1);
        assert_eq!(hits[1].payload.document_id, "doc");
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert("doc", &[embedded("doc", 0, "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("doc", &[embedded("doc", 0, "new", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits[0].payload.text, "new");
    }

    #[tokio::test]
    async fn test_document_filter_and_delete() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert("a", &[embedded("a", 0, "alpha", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("b", &[embedded("b", 0, "beta", vec![1.0, 0.1])])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 5, Some("b")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.document_id, "b");

        assert_eq!(store.delete_document("a").await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.search(&[1.0, 0.0], 5, Some("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_are_skipped() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert("doc", &[embedded("doc", 0, "three", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_handles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.sqlite");

        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store
                .upsert("doc", &[embedded("doc", 0, "kept", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&c, &d).abs() < 0.001);

        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_reject_partial_values() {
        assert!(bytes_to_embedding(&[0, 0, 128]).is_err());
        let bytes = embedding_to_bytes(&[0.5, -2.0]);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![0.5, -2.0]);
    }
}
