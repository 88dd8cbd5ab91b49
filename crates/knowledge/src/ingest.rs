//! Document ingestion.
//!
//! Takes a file through extract, chunk, filter, embed and store, recording
//! each stage in the registry. A failure at any stage marks the document
//! `failed` with the error message.

use crate::chunker::chunk_document;
use crate::deadline::bounded;
use crate::embeddings::EmbeddingProvider;
use crate::parser::{extract_text, DocumentKind, MAX_FILE_BYTES};
use crate::quality::QualityFilter;
use crate::registry::DocumentRegistry;
use crate::store::VectorStore;
use crate::types::{Chunk, DocumentRecord, DocumentStatus, EmbeddedChunk};
use chrono::Utc;
use ragbot_core::config::ChunkingSettings;
use ragbot_core::{AppConfig, AppError, AppResult, Upstream};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub path: PathBuf,

    /// Absent when the file was rejected before registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,

    pub chunk_count: usize,

    /// Unchanged since it was last stored
    pub skipped: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    fn from_record(record: &DocumentRecord, skipped: bool) -> Self {
        Self {
            path: record.path.clone(),
            document_id: Some(record.id.clone()),
            status: Some(record.status),
            chunk_count: record.chunk_count,
            skipped,
            error: record.error.clone(),
        }
    }

    fn rejected(path: &Path, error: &AppError) -> Self {
        Self {
            path: path.to_path_buf(),
            document_id: None,
            status: None,
            chunk_count: 0,
            skipped: false,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Drives documents through the processing stages.
pub struct DocumentIngestor {
    registry: DocumentRegistry,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingSettings,
    filter: QualityFilter,
    batch_size: usize,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl DocumentIngestor {
    pub fn new(
        registry: DocumentRegistry,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingSettings,
    ) -> Self {
        let filter = QualityFilter::from(&chunking);
        Self {
            registry,
            embedder,
            store,
            chunking,
            filter,
            batch_size: 32,
            embed_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
        }
    }

    /// Ingestor using the configured chunking, batching and timeouts.
    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let mut ingestor = Self::new(
            DocumentRegistry::new(config.registry_path()),
            embedder,
            store,
            config.chunking.clone(),
        );
        ingestor.batch_size = config.embedding.batch_size.max(1);
        ingestor.embed_timeout = config.embedding_timeout();
        ingestor.store_timeout = config.vector_store_timeout();
        ingestor
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    /// Ingest a single file.
    ///
    /// A file whose contents match an already stored document is skipped.
    /// Re-ingesting a changed file at a known path keeps its document id
    /// and replaces its stored chunks.
    ///
    /// # Errors
    /// `Validation` for oversized or unsupported files; any stage failure
    /// after registration is returned after the record is marked failed.
    #[tracing::instrument(skip(self))]
    pub async fn ingest_file(&self, path: &Path) -> AppResult<IngestReport> {
        let start = Instant::now();

        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_FILE_BYTES {
            return Err(AppError::validation(format!(
                "{} is {} bytes, larger than the {} byte limit",
                path.display(),
                metadata.len(),
                MAX_FILE_BYTES
            )));
        }

        let kind = DocumentKind::from_path(path);
        if kind == DocumentKind::Unsupported {
            return Err(AppError::validation(format!(
                "unsupported file type: {}",
                path.display()
            )));
        }

        let raw = std::fs::read(path)?;
        let file_hash = sha256_hex(&raw);
        let path = canonical(path);

        if let Some(existing) = self.registry.find_by_hash(&file_hash)? {
            if existing.status == DocumentStatus::Stored {
                tracing::info!("Skipping {:?}: unchanged since last ingest", path);
                return Ok(IngestReport::from_record(&existing, true));
            }
        }

        let id = match self.registry.find_by_path(&path)? {
            Some(previous) => previous.id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let now = Utc::now();
        let record = DocumentRecord {
            id: id.clone(),
            title: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| id.clone()),
            path: path.clone(),
            kind: kind.as_str().to_string(),
            size_bytes: metadata.len(),
            file_hash,
            status: DocumentStatus::Uploaded,
            chunk_count: 0,
            uploaded_at: now,
            updated_at: now,
            error: None,
        };
        self.registry.record(&record)?;

        match self.process(&id, kind, &raw).await {
            Ok(stored) => {
                tracing::info!(
                    "Ingested {:?}: {} chunks in {:.2}s",
                    path,
                    stored.chunk_count,
                    start.elapsed().as_secs_f64()
                );
                Ok(IngestReport::from_record(&stored, false))
            }
            Err(e) => {
                tracing::error!("Ingest of {:?} failed: {}", path, e);
                let message = e.to_string();
                if let Err(mark) = self.registry.transition_with(&id, DocumentStatus::Failed, |r| {
                    r.error = Some(message)
                }) {
                    tracing::warn!("Could not mark document {} as failed: {}", id, mark);
                }
                Err(e)
            }
        }
    }

    async fn process(&self, id: &str, kind: DocumentKind, raw: &[u8]) -> AppResult<DocumentRecord> {
        let text = extract_text(kind, raw)?;
        self.registry.transition(id, DocumentStatus::Extracted)?;

        let chunks = chunk_document(id, &text, self.chunking.chunk_size, self.chunking.overlap)?;
        let chunks = self.filter.apply(id, chunks);
        if chunks.is_empty() {
            return Err(AppError::validation(
                "no chunk passed the quality filter; the document has too little text",
            ));
        }
        let chunk_count = chunks.len();
        self.registry
            .transition_with(id, DocumentStatus::Chunked, |r| r.chunk_count = chunk_count)?;

        let embedded = self.embed_chunks(chunks).await?;
        self.registry.transition(id, DocumentStatus::Embedded)?;

        // Drop points left over from an earlier version of the document
        bounded(
            Upstream::VectorSearch,
            self.store_timeout,
            self.store.delete_document(id),
        )
        .await?;
        let written = bounded(
            Upstream::VectorSearch,
            self.store_timeout,
            self.store.upsert(id, &embedded),
        )
        .await?;
        tracing::debug!("Stored {} vectors for document {}", written, id);

        self.registry.transition(id, DocumentStatus::Stored)
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> AppResult<Vec<EmbeddedChunk>> {
        let mut embedded = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = bounded(
                Upstream::Embedding,
                self.embed_timeout,
                self.embedder.embed_batch(&texts),
            )
            .await?;

            if vectors.len() != batch.len() {
                return Err(AppError::upstream(
                    Upstream::Embedding,
                    format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        vectors.len()
                    ),
                ));
            }

            embedded.extend(batch.iter().cloned().zip(vectors).map(|(chunk, vector)| {
                EmbeddedChunk { chunk, vector }
            }));
        }

        Ok(embedded)
    }

    /// Ingest a file, or every supported file below a directory.
    ///
    /// Per-file failures are reported rather than aborting the walk.
    pub async fn ingest_path(&self, path: &Path) -> AppResult<Vec<IngestReport>> {
        if !path.exists() {
            return Err(AppError::validation(format!(
                "path does not exist: {}",
                path.display()
            )));
        }

        let files: Vec<PathBuf> = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| DocumentKind::from_path(p) != DocumentKind::Unsupported)
                .collect()
        };

        tracing::info!("Ingesting {} files from {:?}", files.len(), path);

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            let report = match self.ingest_file(&file).await {
                Ok(report) => report,
                Err(e) => match self.registry.find_by_path(&canonical(&file))? {
                    Some(record) if record.status == DocumentStatus::Failed => {
                        IngestReport::from_record(&record, false)
                    }
                    _ => IngestReport::rejected(&file, &e),
                },
            };
            reports.push(report);
        }

        Ok(reports)
    }

    /// Remove a document's vectors and mark it deleted.
    ///
    /// Returns the number of vectors removed.
    pub async fn delete_document(&self, id: &str) -> AppResult<usize> {
        let record = self
            .registry
            .get(id)?
            .ok_or_else(|| AppError::Knowledge(format!("Unknown document: {}", id)))?;

        if record.status == DocumentStatus::Deleted {
            return Err(AppError::validation(format!("document {} is already deleted", id)));
        }

        let removed = bounded(
            Upstream::VectorSearch,
            self.store_timeout,
            self.store.delete_document(id),
        )
        .await?;
        self.registry.transition(id, DocumentStatus::Deleted)?;

        tracing::info!("Deleted document {} ({} vectors)", id, removed);
        Ok(removed)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
