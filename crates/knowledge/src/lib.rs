//! Knowledge and answer pipeline for ragbot.
//!
//! Documents are chunked, embedded and stored locally; questions are
//! answered from retrieved chunks, with a web search fallback when the
//! local knowledge looks insufficient.
//!
//! - [`chunker`] / [`quality`]: text to retrievable chunks
//! - [`embeddings`], [`store`], [`web`]: collaborator traits and clients
//! - [`retriever`]: query to scored chunks
//! - [`rag`]: fallback decision, context assembly and the answer pipeline
//! - [`ingest`] / [`registry`]: document processing and bookkeeping

pub mod chunker;
pub mod deadline;
pub mod embeddings;
pub mod ingest;
pub mod parser;
pub mod quality;
pub mod rag;
pub mod registry;
pub mod retriever;
pub mod store;
pub mod types;
pub mod web;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{chunk_document, chunk_text};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::{DocumentIngestor, IngestReport};
pub use quality::QualityFilter;
pub use rag::{
    AnswerRequest, AnswerResult, AnswerStatus, AnswerStream, FallbackDecider, PipelineSettings,
    RagPipeline, RetrievalOutcome,
};
pub use registry::DocumentRegistry;
pub use retriever::Retriever;
pub use store::{SqliteVectorStore, VectorStore};
pub use types::{Chunk, DocumentRecord, DocumentStatus, ScoredResult, WebResult};
pub use web::{create_web_search, TavilyClient, WebSearchProvider};
