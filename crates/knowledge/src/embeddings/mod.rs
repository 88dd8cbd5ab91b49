//! Embedding providers.
//!
//! The embedding collaborator turns text into fixed-length vectors. One
//! provider is created at startup and shared by ingestion and retrieval.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};
