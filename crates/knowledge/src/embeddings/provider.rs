//! Embedding provider trait and factory.

use crate::embeddings::providers::{OllamaProvider, TrigramProvider};
use ragbot_core::config::EmbeddingSettings;
use ragbot_core::{AppError, AppResult, Upstream};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, one vector per text in order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::upstream(Upstream::Embedding, "No embedding returned"))
    }

    /// Check the provider can serve requests.
    async fn verify(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Create an embedding provider from its settings.
pub fn create_provider(settings: &EmbeddingSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(settings)?)),

        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            other
        ))),
    }
}
