//! Web search collaborator used as the retrieval fallback.

mod tavily;

pub use tavily::TavilyClient;

use crate::types::WebResult;
use ragbot_core::config::WebSearchSettings;
use ragbot_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for web search providers.
#[async_trait::async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Whether searches can be attempted at all (e.g. a key is configured).
    fn is_available(&self) -> bool;

    /// Search the web, returning at most `max_results` results.
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebResult>>;
}

/// Create a web search provider from its settings and resolved API key.
pub fn create_web_search(
    settings: &WebSearchSettings,
    api_key: Option<String>,
) -> AppResult<Arc<dyn WebSearchProvider>> {
    match settings.provider.as_str() {
        "tavily" => Ok(Arc::new(TavilyClient::new(settings, api_key)?)),
        other => Err(AppError::Config(format!(
            "Unknown web search provider: '{}'. Supported providers: tavily",
            other
        ))),
    }
}
