//! LLM provider factory.
//!
//! Builds the long-lived LLM client from application configuration.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use ragbot_core::config::LlmSettings;
use ragbot_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client from its settings.
///
/// No connection is attempted here; availability is probed per request
/// through [`LlmClient::is_available`].
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "ollama" => {
            let client = OllamaClient::with_base_url(&settings.endpoint)
                .with_timeout(Duration::from_secs(settings.timeout_secs));
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!(
            "Unknown LLM provider: {}. Supported: ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client(&LlmSettings::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let settings = LlmSettings {
            endpoint: "http://localhost:8080".to_string(),
            ..LlmSettings::default()
        };
        assert!(create_client(&settings).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        let settings = LlmSettings {
            provider: "unknown".to_string(),
            ..LlmSettings::default()
        };
        match create_client(&settings) {
            Err(AppError::Config(msg)) => assert!(msg.contains("Unknown LLM provider")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
