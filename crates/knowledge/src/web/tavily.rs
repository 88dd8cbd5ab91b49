//! Tavily search API client.

use super::WebSearchProvider;
use crate::types::WebResult;
use ragbot_core::config::WebSearchSettings;
use ragbot_core::{AppError, AppResult, Upstream};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}

impl From<SearchHit> for WebResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title,
            url: hit.url,
            content: hit.content,
            score: hit.score,
        }
    }
}

fn web_error(message: impl Into<String>) -> AppError {
    AppError::upstream(Upstream::WebSearch, message)
}

/// Tavily web search client.
///
/// Available only when an API key is configured.
pub struct TavilyClient {
    endpoint: String,
    api_key: Option<String>,
    search_depth: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(settings: &WebSearchSettings, api_key: Option<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            search_depth: settings.search_depth.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl WebSearchProvider for TavilyClient {
    fn provider_name(&self) -> &str {
        "tavily"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebResult>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| web_error("no API key configured"))?;

        let request = SearchRequest {
            api_key,
            query,
            search_depth: &self.search_depth,
            max_results,
            include_answer: true,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| web_error(format!("Failed to reach Tavily: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(web_error(format!("Tavily API error ({}): {}", status, body)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| web_error(format!("Failed to parse Tavily response: {}", e)))?;

        let results: Vec<WebResult> = body
            .results
            .into_iter()
            .take(max_results)
            .map(WebResult::from)
            .collect();

        tracing::info!("Web search completed: {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: &str) -> WebSearchSettings {
        WebSearchSettings {
            endpoint: endpoint.to_string(),
            ..WebSearchSettings::default()
        }
    }

    #[test]
    fn test_availability_follows_api_key() {
        let without = TavilyClient::new(&settings("http://localhost"), None).unwrap();
        assert!(!without.is_available());

        let blank = TavilyClient::new(&settings("http://localhost"), Some("  ".into())).unwrap();
        assert!(!blank.is_available());

        let with = TavilyClient::new(&settings("http://localhost"), Some("tvly-key".into())).unwrap();
        assert!(with.is_available());
    }

    #[tokio::test]
    async fn test_search_without_key_is_upstream_error() {
        let client = TavilyClient::new(&settings("http://localhost"), None).unwrap();
        let err = client.search("rust", 3).await.unwrap_err();
        assert!(err.is_upstream(Upstream::WebSearch));
    }

    #[tokio::test]
    async fn test_search_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "api_key": "tvly-key",
                "query": "latest rust release",
                "search_depth": "basic",
                "max_results": 2,
                "include_answer": true,
                "include_raw_content": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "Rust 1.80",
                "results": [
                    {"title": "Rust Blog", "url": "https://blog.rust-lang.org", "content": "Rust 1.80 released", "score": 0.91},
                    {"title": "Release notes", "url": "https://example.com/notes", "content": "Changes"}
                ]
            })))
            .mount(&server)
            .await;

        let client = TavilyClient::new(&settings(&server.uri()), Some("tvly-key".into())).unwrap();
        let results = client.search("latest rust release", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust Blog");
        assert_eq!(results[0].content, "Rust 1.80 released");
        assert!((results[0].score - 0.91).abs() < 1e-6);
        assert_eq!(results[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_search_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = TavilyClient::new(&settings(&server.uri()), Some("bad".into())).unwrap();
        let err = client.search("rust", 3).await.unwrap_err();
        assert!(err.is_upstream(Upstream::WebSearch));
        assert!(err.to_string().contains("invalid api key"));
    }
}
