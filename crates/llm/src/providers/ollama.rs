//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use futures::{Stream, StreamExt};
use ragbot_core::{AppError, AppResult, Upstream};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const PROBE_TIMEOUT_SECS: u64 = 5;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format (one record per line when streaming).
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// Timeout for probes and blocking generation
    timeout: Duration,

    /// HTTP client, pooled and shared by every request
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client,
        }
    }

    /// Set the timeout applied to blocking generation requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_ollama_request(&self, request: &LlmRequest, stream: bool) -> OllamaRequest {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            options,
            stream,
        }
    }

    async fn post_generate(
        &self,
        request: &LlmRequest,
        stream: bool,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .json(&self.to_ollama_request(request, stream));

        // Streams may legitimately run longer than the blocking timeout;
        // the caller bounds how long it waits for the stream to open.
        if !stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| llm_error(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(llm_error(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!("Ollama probe returned status {}", response.status());
                false
            }
            Err(e) => {
                tracing::debug!("Ollama probe failed: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to Ollama");

        let response = self.post_generate(request, false).await?;

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| llm_error(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = ollama_response.error {
            return Err(llm_error(error));
        }

        tracing::debug!(
            "Received {} chars from Ollama",
            ollama_response.response.chars().count()
        );

        Ok(LlmResponse {
            usage: LlmUsage::new(
                ollama_response.prompt_eval_count.unwrap_or(0),
                ollama_response.eval_count.unwrap_or(0),
            ),
            content: ollama_response.response,
            model: ollama_response.model,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to Ollama");

        let response = self.post_generate(request, true).await?;
        Ok(decode_ndjson(Box::pin(response.bytes_stream())))
    }
}

fn llm_error(message: impl Into<String>) -> AppError {
    AppError::upstream(Upstream::Llm, message)
}

/// Splits a byte stream into newline-terminated records.
///
/// Network frames do not respect record boundaries, so partial lines
/// are carried over until their terminator arrives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

fn parse_record(line: &str) -> AppResult<LlmStreamChunk> {
    let record: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| llm_error(format!("Failed to parse stream record: {}", e)))?;

    if let Some(error) = record.error {
        return Err(llm_error(error));
    }

    let usage = record.done.then(|| {
        LlmUsage::new(
            record.prompt_eval_count.unwrap_or(0),
            record.eval_count.unwrap_or(0),
        )
    });

    Ok(LlmStreamChunk {
        content: record.response,
        model: record.model,
        done: record.done,
        usage,
    })
}

struct DecodeState<S> {
    body: S,
    lines: LineBuffer,
    queue: VecDeque<AppResult<LlmStreamChunk>>,
    finished: bool,
}

/// Turn an NDJSON body into a stream of chunks.
///
/// The stream ends after the first `done` record or the first error;
/// once it ends the body is dropped, which releases the connection.
fn decode_ndjson<S, B, E>(body: S) -> LlmStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body,
        lines: LineBuffer::default(),
        queue: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                let terminal = match &item {
                    Ok(chunk) => chunk.done,
                    Err(_) => true,
                };
                if terminal {
                    state.finished = true;
                    state.queue.clear();
                }
                return Some((item, state));
            }

            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(bytes.as_ref()) {
                        state.queue.push_back(parse_record(&line));
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(llm_error(format!("Stream error: {}", e))), state));
                }
                None => {
                    state.finished = true;
                    match state.lines.finish() {
                        Some(line) => state.queue.push_back(parse_record(&line)),
                        None => {
                            tracing::warn!("Ollama stream ended without a done record");
                            return None;
                        }
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frames(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + Unpin {
        let owned: Vec<Result<Vec<u8>, String>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("Hello", "gemma:2b")
            .with_temperature(0.7)
            .with_max_tokens(100);

        let ollama_req = client.to_ollama_request(&request, false);
        assert_eq!(ollama_req.model, "gemma:2b");
        assert_eq!(ollama_req.prompt, "Hello");
        assert_eq!(
            ollama_req.options,
            Some(OllamaOptions {
                temperature: Some(0.7),
                num_predict: Some(100)
            })
        );

        let bare = client.to_ollama_request(&LlmRequest::new("Hi", "gemma:2b"), true);
        assert!(bare.options.is_none());
        assert!(bare.stream);
    }

    #[test]
    fn test_line_buffer_reassembles_split_records() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"response\":\"Hel").is_empty());
        let lines = buffer.push(b"lo\"}\n{\"response\":\" world\"}\n\n{\"do");
        assert_eq!(lines, vec!["{\"response\":\"Hello\"}", "{\"response\":\" world\"}"]);
        assert_eq!(buffer.finish().as_deref(), Some("{\"do"));
        assert!(buffer.finish().is_none());
    }

    #[tokio::test]
    async fn test_decode_stops_at_done() {
        let body = frames(&[
            "{\"model\":\"m\",\"response\":\"Hel\",\"done\":false}\n{\"model\":\"m\",",
            "\"response\":\"lo\",\"done\":false}\n",
            "{\"model\":\"m\",\"response\":\"\",\"done\":true,\"eval_count\":2}\n",
            "{\"model\":\"m\",\"response\":\"ignored\",\"done\":false}\n",
        ]);

        let chunks: Vec<_> = decode_ndjson(body).collect().await;
        assert_eq!(chunks.len(), 3);
        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().content.clone())
            .collect();
        assert_eq!(text, "Hello");
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert!(last.done);
        assert_eq!(last.usage.as_ref().map(|u| u.completion_tokens), Some(2));
    }

    #[tokio::test]
    async fn test_decode_ends_after_malformed_record() {
        let body = frames(&[
            "{\"response\":\"ok\"}\n",
            "not json\n",
            "{\"response\":\"never\"}\n",
        ]);

        let items: Vec<_> = decode_ndjson(body).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].as_ref().unwrap_err().is_upstream(Upstream::Llm));
    }

    #[tokio::test]
    async fn test_decode_transport_error() {
        let body = futures::stream::iter(vec![
            Ok::<Vec<u8>, String>(b"{\"response\":\"a\"}\n".to_vec()),
            Err("connection reset".to_string()),
        ]);

        let items: Vec<_> = decode_ndjson(body).collect().await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_is_available_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": "0.1.32"
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        assert!(client.is_available().await);
    }

    #[tokio::test]
    async fn test_is_available_false_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn test_is_available_false_when_unreachable() {
        let client = OllamaClient::with_base_url("http://127.0.0.1:9");
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn test_complete_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gemma:2b",
                "response": "Paris is the capital of France.",
                "done": true,
                "prompt_eval_count": 10,
                "eval_count": 7
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let response = client
            .complete(&LlmRequest::new("Capital of France?", "gemma:2b"))
            .await
            .unwrap();

        assert_eq!(response.content, "Paris is the capital of France.");
        assert_eq!(response.usage.total_tokens, 17);
    }

    #[tokio::test]
    async fn test_complete_maps_status_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let err = client
            .complete(&LlmRequest::new("hi", "missing"))
            .await
            .unwrap_err();

        assert!(err.is_upstream(Upstream::Llm));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_stream_against_server() {
        let body = concat!(
            "{\"model\":\"gemma:2b\",\"response\":\"The \",\"done\":false}\n",
            "{\"model\":\"gemma:2b\",\"response\":\"answer\",\"done\":false}\n",
            "{\"model\":\"gemma:2b\",\"response\":\"\",\"done\":true}\n"
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-ndjson")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let stream = client
            .stream(&LlmRequest::new("q", "gemma:2b").with_streaming())
            .await
            .unwrap();

        let text: Vec<String> = stream.map(|c| c.unwrap().content).collect().await;
        assert_eq!(text.concat(), "The answer");
    }
}
