//! Scripted collaborators for pipeline tests.

use crate::embeddings::EmbeddingProvider;
use crate::rag::{PipelineSettings, RagPipeline};
use crate::retriever::Retriever;
use crate::store::VectorStore;
use crate::types::{ChunkPayload, EmbeddedChunk, VectorHit, WebResult};
use crate::web::WebSearchProvider;
use futures::StreamExt;
use ragbot_core::{AppError, AppResult, Upstream};
use ragbot_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use ragbot_prompt::PromptBuilder;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted language model.
pub struct FakeLlm {
    pub available: bool,
    pub answer: String,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    pub stream_items: Vec<Result<String, String>>,
    /// Set when a stream handed out by this model is dropped
    pub stream_dropped: Arc<AtomicBool>,
    pub endless_stream: bool,
    pub probes: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            available: true,
            answer: answer.to_string(),
            fail_with: None,
            delay: None,
            stream_items: Vec::new(),
            stream_dropped: Arc::new(AtomicBool::new(false)),
            endless_stream: false,
            probes: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::answering("unused")
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::answering("unused")
        }
    }

    pub fn streaming(items: Vec<Result<&str, &str>>) -> Self {
        Self {
            stream_items: items
                .into_iter()
                .map(|i| i.map(str::to_string).map_err(str::to_string))
                .collect(),
            ..Self::answering("unused")
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

/// Sets its flag when dropped, which happens when the stream owning it goes away.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn chunk(content: &str, done: bool) -> LlmStreamChunk {
    LlmStreamChunk {
        content: content.to_string(),
        model: "fake".to_string(),
        done,
        usage: None,
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.available
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(AppError::upstream(Upstream::Llm, message.clone()));
        }

        Ok(LlmResponse {
            content: self.answer.clone(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some(message) = &self.fail_with {
            return Err(AppError::upstream(Upstream::Llm, message.clone()));
        }

        let guard = DropFlag(Arc::clone(&self.stream_dropped));

        if self.endless_stream {
            let stream = futures::stream::unfold((guard, 0usize), |(guard, n)| async move {
                Some((Ok(chunk(&format!("t{} ", n), false)), (guard, n + 1)))
            });
            return Ok(Box::pin(stream));
        }

        let items: Vec<AppResult<LlmStreamChunk>> = self
            .stream_items
            .iter()
            .map(|item| match item {
                Ok(text) => Ok(chunk(text, false)),
                Err(message) => Err(AppError::upstream(Upstream::Llm, message.clone())),
            })
            .chain(std::iter::once(Ok(chunk("", true))))
            .collect();

        let stream = futures::stream::iter(items).map(move |item| {
            let _keep = &guard;
            item
        });
        Ok(Box::pin(stream))
    }
}

/// Embedder returning the same vector for every text.
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl std::fmt::Debug for FakeEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FakeEmbedder")
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake"
    }

    fn dimensions(&self) -> usize {
        4
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::upstream(Upstream::Embedding, "connection refused"));
        }
        Ok(texts.iter().map(|_| vec![0.5, 0.5, 0.5, 0.5]).collect())
    }
}

/// Vector store answering every search with preset hits.
pub struct FakeStore {
    pub hits: Vec<VectorHit>,
    pub searches: AtomicUsize,
}

impl FakeStore {
    /// Hits with the given scores, texts `"Local passage N about the topic."`.
    pub fn with_scores(scores: &[f32]) -> Self {
        let hits = scores
            .iter()
            .enumerate()
            .map(|(i, score)| VectorHit {
                id: format!("chunk-{}", i),
                score: *score,
                payload: ChunkPayload {
                    document_id: "doc-1".to_string(),
                    chunk_index: i as u32,
                    text: format!("Local passage {} about the topic.", i),
                },
            })
            .collect();

        Self {
            hits,
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for FakeStore {
    fn backend_name(&self) -> &str {
        "fake"
    }

    async fn upsert(&self, _document_id: &str, chunks: &[EmbeddedChunk]) -> AppResult<usize> {
        Ok(chunks.len())
    }

    async fn search(
        &self,
        _query: &[f32],
        limit: usize,
        _document_filter: Option<&str>,
    ) -> AppResult<Vec<VectorHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn delete_document(&self, _document_id: &str) -> AppResult<usize> {
        Ok(0)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.hits.len())
    }
}

/// Scripted web search.
pub struct FakeWeb {
    pub available: bool,
    pub fail: bool,
    pub results: Vec<WebResult>,
    pub calls: AtomicUsize,
}

impl FakeWeb {
    pub fn with_results(count: usize) -> Self {
        let results = (1..=count)
            .map(|i| WebResult {
                title: format!("Web page {}", i),
                url: format!("https://example.com/{}", i),
                content: format!("Fresh web content {}.", i),
                score: 0.8,
            })
            .collect();

        Self {
            available: true,
            fail: false,
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_results(0)
        }
    }

    pub fn without_key() -> Self {
        Self {
            available: false,
            ..Self::with_results(2)
        }
    }
}

#[async_trait::async_trait]
impl WebSearchProvider for FakeWeb {
    fn provider_name(&self) -> &str {
        "fake-web"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn search(&self, _query: &str, max_results: usize) -> AppResult<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::upstream(Upstream::WebSearch, "HTTP 502 from provider"));
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}

/// Collaborators for one pipeline, kept for inspecting call counts.
pub struct Harness {
    pub llm: Arc<FakeLlm>,
    pub embedder: Arc<FakeEmbedder>,
    pub store: Arc<FakeStore>,
    pub web: Arc<FakeWeb>,
}

impl Harness {
    pub fn new(llm: FakeLlm, store: FakeStore, web: FakeWeb) -> Self {
        Self {
            llm: Arc::new(llm),
            embedder: Arc::new(FakeEmbedder::new()),
            store: Arc::new(store),
            web: Arc::new(web),
        }
    }

    pub fn with_embedder(mut self, embedder: FakeEmbedder) -> Self {
        self.embedder = Arc::new(embedder);
        self
    }

    pub fn pipeline(&self) -> RagPipeline {
        self.pipeline_with(PipelineSettings::default())
    }

    pub fn pipeline_with(&self, settings: PipelineSettings) -> RagPipeline {
        let embedder: Arc<dyn EmbeddingProvider> = self.embedder.clone();
        let store: Arc<dyn VectorStore> = self.store.clone();
        let llm: Arc<dyn LlmClient> = self.llm.clone();
        let web: Arc<dyn WebSearchProvider> = self.web.clone();

        RagPipeline::new(
            Retriever::new(embedder, store),
            llm,
            Some(web),
            PromptBuilder::new().unwrap(),
            settings,
        )
    }

    pub fn searches(&self) -> usize {
        self.store.searches.load(Ordering::SeqCst)
    }

    pub fn web_calls(&self) -> usize {
        self.web.calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embedder.calls.load(Ordering::SeqCst)
    }
}
