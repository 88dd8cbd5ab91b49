//! Answer orchestration.
//!
//! One pipeline instance is built at startup from long-lived collaborator
//! handles and shared by every request. Each call runs
//! retrieve, optional web fallback, context assembly, prompt and generation
//! in a single pass without internal fan-out.

use crate::deadline::bounded;
use crate::rag::context::{assemble, assemble_hybrid};
use crate::rag::fallback::FallbackDecider;
use crate::rag::types::{AnswerRequest, AnswerResult, RetrievalOutcome};
use crate::retriever::Retriever;
use crate::types::{ScoredResult, WebResult};
use crate::web::WebSearchProvider;
use futures::{future, stream, Stream, StreamExt};
use ragbot_core::{AppConfig, AppError, AppResult, Upstream};
use ragbot_llm::{LlmClient, LlmRequest, LlmStream};
use ragbot_prompt::PromptBuilder;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Answer text fragments in generation order.
///
/// Finite and not restartable. Dropping it closes the LLM connection.
pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Generation and fallback parameters fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub fallback_threshold: f32,
    pub web_max_results: usize,
    pub llm_timeout: Duration,
    pub web_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: "gemma:2b".to_string(),
            temperature: None,
            max_tokens: None,
            fallback_threshold: 0.3,
            web_max_results: 3,
            llm_timeout: Duration::from_secs(60),
            web_timeout: Duration::from_secs(15),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            fallback_threshold: config.retrieval.fallback_threshold,
            web_max_results: config.web_search.max_results,
            llm_timeout: config.llm_timeout(),
            web_timeout: config.web_search_timeout(),
        }
    }
}

/// Retrieval-augmented answer pipeline.
pub struct RagPipeline {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
    web: Option<Arc<dyn WebSearchProvider>>,
    prompts: PromptBuilder,
    decider: FallbackDecider,
    settings: PipelineSettings,
}

impl RagPipeline {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmClient>,
        web: Option<Arc<dyn WebSearchProvider>>,
        prompts: PromptBuilder,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            llm,
            web,
            prompts,
            decider: FallbackDecider::new(settings.fallback_threshold),
            settings,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer from local context only, with the basic prompt.
    ///
    /// Only an invalid request is returned as `Err`. Retrieval and
    /// generation failures produce a result with `status: error` and an
    /// `"Error: ..."` answer.
    #[tracing::instrument(skip(self, request), fields(max_results = request.max_results))]
    pub async fn generate_answer(&self, request: &AnswerRequest) -> AppResult<AnswerResult> {
        request.validate()?;
        tracing::info!("Generating answer (local only)");

        let results = match self.retrieve_local(request).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("RAG generation failed during retrieval: {}", e);
                return Ok(AnswerResult::failed(
                    &request.query,
                    &e,
                    RetrievalOutcome::default(),
                ));
            }
        };

        let outcome = RetrievalOutcome {
            local_context: assemble(&results, request.max_context_length),
            local_result_count: results.len(),
            ..RetrievalOutcome::default()
        };

        let answer = match self.prompts.build_basic(&request.query, &outcome.local_context) {
            Ok(prompt) => self.generate(prompt).await,
            Err(e) => Err(e),
        };

        Ok(self.finish(&request.query, answer, outcome))
    }

    /// Answer with local context, supplemented by a web search when the
    /// local results are judged insufficient.
    ///
    /// The LLM is probed before any retrieval; when it is unavailable the
    /// call returns `UpstreamUnavailable` immediately. A failed web search
    /// is recorded as a warning and the answer uses local context only.
    #[tracing::instrument(skip(self, request), fields(max_results = request.max_results, use_fallback = request.use_fallback))]
    pub async fn generate_answer_with_fallback(
        &self,
        request: &AnswerRequest,
    ) -> AppResult<AnswerResult> {
        request.validate()?;

        if !self.llm_available().await {
            tracing::warn!("LLM service unavailable, skipping retrieval");
            return Err(AppError::upstream(
                Upstream::Llm,
                format!("{} service is not available", self.llm.provider_name()),
            ));
        }

        let outcome = match self.gather_hybrid(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("RAG generation failed during retrieval: {}", e);
                return Ok(AnswerResult::failed(
                    &request.query,
                    &e,
                    RetrievalOutcome::default(),
                ));
            }
        };

        let answer = match self.prompts.build_hybrid(
            &request.query,
            &outcome.local_context,
            &outcome.web_context,
        ) {
            Ok(prompt) => self.generate(prompt).await,
            Err(e) => Err(e),
        };

        Ok(self.finish(&request.query, answer, outcome))
    }

    /// Stream the answer fragment by fragment.
    ///
    /// Only request validation is returned as `Err`. Any later failure,
    /// whether in retrieval, prompt rendering, opening the LLM stream or
    /// mid-stream, yields one final `"Error: ..."` fragment and ends the
    /// stream. Fragments are forwarded unchanged; only the empty terminal
    /// `done` marker is skipped.
    #[tracing::instrument(skip(self, request), fields(max_results = request.max_results, use_fallback = request.use_fallback))]
    pub async fn stream_answer(&self, request: &AnswerRequest) -> AppResult<AnswerStream> {
        request.validate()?;
        tracing::info!("Streaming answer");

        let upstream = match self.open_stream(request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!("RAG streaming failed before the first fragment: {}", e);
                return Ok(Box::pin(stream::once(future::ready(error_fragment(&e)))));
            }
        };

        let fragments = upstream
            .filter(|item| {
                let marker = matches!(item, Ok(chunk) if chunk.done && chunk.content.is_empty());
                future::ready(!marker)
            })
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                let fragment = match item {
                    Ok(chunk) => chunk.content,
                    Err(e) => {
                        *failed = true;
                        tracing::error!("RAG streaming failed: {}", e);
                        error_fragment(&e)
                    }
                };
                future::ready(Some(fragment))
            });

        Ok(Box::pin(fragments))
    }

    /// Build the prompt and open the upstream LLM stream.
    async fn open_stream(&self, request: &AnswerRequest) -> AppResult<LlmStream> {
        let prompt = if request.use_fallback {
            let outcome = self.gather_hybrid(request).await?;
            for warning in &outcome.warnings {
                tracing::warn!("{}", warning);
            }
            self.prompts.build_hybrid(
                &request.query,
                &outcome.local_context,
                &outcome.web_context,
            )?
        } else {
            let results = self.retrieve_local(request).await?;
            let context = assemble(&results, request.max_context_length);
            self.prompts.build_basic(&request.query, &context)?
        };

        let llm_request = self.llm_request(prompt).with_streaming();
        bounded(
            Upstream::Llm,
            self.settings.llm_timeout,
            self.llm.stream(&llm_request),
        )
        .await
    }

    /// Probe the LLM, treating a probe that outlives the timeout as down.
    pub async fn llm_available(&self) -> bool {
        tokio::time::timeout(self.settings.llm_timeout, self.llm.is_available())
            .await
            .unwrap_or(false)
    }

    async fn retrieve_local(&self, request: &AnswerRequest) -> AppResult<Vec<ScoredResult>> {
        self.retriever
            .retrieve(
                &request.query,
                request.max_results,
                request.document_filter.as_deref(),
            )
            .await
    }

    /// Local retrieval plus the optional web fallback.
    async fn gather_hybrid(&self, request: &AnswerRequest) -> AppResult<RetrievalOutcome> {
        let results = self.retrieve_local(request).await?;

        let mut outcome = RetrievalOutcome {
            local_result_count: results.len(),
            ..RetrievalOutcome::default()
        };

        let mut web_results: Vec<WebResult> = Vec::new();

        if request.use_fallback {
            let reason = self.decider.decide(&results, &request.query);
            tracing::debug!("Fallback decision: {}", reason);

            if reason.needs_fallback() {
                match self.search_web(&request.query).await {
                    Ok(found) => {
                        tracing::info!(
                            "Web fallback used ({}), {} results",
                            reason,
                            found.len()
                        );
                        outcome.used_fallback = true;
                        web_results = found;
                    }
                    Err(e) => {
                        let partial =
                            AppError::PartialFailure(format!("web search skipped: {}", e));
                        tracing::warn!("{}", partial);
                        outcome.warnings.push(partial.to_string());
                    }
                }
            }
        }

        if outcome.used_fallback {
            let (local, web) =
                assemble_hybrid(&results, &web_results, request.max_context_length);
            outcome.local_context = local;
            outcome.web_context = web;
        } else {
            outcome.local_context = assemble(&results, request.max_context_length);
        }

        Ok(outcome)
    }

    async fn search_web(&self, query: &str) -> AppResult<Vec<WebResult>> {
        let web = match &self.web {
            Some(web) if web.is_available() => web,
            Some(web) => {
                return Err(AppError::upstream(
                    Upstream::WebSearch,
                    format!("{} is not configured", web.provider_name()),
                ))
            }
            None => {
                return Err(AppError::upstream(
                    Upstream::WebSearch,
                    "no web search provider",
                ))
            }
        };

        bounded(
            Upstream::WebSearch,
            self.settings.web_timeout,
            web.search(query, self.settings.web_max_results),
        )
        .await
    }

    fn llm_request(&self, prompt: String) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, &self.settings.model);
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    async fn generate(&self, prompt: String) -> AppResult<String> {
        let request = self.llm_request(prompt);
        let response = bounded(
            Upstream::Llm,
            self.settings.llm_timeout,
            self.llm.complete(&request),
        )
        .await?;
        Ok(response.content)
    }

    fn finish(
        &self,
        query: &str,
        answer: AppResult<String>,
        outcome: RetrievalOutcome,
    ) -> AnswerResult {
        match answer {
            Ok(answer) => {
                tracing::info!(
                    "Answer completed ({} local results, fallback: {})",
                    outcome.local_result_count,
                    outcome.used_fallback
                );
                AnswerResult::completed(query, answer, outcome)
            }
            Err(e) => {
                tracing::error!("RAG generation failed: {}", e);
                AnswerResult::failed(query, &e, outcome)
            }
        }
    }
}

fn error_fragment(error: &AppError) -> String {
    format!("Error: {}", error)
}
