//! Ask command handler.
//!
//! Answers a question from retrieved document chunks, optionally
//! supplemented by a web search.

use super::print_json;
use crate::services::Services;
use clap::Args;
use futures::{Stream, StreamExt};
use ragbot_core::{config::AppConfig, AppError, AppResult};
use ragbot_knowledge::{AnswerRequest, AnswerResult};
use std::io::Write;

/// Answer a question from the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub max_results: Option<usize>,

    /// Context budget in characters
    #[arg(long)]
    pub max_context: Option<usize>,

    /// Never fall back to web search
    #[arg(long)]
    pub no_fallback: bool,

    /// Local context only, with the basic prompt
    #[arg(long, conflicts_with = "stream")]
    pub basic: bool,

    /// Print the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Restrict retrieval to one document
    #[arg(long)]
    pub document: Option<String>,

    /// Output the full result as JSON
    #[arg(long, conflicts_with = "stream")]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig, services: &Services) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let request = self.request(config);

        if self.stream {
            return self.handle_streaming(services, &request).await;
        }

        let result = if self.basic {
            services.pipeline.generate_answer(&request).await?
        } else {
            services
                .pipeline
                .generate_answer_with_fallback(&request)
                .await?
        };

        self.print_result(&result)
    }

    fn request(&self, config: &AppConfig) -> AnswerRequest {
        let mut request = AnswerRequest::from_settings(&self.query, &config.retrieval);

        if let Some(max_results) = self.max_results {
            request = request.with_max_results(max_results);
        }
        if let Some(max_context) = self.max_context {
            request = request.with_max_context_length(max_context);
        }
        if self.no_fallback {
            request = request.with_fallback(false);
        }
        if let Some(document) = &self.document {
            request = request.with_document_filter(document);
        }

        request
    }

    fn print_result(&self, result: &AnswerResult) -> AppResult<()> {
        for warning in &result.warnings {
            tracing::warn!("{}", warning);
        }

        if self.json {
            return print_json(result);
        }

        if !result.is_completed() {
            return Err(AppError::Other(result.answer.clone()));
        }

        println!("{}", result.answer);

        tracing::debug!(
            "Answered from {} local results (web fallback: {})",
            result.local_result_count,
            result.used_fallback
        );

        Ok(())
    }

    /// Print fragments as they arrive.
    async fn handle_streaming(&self, services: &Services, request: &AnswerRequest) -> AppResult<()> {
        tracing::info!("Starting streaming answer");

        let stream = services.pipeline.stream_answer(request).await?;
        let mut stdout = std::io::stdout();
        let result = write_fragments(stream, &mut stdout).await;

        // Add newline after streaming output
        println!();

        result
    }
}

/// Write fragments as they arrive.
///
/// A fragment starting with `"Error: "` is held back until the next one
/// arrives. If it turns out to be the last fragment it is returned as the
/// error instead of being printed.
async fn write_fragments<S, W>(mut stream: S, out: &mut W) -> AppResult<()>
where
    S: Stream<Item = String> + Unpin,
    W: Write,
{
    let mut held: Option<String> = None;

    while let Some(fragment) = stream.next().await {
        if let Some(previous) = held.take() {
            out.write_all(previous.as_bytes())?;
        }
        if fragment.starts_with("Error: ") {
            held = Some(fragment);
            continue;
        }
        out.write_all(fragment.as_bytes())?;
        out.flush()?;
    }

    match held {
        Some(message) => Err(AppError::Other(message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn fragments(items: &[&str]) -> impl Stream<Item = String> + Unpin {
        stream::iter(items.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_write_fragments_prints_everything() {
        let mut out = Vec::new();
        write_fragments(fragments(&["Large ", "", "files"]), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Large files");
    }

    #[tokio::test]
    async fn test_error_prefix_mid_answer_is_printed() {
        let mut out = Vec::new();
        write_fragments(
            fragments(&["The log said ", "Error: ", "disk full", "."]),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "The log said Error: disk full."
        );
    }

    #[tokio::test]
    async fn test_trailing_error_fragment_fails() {
        let mut out = Vec::new();
        let err = write_fragments(
            fragments(&["Partial ", "Error: llm unavailable: connection reset"]),
            &mut out,
        )
        .await
        .unwrap_err();

        assert_eq!(String::from_utf8(out).unwrap(), "Partial ");
        assert!(err.to_string().contains("connection reset"));
    }
}
