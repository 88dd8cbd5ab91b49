//! RAG request and response types.

use ragbot_core::config::RetrievalSettings;
use ragbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

fn default_max_results() -> usize {
    5
}

fn default_max_context_length() -> usize {
    2000
}

fn default_use_fallback() -> bool {
    true
}

/// A question for the answer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub query: String,

    /// Number of local chunks to retrieve
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Context budget in characters
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,

    /// Allow a web search when local results are insufficient
    #[serde(default = "default_use_fallback")]
    pub use_fallback: bool,

    /// Restrict local retrieval to one document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_filter: Option<String>,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: default_max_results(),
            max_context_length: default_max_context_length(),
            use_fallback: default_use_fallback(),
            document_filter: None,
        }
    }

    /// A request using the configured retrieval defaults.
    pub fn from_settings(query: impl Into<String>, settings: &RetrievalSettings) -> Self {
        Self {
            query: query.into(),
            max_results: settings.max_results,
            max_context_length: settings.max_context_length,
            use_fallback: settings.use_fallback,
            document_filter: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_context_length(mut self, max_context_length: usize) -> Self {
        self.max_context_length = max_context_length;
        self
    }

    pub fn with_fallback(mut self, use_fallback: bool) -> Self {
        self.use_fallback = use_fallback;
        self
    }

    pub fn with_document_filter(mut self, document_id: impl Into<String>) -> Self {
        self.document_filter = Some(document_id.into());
        self
    }

    /// Reject requests that cannot produce a meaningful answer.
    pub fn validate(&self) -> AppResult<()> {
        if self.query.trim().is_empty() {
            return Err(AppError::validation("query must not be empty"));
        }
        if self.max_results == 0 {
            return Err(AppError::validation("maxResults must be greater than zero"));
        }
        if self.max_context_length == 0 {
            return Err(AppError::validation(
                "maxContextLength must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Context gathered for one query, consumed by the prompt builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    pub local_context: String,
    pub web_context: String,
    pub used_fallback: bool,
    pub local_result_count: usize,

    /// Optional enhancements that failed along the way
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Completed,
    Error,
}

/// Final result of an answer request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub query: String,
    pub answer: String,
    pub local_context: String,
    pub web_context: String,
    pub used_fallback: bool,
    pub local_result_count: usize,
    pub status: AnswerStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AnswerResult {
    pub fn completed(query: &str, answer: String, outcome: RetrievalOutcome) -> Self {
        Self {
            query: query.to_string(),
            answer,
            local_context: outcome.local_context,
            web_context: outcome.web_context,
            used_fallback: outcome.used_fallback,
            local_result_count: outcome.local_result_count,
            status: AnswerStatus::Completed,
            warnings: outcome.warnings,
        }
    }

    /// An error result that keeps whatever context was gathered.
    pub fn failed(query: &str, error: &AppError, outcome: RetrievalOutcome) -> Self {
        Self {
            query: query.to_string(),
            answer: format!("Error: {}", error),
            local_context: outcome.local_context,
            web_context: outcome.web_context,
            used_fallback: outcome.used_fallback,
            local_result_count: outcome.local_result_count,
            status: AnswerStatus::Error,
            warnings: outcome.warnings,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AnswerStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: AnswerRequest = serde_json::from_str(r#"{"query": "What is RAG?"}"#).unwrap();
        assert_eq!(request.max_results, 5);
        assert_eq!(request.max_context_length, 2000);
        assert!(request.use_fallback);
        assert!(request.document_filter.is_none());
    }

    #[test]
    fn test_request_camel_case_fields() {
        let request: AnswerRequest = serde_json::from_str(
            r#"{"query": "q", "maxResults": 2, "maxContextLength": 300, "useFallback": false}"#,
        )
        .unwrap();
        assert_eq!(request.max_results, 2);
        assert_eq!(request.max_context_length, 300);
        assert!(!request.use_fallback);
    }

    #[test]
    fn test_request_validation() {
        assert!(AnswerRequest::new("ok").validate().is_ok());
        assert!(matches!(
            AnswerRequest::new("  ").validate(),
            Err(AppError::Validation(_))
        ));
        assert!(AnswerRequest::new("q").with_max_results(0).validate().is_err());
        assert!(AnswerRequest::new("q")
            .with_max_context_length(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrievalSettings {
            max_results: 9,
            use_fallback: false,
            ..RetrievalSettings::default()
        };
        let request = AnswerRequest::from_settings("q", &settings);
        assert_eq!(request.max_results, 9);
        assert!(!request.use_fallback);
    }

    #[test]
    fn test_failed_result_shape() {
        let err = AppError::Other("boom".to_string());
        let result = AnswerResult::failed("q", &err, RetrievalOutcome::default());
        assert_eq!(result.answer, "Error: boom");
        assert_eq!(result.status, AnswerStatus::Error);
        assert!(!result.is_completed());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["usedFallback"], false);
        assert!(json.get("warnings").is_none());
    }
}
