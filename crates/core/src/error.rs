//! Error types for ragbot.
//!
//! This module defines a unified error enum covering validation failures,
//! unavailable collaborators (embedding, vector search, LLM, web search),
//! partial failures of optional enhancements, and the usual configuration,
//! I/O and serialization errors.

use std::fmt;

use thiserror::Error;

/// External collaborator a request depended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    Embedding,
    VectorSearch,
    Llm,
    WebSearch,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Upstream::Embedding => "embedding",
            Upstream::VectorSearch => "vector-search",
            Upstream::Llm => "llm",
            Upstream::WebSearch => "web-search",
        };
        f.write_str(name)
    }
}

/// Unified error type for ragbot.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (empty query, non-positive chunk size, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A collaborator was unreachable, errored or timed out
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: Upstream, message: String },

    /// An optional enhancement failed but a usable result still exists
    #[error("Partial failure: {0}")]
    PartialFailure(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document registry and ingestion errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// True when this error reports the given collaborator as unavailable.
    pub fn is_upstream(&self, service: Upstream) -> bool {
        matches!(self, AppError::UpstreamUnavailable { service: s, .. } if *s == service)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display() {
        let err = AppError::upstream(Upstream::Llm, "connection refused");
        assert_eq!(err.to_string(), "llm unavailable: connection refused");
        assert!(err.is_upstream(Upstream::Llm));
        assert!(!err.is_upstream(Upstream::WebSearch));
    }

    #[test]
    fn test_validation_is_not_upstream() {
        let err = AppError::validation("query must not be empty");
        assert!(!err.is_upstream(Upstream::Embedding));
        assert_eq!(err.to_string(), "Validation error: query must not be empty");
    }
}
