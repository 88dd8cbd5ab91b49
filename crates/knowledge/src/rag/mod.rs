//! Retrieval-augmented answering.
//!
//! Decides when local knowledge needs a web fallback, assembles bounded
//! context and orchestrates blocking and streaming generation.

pub mod context;
pub mod fallback;
pub mod pipeline;
pub mod types;

pub use context::{assemble, assemble_hybrid, assemble_web, split_budget};
pub use fallback::{decide, should_use_fallback, FallbackDecider, FallbackReason};
pub use pipeline::{AnswerStream, PipelineSettings, RagPipeline};
pub use types::{AnswerRequest, AnswerResult, AnswerStatus, RetrievalOutcome};
