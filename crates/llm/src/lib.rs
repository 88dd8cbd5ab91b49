//! LLM integration crate for ragbot.
//!
//! This crate provides the language-model collaborator used by the answer
//! pipeline: an availability probe, blocking generation and streaming
//! generation behind one trait.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use ragbot_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! if client.is_available().await {
//!     let request = LlmRequest::new("Hello, world!", "gemma:2b");
//!     let response = client.complete(&request).await?;
//!     println!("{}", response.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
