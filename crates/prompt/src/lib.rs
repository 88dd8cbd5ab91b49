//! Prompt construction for ragbot.
//!
//! This crate turns assembled context into the text sent to the language
//! model:
//! - Handlebars templates for the basic (local only) and hybrid
//!   (local + web) prompts
//! - Optional per-workspace template overrides in `.ragbot/prompts/`

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::PromptBuilder;
pub use loader::{list_prompts, load_overrides};
pub use types::{BasicPromptVars, HybridPromptVars, PromptKind};
