//! Command handlers for the ragbot CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chunk;
pub mod documents;
pub mod health;
pub mod ingest;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chunk::ChunkCommand;
pub use documents::DocumentsCommand;
pub use health::HealthCommand;
pub use ingest::IngestCommand;

use ragbot_core::{AppError, AppResult};
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
