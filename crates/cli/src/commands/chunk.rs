//! Chunk command handler.
//!
//! Previews how a file is split without embedding or storing anything.

use super::print_json;
use clap::Args;
use ragbot_core::{config::AppConfig, AppResult};
use ragbot_knowledge::chunk_document;
use ragbot_knowledge::parser::{extract_text, DocumentKind};
use ragbot_knowledge::QualityFilter;
use std::path::PathBuf;

/// Show how a file would be chunked
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// File to chunk (.txt or .md)
    pub file: PathBuf,

    /// Target chunk size in characters
    #[arg(long)]
    pub size: Option<usize>,

    /// Characters carried over between chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Keep chunks the quality filter would drop
    #[arg(long)]
    pub no_filter: bool,

    /// Output chunks as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunk command for {:?}", self.file);

        let size = self.size.unwrap_or(config.chunking.chunk_size);
        let overlap = self.overlap.unwrap_or(config.chunking.overlap);

        let raw = std::fs::read(&self.file)?;
        let text = extract_text(DocumentKind::from_path(&self.file), &raw)?;

        let document_id = self
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "preview".to_string());

        let mut chunks = chunk_document(&document_id, &text, size, overlap)?;
        if !self.no_filter {
            chunks = QualityFilter::from(&config.chunking).apply(&document_id, chunks);
        }

        if self.json {
            return print_json(&chunks);
        }

        for chunk in &chunks {
            println!("[{}] ({} chars) {}", chunk.index, chunk.length, chunk.text);
        }
        println!(
            "{} chunks (size {}, overlap {})",
            chunks.len(),
            size,
            overlap
        );

        Ok(())
    }
}
