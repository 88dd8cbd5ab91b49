//! Documents command handler.

use super::print_json;
use crate::services::Services;
use clap::{Args, Subcommand};
use ragbot_core::AppResult;

/// List or delete ingested documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    pub action: Option<DocumentsAction>,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List documents that have not been deleted
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a document and its stored chunks
    Delete {
        /// Document id
        id: String,
    },
}

impl DocumentsCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        match &self.action {
            None => list(services, false),
            Some(DocumentsAction::List { json }) => list(services, *json),
            Some(DocumentsAction::Delete { id }) => {
                let removed = services.ingestor.delete_document(id).await?;
                println!("Deleted document {} ({} chunks removed)", id, removed);
                Ok(())
            }
        }
    }
}

fn list(services: &Services, json: bool) -> AppResult<()> {
    let records = services.ingestor.registry().list()?;

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No documents ingested yet");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {:<9}  {:>4} chunks  {}",
            record.id,
            record.status.as_str(),
            record.chunk_count,
            record.path.display()
        );
        if let Some(error) = &record.error {
            println!("    error: {}", error);
        }
    }

    Ok(())
}
