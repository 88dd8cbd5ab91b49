//! Document registry.
//!
//! Tracks ingested documents in an append-only `documents.jsonl` journal.
//! Every change appends the full record; the last line for an id wins.

use crate::types::{DocumentRecord, DocumentStatus};
use chrono::Utc;
use ragbot_core::{AppError, AppResult};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Journal-backed registry of ingested documents.
#[derive(Debug, Clone)]
pub struct DocumentRegistry {
    path: PathBuf,
}

impl DocumentRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record to the journal.
    pub fn record(&self, record: &DocumentRecord) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open documents.jsonl: {}", e)))?;

        let json_line = serde_json::to_string(record)
            .map_err(|e| AppError::Knowledge(format!("Failed to serialize document: {}", e)))?;

        writeln!(file, "{}", json_line).map_err(|e| {
            AppError::Knowledge(format!("Failed to write to documents.jsonl: {}", e))
        })?;

        file.sync_all()
            .map_err(|e| AppError::Knowledge(format!("Failed to sync documents.jsonl: {}", e)))?;

        tracing::debug!("Recorded document {} as {}", record.id, record.status.as_str());
        Ok(())
    }

    /// Latest record per document, in order of first appearance.
    ///
    /// Deleted documents are included.
    pub fn load(&self) -> AppResult<Vec<DocumentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open documents.jsonl: {}", e)))?;

        let mut records: Vec<DocumentRecord> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::Knowledge(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: DocumentRecord = serde_json::from_str(&line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Failed to parse line {} in documents.jsonl: {}",
                    line_num + 1,
                    e
                ))
            })?;

            match positions.get(&record.id) {
                Some(&pos) => records[pos] = record,
                None => {
                    positions.insert(record.id.clone(), records.len());
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    /// Documents that have not been deleted.
    pub fn list(&self) -> AppResult<Vec<DocumentRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| r.status != DocumentStatus::Deleted)
            .collect())
    }

    /// Latest record for `id`, deleted or not.
    pub fn get(&self, id: &str) -> AppResult<Option<DocumentRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    pub fn find_by_hash(&self, file_hash: &str) -> AppResult<Option<DocumentRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.file_hash == file_hash))
    }

    pub fn find_by_path(&self, path: &Path) -> AppResult<Option<DocumentRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.path == path))
    }

    /// Move a document to `target`.
    ///
    /// # Errors
    /// `Knowledge` for an unknown id, `Validation` when the transition
    /// skips or reverses a stage.
    pub fn transition(&self, id: &str, target: DocumentStatus) -> AppResult<DocumentRecord> {
        self.transition_with(id, target, |_| {})
    }

    /// Like [`transition`](Self::transition), applying `update` to the
    /// record before it is written.
    pub fn transition_with<F>(
        &self,
        id: &str,
        target: DocumentStatus,
        update: F,
    ) -> AppResult<DocumentRecord>
    where
        F: FnOnce(&mut DocumentRecord),
    {
        let mut record = self
            .get(id)?
            .ok_or_else(|| AppError::Knowledge(format!("Unknown document: {}", id)))?;

        if !record.status.can_transition_to(target) {
            return Err(AppError::validation(format!(
                "document {} cannot move from {} to {}",
                id,
                record.status.as_str(),
                target.as_str()
            )));
        }

        update(&mut record);
        record.status = target;
        record.updated_at = Utc::now();
        self.record(&record)?;

        Ok(record)
    }
}
