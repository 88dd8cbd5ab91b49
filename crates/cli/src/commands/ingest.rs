//! Ingest command handler.

use super::print_json;
use crate::services::Services;
use clap::Args;
use ragbot_core::{AppError, AppResult};
use ragbot_knowledge::IngestReport;
use std::path::PathBuf;
use std::time::Instant;

/// Ingest files or directories into the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output the per-file reports as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} paths", self.paths.len());
        let start = Instant::now();

        let mut reports: Vec<IngestReport> = Vec::new();
        for path in &self.paths {
            reports.extend(services.ingestor.ingest_path(path).await?);
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();

        if self.json {
            print_json(&reports)?;
        } else {
            for report in &reports {
                println!("{}", describe(report));
            }

            let stored = reports
                .iter()
                .filter(|r| !r.is_failure() && !r.skipped)
                .count();
            let skipped = reports.iter().filter(|r| r.skipped).count();
            let chunks: usize = reports
                .iter()
                .filter(|r| !r.is_failure() && !r.skipped)
                .map(|r| r.chunk_count)
                .sum();

            println!(
                "Ingested {} documents ({} chunks), {} unchanged, {} failed in {:.2}s",
                stored,
                chunks,
                skipped,
                failed,
                start.elapsed().as_secs_f64()
            );
        }

        if failed > 0 {
            return Err(AppError::Knowledge(format!(
                "{} of {} files failed to ingest",
                failed,
                reports.len()
            )));
        }

        Ok(())
    }
}

fn describe(report: &IngestReport) -> String {
    let path = report.path.display();

    match (&report.error, report.skipped) {
        (Some(error), _) => format!("failed    {}: {}", path, error),
        (None, true) => format!("unchanged {}", path),
        (None, false) => format!("stored    {} ({} chunks)", path, report.chunk_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_knowledge::DocumentStatus;

    fn report(error: Option<&str>, skipped: bool) -> IngestReport {
        IngestReport {
            path: PathBuf::from("docs/guide.md"),
            document_id: Some("doc-1".to_string()),
            status: Some(DocumentStatus::Stored),
            chunk_count: 4,
            skipped,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&report(None, false)),
            "stored    docs/guide.md (4 chunks)"
        );
        assert_eq!(describe(&report(None, true)), "unchanged docs/guide.md");
        assert!(describe(&report(Some("boom"), false)).ends_with(": boom"));
    }
}
