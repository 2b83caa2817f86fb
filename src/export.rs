//! Export a pipeline run as JSON.
//!
//! Produces the aggregated-fragment collection in a shape downstream
//! ingestion and evaluation tooling can consume directly, plus enough
//! run metadata to tell a complete run from a degraded one.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::models::AggregatedFragment;
use crate::pipeline::PipelineRun;

#[derive(Serialize)]
struct ExportData<'a> {
    generated_at: String,
    complete: bool,
    error: Option<String>,
    skipped_documents: Vec<i64>,
    rows_fetched: u64,
    rows_kept: u64,
    fragments: &'a [AggregatedFragment],
}

/// Write a run as pretty JSON to `output`, or to stdout when `None`.
pub fn write_run(run: &PipelineRun, output: Option<&Path>) -> Result<()> {
    let data = ExportData {
        generated_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        complete: run.is_complete(),
        error: run.error.as_ref().map(|e| e.to_string()),
        skipped_documents: run.skipped_documents.iter().map(|(doc, _)| *doc).collect(),
        rows_fetched: run.rows_fetched,
        rows_kept: run.rows_kept,
        fragments: &run.fragments,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} fragments to {}",
                run.fragments.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
