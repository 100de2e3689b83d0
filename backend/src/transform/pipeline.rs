//! High-level pipeline API: extract -> transform -> load.
//!
//! One run reads the four input extracts from a [`Source`], builds the star
//! schema and loads the four tables into a [`Sink`]. Every failure aborts the
//! run and surfaces as a single error; nothing is committed unless all four
//! tables were written.
//!
//! # Example
//!
//! ```rust,ignore
//! use starload::{run, DirectorySink, DirectorySource, PipelineOptions};
//! use starload::{TriggerEvent, WarehouseConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let event = TriggerEvent::new("./uploads", "ordersdf.csv");
//!     let source = DirectorySource::new(&event.bucket);
//!     let sink = DirectorySink::from_config(&WarehouseConfig::from_env());
//!
//!     let report = run(&event, &source, &sink, &PipelineOptions::default()).await;
//!     println!("{} -> {:?}", report.run_id, report.status);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{build_star_schema, StarSchema};
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{extract, TriggerEvent};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::OUTPUT_TABLES;
use crate::storage::{Sink, Source};

/// Options for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Input CSV delimiter (auto-detect if not specified)
    pub delimiter: Option<char>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Ignored,
    Failed,
}

/// A table loaded by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedTable {
    pub name: String,
    pub rows: usize,
}

/// Report of one run, as returned to the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub message: String,
    /// Error kind when the run failed
    pub error_kind: Option<String>,
    pub tables: Vec<LoadedTable>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>, status: RunStatus, message: String) -> Self {
        Self {
            run_id,
            status,
            message,
            error_kind: None,
            tables: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// HTTP-style status: 200 when completed or ignored, 500 when failed.
    pub fn status_code(&self) -> u16 {
        match self.status {
            RunStatus::Completed | RunStatus::Ignored => 200,
            RunStatus::Failed => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != RunStatus::Failed
    }
}

/// Load the four output tables in order, then commit.
///
/// If any write or the commit fails the sink is told to abort and the error
/// is returned; no table of the run is left committed.
pub async fn load(schema: &StarSchema, sink: &dyn Sink) -> PipelineResult<Vec<LoadedTable>> {
    log_info("📤 Loading tables...");
    let mut loaded = Vec::with_capacity(OUTPUT_TABLES.len());

    for (name, table) in schema.tables() {
        if let Err(source) = sink.write(name, &table).await {
            log_error(format!("Failed to write {}: {}", name, source));
            abort(sink).await;
            return Err(PipelineError::SinkWrite {
                table: name.to_string(),
                source,
            });
        }
        log_info_indent(format!("{}: {} rows", name, table.len()), 1);
        loaded.push(LoadedTable {
            name: name.to_string(),
            rows: table.len(),
        });
    }

    if let Err(source) = sink.commit().await {
        log_error(format!("Failed to commit tables: {}", source));
        abort(sink).await;
        return Err(PipelineError::SinkWrite {
            table: OUTPUT_TABLES.join(", "),
            source,
        });
    }

    log_success(format!("Loaded {} tables", loaded.len()));
    Ok(loaded)
}

async fn abort(sink: &dyn Sink) {
    if let Err(e) = sink.abort().await {
        log_warning(format!("Abort after failed load also failed: {}", e));
    }
}

/// Run the pipeline for a relevant trigger, returning the loaded tables.
///
/// Does not check relevance; see [`run`].
pub async fn try_run(
    source: &dyn Source,
    sink: &dyn Sink,
    options: &PipelineOptions,
) -> PipelineResult<Vec<LoadedTable>> {
    let data = extract(source, options.delimiter).await?;
    let schema = build_star_schema(&data)?;
    load(&schema, sink).await
}

/// Handle one trigger event.
///
/// Events for files that are not pipeline inputs are ignored without reading
/// anything. Otherwise the full pipeline runs and any failure is folded into a
/// failed report carrying the error kind and message.
pub async fn run(
    event: &TriggerEvent,
    source: &dyn Source,
    sink: &dyn Sink,
    options: &PipelineOptions,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    if !event.is_relevant() {
        log_info(format!("⏭️  Ignoring upload of '{}'", event.name));
        return RunReport::new(
            run_id,
            started_at,
            RunStatus::Ignored,
            format!("File {} is not an input file, skipping", event.name),
        );
    }

    log_info(format!("🚀 Run {} triggered by {}/{}", run_id, event.bucket, event.name));

    match try_run(source, sink, options).await {
        Ok(tables) => {
            log_success("ETL pipeline executed successfully");
            let mut report = RunReport::new(
                run_id,
                started_at,
                RunStatus::Completed,
                "ETL pipeline executed successfully".to_string(),
            );
            report.tables = tables;
            report
        }
        Err(e) => {
            log_error(format!("{}: {}", e.kind(), e));
            let mut report = RunReport::new(run_id, started_at, RunStatus::Failed, e.to_string());
            report.error_kind = Some(e.kind().to_string());
            report
        }
    }
}
