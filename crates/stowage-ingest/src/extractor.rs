//! Extraction of the configured object mapping into landing tables.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use stowage_core::{logging, Result, Store};

use crate::landing::LandingLoader;
use crate::payload::{decode, PayloadFormat};
use crate::source::ObjectSource;

/// What happened to one mapped object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Loaded {
        key: String,
        table: String,
        rows_loaded: u64,
    },
    /// The key's extension is not a supported payload format.
    Skipped {
        key: String,
        table: String,
    },
    Failed {
        key: String,
        table: String,
        message: String,
    },
}

impl FileOutcome {
    pub fn key(&self) -> &str {
        match self {
            Self::Loaded { key, .. } | Self::Skipped { key, .. } | Self::Failed { key, .. } => key,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one extraction run, one outcome per mapped object in file order.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcomes: Vec<FileOutcome>,
}

impl ExtractionReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(FileOutcome::is_failure)
    }

    pub fn total_rows_loaded(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o {
                FileOutcome::Loaded { rows_loaded, .. } => *rows_loaded,
                _ => 0,
            })
            .sum()
    }
}

/// Moves mapped objects from an [`ObjectSource`] into landing tables.
pub struct S3Extractor<S> {
    source: Box<dyn ObjectSource>,
    loader: LandingLoader<S>,
    files: Vec<(String, String)>,
}

impl<S: Store> S3Extractor<S> {
    /// `files` maps object keys to landing table names and is processed in order.
    pub fn new(
        source: Box<dyn ObjectSource>,
        loader: LandingLoader<S>,
        files: Vec<(String, String)>,
    ) -> Self {
        Self {
            source,
            loader,
            files,
        }
    }

    /// Fetch, decode and load one object. `None` means the key was skipped.
    pub async fn extract_file(&self, key: &str, table: &str) -> Result<Option<u64>> {
        let Some(format) = PayloadFormat::from_key(key) else {
            return Ok(None);
        };

        let body = self.source.fetch(key).await?;
        let records = decode(format, &body)?;
        let rows = self.loader.load(table, &records).await?;
        Ok(Some(rows))
    }

    /// Process every mapped object. Errors are recorded per file; the run
    /// always reaches the end of the mapping.
    #[instrument(
        skip(self),
        fields(subsystem = logging::SUBSYSTEM_INGEST, component = "extractor", op = "extract_all")
    )]
    pub async fn extract_all(&self) -> ExtractionReport {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(run_id = %run_id, file_count = self.files.len(), "Starting extraction run");

        let mut outcomes = Vec::with_capacity(self.files.len());
        for (key, table) in &self.files {
            info!(
                object_key = %key,
                table = %table,
                location = %self.source.locate(key),
                "Processing object"
            );

            let outcome = match self.extract_file(key, table).await {
                Ok(Some(rows_loaded)) => {
                    info!(object_key = %key, table = %table, rows_loaded, "Processed {}", key);
                    FileOutcome::Loaded {
                        key: key.clone(),
                        table: table.clone(),
                        rows_loaded,
                    }
                }
                Ok(None) => {
                    warn!(object_key = %key, table = %table, "Skipping object with unsupported format");
                    FileOutcome::Skipped {
                        key: key.clone(),
                        table: table.clone(),
                    }
                }
                Err(err) => {
                    error!(
                        object_key = %key,
                        table = %table,
                        error = %err,
                        "Error processing {}",
                        key
                    );
                    FileOutcome::Failed {
                        key: key.clone(),
                        table: table.clone(),
                        message: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = ExtractionReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            outcomes,
        };
        info!(
            run_id = %run_id,
            files = report.outcomes.len(),
            failed = report.outcomes.iter().filter(|o| o.is_failure()).count(),
            rows_loaded = report.total_rows_loaded(),
            duration_ms = report.duration_ms,
            "Extraction run complete"
        );
        report
    }
}
