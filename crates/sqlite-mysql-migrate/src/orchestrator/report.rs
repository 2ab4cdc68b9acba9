//! Run and per-table reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::traits::ServerFlavor;
use crate::error::{MigrateError, Result};
use crate::transfer::{BatchFailure, TransferStats};

/// Final state of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// Created and every batch committed.
    Succeeded,
    /// Some batches committed, some did not.
    Partial,
    /// Nothing was transferred.
    Failed,
}

/// What happened to one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub name: String,
    pub outcome: TableOutcome,
    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub batches_attempted: u64,
    pub batches_succeeded: u64,
    pub values_nulled: u64,
    pub failed_batches: Vec<BatchFailure>,
    pub error: Option<String>,
    /// Column details the target could not carry, e.g. dropped defaults.
    pub warnings: Vec<String>,
    pub duration_seconds: f64,
}

impl TableReport {
    /// A table that failed before any rows moved.
    pub fn failed(name: impl Into<String>, err: &MigrateError) -> Self {
        Self {
            name: name.into(),
            outcome: TableOutcome::Failed,
            rows_attempted: 0,
            rows_inserted: 0,
            batches_attempted: 0,
            batches_succeeded: 0,
            values_nulled: 0,
            failed_batches: Vec::new(),
            error: Some(err.to_string()),
            warnings: Vec::new(),
            duration_seconds: 0.0,
        }
    }

    /// A table whose schema was created and whose rows were transferred.
    pub fn from_transfer(name: impl Into<String>, stats: TransferStats) -> Self {
        let outcome = if stats.is_complete() {
            TableOutcome::Succeeded
        } else if stats.batches_succeeded > 0 {
            TableOutcome::Partial
        } else {
            TableOutcome::Failed
        };

        let error = match (&stats.source_error, stats.failed_batches.len()) {
            (Some(e), _) => Some(format!("source read stopped early: {}", e)),
            (None, 0) => None,
            (None, n) => Some(format!(
                "{} of {} batches failed",
                n, stats.batches_attempted
            )),
        };

        Self {
            name: name.into(),
            outcome,
            rows_attempted: stats.rows_attempted,
            rows_inserted: stats.rows_inserted,
            batches_attempted: stats.batches_attempted,
            batches_succeeded: stats.batches_succeeded,
            values_nulled: stats.values_nulled,
            failed_batches: stats.failed_batches,
            error,
            warnings: Vec::new(),
            duration_seconds: stats.elapsed.as_secs_f64(),
        }
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Source description.
    pub source: String,

    /// Target description.
    pub target: String,

    /// Detected target flavor.
    pub server_flavor: ServerFlavor,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table results in processing order.
    pub tables: Vec<TableReport>,

    /// Run-level error, e.g. the source table list could not be read.
    pub error: Option<String>,

    /// True only when every table succeeded and there was no run-level error.
    pub success: bool,
}

impl MigrationReport {
    pub(crate) fn new(
        run_id: String,
        source: String,
        target: String,
        server_flavor: ServerFlavor,
        started_at: DateTime<Utc>,
        tables: Vec<TableReport>,
        error: Option<String>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let success =
            error.is_none() && tables.iter().all(|t| t.outcome == TableOutcome::Succeeded);

        Self {
            run_id,
            source,
            target,
            server_flavor,
            started_at,
            completed_at,
            duration_seconds,
            tables,
            error,
            success,
        }
    }

    /// Names of tables with the given outcome.
    pub fn tables_with(&self, outcome: TableOutcome) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.outcome == outcome)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Get a table's report by name.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Rows read across all tables.
    pub fn rows_attempted(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_attempted).sum()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Error if the run did not fully succeed.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let partial = self.tables_with(TableOutcome::Partial);
        let failed = self.tables_with(TableOutcome::Failed);
        let mut parts = Vec::new();
        if let Some(e) = &self.error {
            parts.push(e.clone());
        }
        if !partial.is_empty() {
            parts.push(format!("partial: {}", partial.join(", ")));
        }
        if !failed.is_empty() {
            parts.push(format!("failed: {}", failed.join(", ")));
        }
        Err(MigrateError::Incomplete(parts.join("; ")))
    }

    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        let succeeded = self.tables_with(TableOutcome::Succeeded);
        let partial = self.tables_with(TableOutcome::Partial);
        let failed = self.tables_with(TableOutcome::Failed);

        info!(
            "Migration {} finished in {:.2}s: {} tables succeeded, {} partial, {} failed, {} rows read",
            self.run_id,
            self.duration_seconds,
            succeeded.len(),
            partial.len(),
            failed.len(),
            self.rows_attempted()
        );
        if !partial.is_empty() {
            warn!("Partially migrated: {}", partial.join(", "));
        }
        if !failed.is_empty() {
            error!("Failed: {}", failed.join(", "));
        }
        if let Some(e) = &self.error {
            error!("Run error: {}", e);
        }
    }
}
