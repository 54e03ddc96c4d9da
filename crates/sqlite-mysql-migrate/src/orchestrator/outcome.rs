//! Per-phase results of a migration run.
//!
//! Failures are caught at the smallest unit of work (row, batch, table) and
//! recorded here instead of propagating, so a run always reaches the end of
//! its table plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a run may change the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Read and sanitize everything, write nothing.
    DryRun,
    /// Truncate and load the target.
    Live,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            RunMode::DryRun
        } else {
            RunMode::Live
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => f.write_str("DRY RUN"),
            RunMode::Live => f.write_str("LIVE"),
        }
    }
}

/// Why a table was not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Schema bookkeeping table, never copied.
    Bookkeeping,
    /// Source table missing or empty.
    NoData,
    /// Target table already holds rows.
    NotEmpty { existing: i64 },
    /// Dry run: rows that would have been inserted.
    DryRun { rows: usize },
}

/// A row that could not be inserted even on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Position of the row in the source table's row set.
    pub index: usize,
    /// The row's fields as a JSON object.
    pub payload: String,
    /// Error reported by the target.
    pub reason: String,
}

/// Result of transferring one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    /// Every row was inserted.
    Success { rows: u64 },
    /// Table was deliberately not loaded.
    Skipped(SkipReason),
    /// Some rows were inserted, the rest failed individually.
    PartialFailure {
        succeeded: u64,
        failed_rows: Vec<RowFailure>,
    },
    /// The table could not be processed at all.
    Failed { reason: String },
}

impl TableOutcome {
    /// Rows written to the target.
    pub fn rows_written(&self) -> u64 {
        match self {
            TableOutcome::Success { rows } => *rows,
            TableOutcome::PartialFailure { succeeded, .. } => *succeeded,
            _ => 0,
        }
    }

    /// Rows that could not be written.
    pub fn rows_failed(&self) -> usize {
        match self {
            TableOutcome::PartialFailure { failed_rows, .. } => failed_rows.len(),
            _ => 0,
        }
    }
}

/// Outcome of one table in the transfer phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Result of clearing one table in the reset phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TruncateOutcome {
    Truncated,
    /// Table does not exist in the target.
    Missing,
    Failed { reason: String },
}

/// Outcome of one table in the reset phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateReport {
    pub table: String,
    #[serde(flatten)]
    pub outcome: TruncateOutcome,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Dry run or live.
    pub mode: RunMode,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables in processing order.
    pub plan: Vec<String>,

    /// Reset phase results, in truncation order.
    pub truncations: Vec<TruncateReport>,

    /// Transfer phase results, in plan order.
    pub tables: Vec<TableReport>,

    /// Whether foreign key checks were switched back on (always false for dry runs).
    pub foreign_key_checks_restored: bool,
}

impl MigrationResult {
    /// Total rows written to the target.
    pub fn rows_transferred(&self) -> u64 {
        self.tables.iter().map(|t| t.outcome.rows_written()).sum()
    }

    /// Total rows that failed individually.
    pub fn rows_failed(&self) -> usize {
        self.tables.iter().map(|t| t.outcome.rows_failed()).sum()
    }

    /// Look up the report for one table.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    fn count(&self, pred: impl Fn(&TableOutcome) -> bool) -> usize {
        self.tables.iter().filter(|t| pred(&t.outcome)).count()
    }

    pub fn tables_success(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Success { .. }))
    }

    pub fn tables_skipped(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Skipped(_)))
    }

    pub fn tables_partial(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::PartialFailure { .. }))
    }

    pub fn tables_failed(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Failed { .. }))
    }

    /// Tables that lost rows or failed outright.
    pub fn degraded_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| {
                matches!(
                    t.outcome,
                    TableOutcome::PartialFailure { .. } | TableOutcome::Failed { .. }
                )
            })
            .map(|t| t.table.as_str())
            .collect()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
