//! Migration orchestrator - main workflow coordinator.
//!
//! A run has four sequential phases:
//!
//! 1. build the [`TablePlan`] from the source's tables;
//! 2. reset the target: disable foreign key checks, truncate in reverse plan order;
//! 3. copy each table in plan order: read, sanitize, insert in batches,
//!    falling back to row-by-row inserts when a batch fails;
//! 4. re-enable foreign key checks.
//!
//! Phases 2 and 4 and every target write are skipped in [`RunMode::DryRun`].

mod outcome;

pub use outcome::{
    MigrationResult, RowFailure, RunMode, SkipReason, TableOutcome, TableReport,
    TruncateOutcome, TruncateReport,
};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::{Batch, Row, SourceReader, TableData, TargetWriter};
use crate::drivers::{MysqlWriter, SqliteReader};
use crate::error::Result;
use crate::plan::TablePlan;
use crate::sanitize::sanitize_table;

/// Copies every table of the source into the target.
pub struct Migrator {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    config: MigrationConfig,
    mode: RunMode,
}

/// Result of a connection test against both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// Row counts of one table on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCountCheck {
    pub table: String,
    pub source_rows: i64,
    /// `None` when the target count could not be read.
    pub target_rows: Option<i64>,
    pub target_error: Option<String>,
    pub matches: bool,
}

impl Migrator {
    /// Create a migrator over already opened stores.
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        config: MigrationConfig,
        mode: RunMode,
    ) -> Self {
        Self {
            source,
            target,
            config,
            mode,
        }
    }

    /// Open the SQLite source and MySQL target named in the configuration.
    ///
    /// This is the only fallible step before a run: failing to reach either
    /// database aborts before anything is read or written.
    pub async fn connect(config: &Config, mode: RunMode) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;
        let target = MysqlWriter::new(&config.target).await?;
        Ok(Self::new(
            Arc::new(source),
            Arc::new(target),
            config.migration.clone(),
            mode,
        ))
    }

    /// Compute the table plan from the source's tables.
    pub async fn plan(&self) -> Result<TablePlan> {
        let discovered = self.source.list_tables().await?;
        Ok(TablePlan::from_config(&self.config, &discovered))
    }

    /// Run the migration.
    ///
    /// Only listing the source tables can fail; every later failure is
    /// logged, recorded in the result, and the run moves on.
    pub async fn run(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let dry_run = self.mode.is_dry_run();

        if dry_run {
            info!("Running in DRY RUN mode - no changes will be made to the target database");
        } else {
            info!("Running in LIVE mode - changes will be made to the target database");
        }
        info!(
            "Starting data migration from {} to {} (chunk size {})",
            self.source.db_type(),
            self.target.db_type(),
            self.config.chunk_size
        );

        let plan = self.plan().await?;
        info!("Table plan: {}", plan.tables().join(", "));

        // Phase 2: reset target
        let truncations = if dry_run {
            info!("[DRY RUN] Would disable foreign key checks");
            if self.config.truncate_before_load {
                info!("[DRY RUN] Would truncate all tables in reverse order");
            }
            Vec::new()
        } else {
            match self.target.set_foreign_key_checks(false).await {
                Ok(()) => info!("Disabled foreign key checks for import"),
                Err(e) => error!("Error disabling foreign key checks: {}", e),
            }
            if self.config.truncate_before_load {
                self.truncate_tables(&plan).await
            } else {
                Vec::new()
            }
        };

        // Phase 3: transfer
        let mut tables = Vec::with_capacity(plan.len());
        for table in &plan {
            let outcome = self.transfer_table(table).await;
            tables.push(TableReport {
                table: table.clone(),
                outcome,
            });
        }

        // Phase 4: restore constraints
        let foreign_key_checks_restored = if dry_run {
            info!("[DRY RUN] Would re-enable foreign key checks");
            false
        } else {
            match self.target.set_foreign_key_checks(true).await {
                Ok(()) => {
                    info!("Re-enabled foreign key checks");
                    true
                }
                Err(e) => {
                    error!("Error re-enabling foreign key checks: {}", e);
                    false
                }
            }
        };

        let completed_at = Utc::now();
        let result = MigrationResult {
            run_id,
            mode: self.mode,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            plan: plan.tables().to_vec(),
            truncations,
            tables,
            foreign_key_checks_restored,
        };

        if dry_run {
            info!("[DRY RUN] Data migration simulation completed");
        } else {
            info!(
                "Data migration completed: {} rows in {:.1}s, {} rows failed",
                result.rows_transferred(),
                result.duration_seconds,
                result.rows_failed()
            );
        }
        let degraded = result.degraded_tables();
        if !degraded.is_empty() {
            warn!("Tables with errors: {}", degraded.join(", "));
        }

        Ok(result)
    }

    /// Truncate every planned table that exists in the target, in reverse plan order.
    async fn truncate_tables(&self, plan: &TablePlan) -> Vec<TruncateReport> {
        info!("Truncating all target tables before import...");
        let mut reports = Vec::with_capacity(plan.len());

        for table in plan.truncate_order() {
            let outcome = match self.target.table_exists(table).await {
                Ok(false) => {
                    debug!("Table {} does not exist in target, nothing to truncate", table);
                    TruncateOutcome::Missing
                }
                Ok(true) => match self.target.truncate_table(table).await {
                    Ok(()) => {
                        info!("Truncated table: {}", table);
                        TruncateOutcome::Truncated
                    }
                    Err(e) => {
                        error!("Error truncating table {}: {}", table, e);
                        TruncateOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
                Err(e) => {
                    error!("Error truncating table {}: {}", table, e);
                    TruncateOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            reports.push(TruncateReport {
                table: table.clone(),
                outcome,
            });
        }

        let failed = reports
            .iter()
            .filter(|r| matches!(r.outcome, TruncateOutcome::Failed { .. }))
            .count();
        if failed == 0 {
            info!("All tables truncated successfully");
        } else {
            warn!("{} tables could not be truncated", failed);
        }

        reports
    }

    /// Read, sanitize and load one table.
    async fn transfer_table(&self, table: &str) -> TableOutcome {
        if table == self.config.bookkeeping_table {
            info!("Skipping {} table", table);
            return TableOutcome::Skipped(SkipReason::Bookkeeping);
        }

        info!("Processing table: {}", table);

        let mut data = match self.source.read_table(table).await {
            Ok(data) => data,
            Err(e) => return Self::table_failed(table, "reading source rows", e.to_string()),
        };

        if data.is_empty() {
            info!("No data found in table: {}", table);
            return TableOutcome::Skipped(SkipReason::NoData);
        }
        info!("Found {} rows in table: {}", data.len(), table);

        if self.config.sanitize_urls {
            let changed = sanitize_table(&mut data);
            if changed > 0 {
                debug!("Sanitized {} fields in {}", changed, table);
            }
        }

        if self.mode.is_dry_run() {
            info!(
                "[DRY RUN] Would insert {} records into table: {}",
                data.len(),
                table
            );
            return TableOutcome::Skipped(SkipReason::DryRun { rows: data.len() });
        }

        match self.target.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => {
                return Self::table_failed(
                    table,
                    "checking target table",
                    "table does not exist in target".to_string(),
                )
            }
            Err(e) => return Self::table_failed(table, "checking target table", e.to_string()),
        }

        if self.config.skip_if_non_empty {
            match self.target.row_count(table).await {
                Ok(0) => {}
                Ok(existing) => {
                    info!(
                        "Table {} already has {} records. Skipping to avoid duplicates.",
                        table, existing
                    );
                    return TableOutcome::Skipped(SkipReason::NotEmpty { existing });
                }
                Err(e) => {
                    return Self::table_failed(table, "counting target rows", e.to_string())
                }
            }
        }

        let target_columns = match self.target.column_names(table).await {
            Ok(columns) => columns,
            Err(e) => return Self::table_failed(table, "loading target columns", e.to_string()),
        };
        let dropped = data.retain_columns(&target_columns);
        if !dropped.is_empty() {
            warn!(
                "Table {}: columns missing in target, not copied: {}",
                table,
                dropped.join(", ")
            );
        }
        if data.columns.is_empty() {
            return Self::table_failed(
                table,
                "matching columns",
                "no source column exists in target".to_string(),
            );
        }

        let outcome = self.write_table(table, data).await;
        info!("Completed migration for table: {}", table);
        outcome
    }

    /// Insert rows in batches; retry a failed batch one row at a time.
    async fn write_table(&self, table: &str, mut data: TableData) -> TableOutcome {
        let columns = std::mem::take(&mut data.columns);
        let batches = data.into_batches(self.config.chunk_size);
        let total = batches.len();

        let mut succeeded: u64 = 0;
        let mut failed_rows = Vec::new();

        for (idx, batch) in batches.iter().enumerate() {
            match self.target.write_batch(table, &columns, batch).await {
                Ok(written) => {
                    succeeded += written;
                    debug!("Inserted chunk {} of {} into {}", idx + 1, total, table);
                }
                Err(e) => {
                    warn!("Error inserting data into {}: {}", table, e);
                    warn!("Attempting to insert records one by one...");
                    let (written, failures) = self.write_rows(table, &columns, batch).await;
                    succeeded += written;
                    failed_rows.extend(failures);
                }
            }
        }

        if failed_rows.is_empty() {
            TableOutcome::Success { rows: succeeded }
        } else {
            warn!(
                "Table {}: {} rows inserted, {} rows failed",
                table,
                succeeded,
                failed_rows.len()
            );
            TableOutcome::PartialFailure {
                succeeded,
                failed_rows,
            }
        }
    }

    /// Insert the rows of a failed batch individually.
    async fn write_rows(
        &self,
        table: &str,
        columns: &[String],
        batch: &Batch,
    ) -> (u64, Vec<RowFailure>) {
        let mut written = 0;
        let mut failures = Vec::new();

        for (pos, values) in batch.rows.iter().enumerate() {
            let index = batch.offset + pos;
            let single = Batch::new(vec![values.clone()]).with_offset(index);

            match self.target.write_batch(table, columns, &single).await {
                Ok(n) => written += n,
                Err(e) => {
                    let payload = Row::new(columns, values).to_json();
                    error!("Problem record in {} (row {}): {}", table, index + 1, payload);
                    error!("Error: {}", e);
                    failures.push(RowFailure {
                        index,
                        payload,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (written, failures)
    }

    fn table_failed(table: &str, step: &str, reason: String) -> TableOutcome {
        error!("Error processing table {} ({}): {}", table, step, reason);
        TableOutcome::Failed { reason }
    }

    /// Test connectivity to both databases.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let source = self.source.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let result = HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
            healthy: false,
        };

        HealthCheckResult {
            healthy: result.source_connected && result.target_connected,
            ..result
        }
    }

    /// Compare row counts between source and target for every planned table.
    pub async fn validate(&self) -> Result<Vec<RowCountCheck>> {
        let plan = self.plan().await?;
        let mut results = Vec::with_capacity(plan.len());

        for table in &plan {
            let source_rows = self.source.row_count(table).await?;
            let (target_rows, target_error) = match self.target.row_count(table).await {
                Ok(count) => (Some(count), None),
                Err(e) => {
                    warn!("{}: could not count target rows: {}", table, e);
                    (None, Some(e.to_string()))
                }
            };

            let matches = target_rows == Some(source_rows);
            match target_rows {
                Some(_) if matches => info!("{}: {} rows (match)", table, source_rows),
                Some(target) => warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table, source_rows, target
                ),
                None => {}
            }

            results.push(RowCountCheck {
                table: table.clone(),
                source_rows,
                target_rows,
                target_error,
                matches,
            });
        }

        Ok(results)
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}
