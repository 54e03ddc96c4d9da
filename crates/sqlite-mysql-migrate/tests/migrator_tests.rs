//! Migrator tests against in-memory source and target stores.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlite_mysql_migrate::{
    Batch, MigrateError, MigrationConfig, Migrator, Result, RunMode, SkipReason, SourceReader,
    SqlValue, TableData, TableOutcome, TargetWriter, TruncateOutcome,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct MemorySource {
    tables: Vec<(String, TableData)>,
    fail_listing: bool,
}

impl MemorySource {
    fn with_table(mut self, name: &str, data: TableData) -> Self {
        self.tables.push((name.to_string(), data));
        self
    }

    fn find(&self, table: &str) -> Option<&TableData> {
        self.tables.iter().find(|(n, _)| n == table).map(|(_, d)| d)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(MigrateError::pool("disk I/O error", "listing tables"));
        }
        Ok(self.tables.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.find(table).is_some())
    }

    async fn read_table(&self, table: &str) -> Result<TableData> {
        Ok(self.find(table).cloned().unwrap_or_default())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self.find(table).map(|d| d.len() as i64).unwrap_or(0))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    ForeignKeyChecks(bool),
    Truncate(String),
    Insert { table: String, rows: usize },
}

#[derive(Default)]
struct TargetTable {
    columns: Vec<String>,
    rows: Vec<HashMap<String, SqlValue>>,
}

type RowFilter = Box<dyn Fn(&str, &[String], &[SqlValue]) -> bool + Send + Sync>;

#[derive(Default)]
struct TargetState {
    tables: HashMap<String, TargetTable>,
    calls: Vec<Call>,
}

#[derive(Default)]
struct MemoryTarget {
    state: Mutex<TargetState>,
    failing_truncates: HashSet<String>,
    rejects: Option<RowFilter>,
    offline: bool,
}

impl MemoryTarget {
    fn with_table(self, name: &str, columns: &[&str]) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            TargetTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    fn with_existing_rows(self, name: &str, count: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let table = state.tables.get_mut(name).unwrap();
            for _ in 0..count {
                table.rows.push(HashMap::new());
            }
        }
        self
    }

    fn failing_truncate(mut self, name: &str) -> Self {
        self.failing_truncates.insert(name.to_string());
        self
    }

    fn rejecting(
        mut self,
        filter: impl Fn(&str, &[String], &[SqlValue]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rejects = Some(Box::new(filter));
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn rows(&self, table: &str) -> Vec<HashMap<String, SqlValue>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().tables.contains_key(table))
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| MigrateError::transfer(table, "unknown table"))
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| MigrateError::transfer(table, "unknown table"))
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        if self.failing_truncates.contains(table) {
            return Err(MigrateError::transfer(table, "lock wait timeout exceeded"));
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Truncate(table.to_string()));
        if let Some(t) = state.tables.get_mut(table) {
            t.rows.clear();
        }
        Ok(())
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::ForeignKeyChecks(enabled));
        Ok(())
    }

    async fn write_batch(&self, table: &str, cols: &[String], batch: &Batch) -> Result<u64> {
        if let Some(rejects) = &self.rejects {
            if batch.rows.iter().any(|row| rejects(table, cols, row)) {
                return Err(MigrateError::transfer(table, "Duplicate entry for key 'PRIMARY'"));
            }
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Insert {
            table: table.to_string(),
            rows: batch.len(),
        });
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| MigrateError::transfer(table, "unknown table"))?;
        for row in &batch.rows {
            target
                .rows
                .push(cols.iter().cloned().zip(row.iter().cloned()).collect());
        }
        Ok(batch.len() as u64)
    }

    async fn test_connection(&self) -> Result<()> {
        if self.offline {
            return Err(MigrateError::pool("connection refused", "testing target"));
        }
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

// =============================================================================
// Helpers
// =============================================================================

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn table(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> TableData {
    TableData::new(names(columns), rows)
}

fn id_rows(count: i64) -> Vec<Vec<SqlValue>> {
    (1..=count)
        .map(|id| vec![SqlValue::Integer(id), SqlValue::from(format!("row {}", id))])
        .collect()
}

fn config(priority: &[&str]) -> MigrationConfig {
    MigrationConfig {
        priority_tables: names(priority),
        ..MigrationConfig::default()
    }
}

fn migrator(
    source: MemorySource,
    target: &Arc<MemoryTarget>,
    config: MigrationConfig,
    mode: RunMode,
) -> Migrator {
    let target: Arc<dyn TargetWriter> = target.clone();
    Migrator::new(Arc::new(source), target, config, mode)
}

fn inserted_tables(calls: &[Call]) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for call in calls {
        if let Call::Insert { table, .. } = call {
            if tables.last() != Some(table) {
                tables.push(table.clone());
            }
        }
    }
    tables
}

// =============================================================================
// Planning
// =============================================================================

#[tokio::test]
async fn test_plan_puts_priority_tables_first() {
    let source = MemorySource::default()
        .with_table("widgets", TableData::default())
        .with_table("countries", TableData::default())
        .with_table("migrations", TableData::default())
        .with_table("users", TableData::default());
    let target = Arc::new(MemoryTarget::default());

    let migrator = migrator(source, &target, config(&["users", "countries"]), RunMode::DryRun);
    let plan = migrator.plan().await.unwrap();

    assert_eq!(plan.tables(), names(&["users", "countries", "widgets"]).as_slice());
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let source = MemorySource {
        fail_listing: true,
        ..MemorySource::default()
    };
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "name"]));

    let migrator = migrator(source, &target, config(&["users"]), RunMode::Live);
    let err = migrator.run().await.unwrap_err();

    assert!(err.to_string().contains("disk I/O error"));
    assert!(target.calls().is_empty());
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_live_run_copies_tables_in_plan_order() {
    let source = MemorySource::default()
        .with_table("widgets", table(&["id", "name"], id_rows(2)))
        .with_table("countries", table(&["id", "name"], id_rows(3)))
        .with_table("migrations", table(&["id", "name"], id_rows(5)))
        .with_table("users", table(&["id", "name"], id_rows(4)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .with_table("countries", &["id", "name"])
            .with_table("widgets", &["id", "name"])
            .with_table("migrations", &["id", "name"])
            .with_existing_rows("migrations", 7),
    );

    let migrator = migrator(source, &target, config(&["users", "countries"]), RunMode::Live);
    let result = migrator.run().await.unwrap();

    let calls = target.calls();
    assert_eq!(calls.first(), Some(&Call::ForeignKeyChecks(false)));
    assert_eq!(calls.last(), Some(&Call::ForeignKeyChecks(true)));

    let truncated: Vec<&Call> = calls
        .iter()
        .filter(|c| matches!(c, Call::Truncate(_)))
        .collect();
    assert_eq!(
        truncated,
        vec![
            &Call::Truncate("widgets".into()),
            &Call::Truncate("countries".into()),
            &Call::Truncate("users".into()),
        ]
    );
    assert_eq!(inserted_tables(&calls), names(&["users", "countries", "widgets"]));

    assert_eq!(target.rows("users").len(), 4);
    assert_eq!(target.rows("countries").len(), 3);
    assert_eq!(target.rows("widgets").len(), 2);
    // Bookkeeping table is neither truncated nor loaded
    assert_eq!(target.rows("migrations").len(), 7);

    assert_eq!(result.rows_transferred(), 9);
    assert_eq!(result.rows_failed(), 0);
    assert_eq!(result.tables_success(), 3);
    assert!(result.foreign_key_checks_restored);
    assert!(result.degraded_tables().is_empty());
}

#[tokio::test]
async fn test_default_plan_end_to_end() {
    let source = MemorySource::default()
        .with_table("widgets", table(&["id", "name"], id_rows(3)))
        .with_table("countries", TableData::default())
        .with_table("users", table(&["id", "name"], id_rows(2)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .with_table("countries", &["id", "name"])
            .with_table("widgets", &["id", "name"]),
    );

    let migrator = migrator(source, &target, MigrationConfig::default(), RunMode::Live);
    let result = migrator.run().await.unwrap();

    let position = |name: &str| result.plan.iter().position(|t| t == name).unwrap();
    assert!(position("widgets") > position("personal_access_tokens"));
    assert_eq!(position("users"), 0);

    assert_eq!(target.rows("users").len(), 2);
    assert_eq!(target.rows("countries").len(), 0);
    assert_eq!(target.rows("widgets").len(), 3);
    assert_eq!(
        result.table("countries").unwrap().outcome,
        TableOutcome::Skipped(SkipReason::NoData)
    );
    // Priority tables absent from the source have nothing to copy
    assert_eq!(
        result.table("locations").unwrap().outcome,
        TableOutcome::Skipped(SkipReason::NoData)
    );
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let source = MemorySource::default()
        .with_table("users", table(&["id", "name"], id_rows(4)))
        .with_table("posts", TableData::default());
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "name"]));

    let migrator = migrator(source, &target, config(&["users"]), RunMode::DryRun);
    let result = migrator.run().await.unwrap();

    assert!(target.calls().is_empty());
    assert!(target.rows("users").is_empty());
    assert!(result.truncations.is_empty());
    assert!(!result.foreign_key_checks_restored);
    assert_eq!(
        result.table("users").unwrap().outcome,
        TableOutcome::Skipped(SkipReason::DryRun { rows: 4 })
    );
    assert_eq!(
        result.table("posts").unwrap().outcome,
        TableOutcome::Skipped(SkipReason::NoData)
    );
    assert_eq!(result.rows_transferred(), 0);
}

#[tokio::test]
async fn test_non_empty_target_table_is_skipped() {
    let source = MemorySource::default().with_table("users", table(&["id", "name"], id_rows(4)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .with_existing_rows("users", 2),
    );
    let config = MigrationConfig {
        truncate_before_load: false,
        ..config(&["users"])
    };

    let migrator = migrator(source, &target, config, RunMode::Live);
    let result = migrator.run().await.unwrap();

    assert_eq!(
        result.table("users").unwrap().outcome,
        TableOutcome::Skipped(SkipReason::NotEmpty { existing: 2 })
    );
    assert_eq!(target.rows("users").len(), 2);
    assert!(inserted_tables(&target.calls()).is_empty());
}

#[tokio::test]
async fn test_failing_row_is_isolated() {
    let source =
        MemorySource::default().with_table("users", table(&["id", "name"], id_rows(100)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .rejecting(|_, _, row| row.first() == Some(&SqlValue::Integer(3))),
    );

    let migrator = migrator(source, &target, config(&["users"]), RunMode::Live);
    let result = migrator.run().await.unwrap();

    match &result.table("users").unwrap().outcome {
        TableOutcome::PartialFailure {
            succeeded,
            failed_rows,
        } => {
            assert_eq!(*succeeded, 99);
            assert_eq!(failed_rows.len(), 1);
            assert_eq!(failed_rows[0].index, 2);
            assert_eq!(failed_rows[0].payload, r#"{"id":3,"name":"row 3"}"#);
            assert!(failed_rows[0].reason.contains("Duplicate entry"));
        }
        other => panic!("expected partial failure, got {:?}", other),
    }

    assert_eq!(target.rows("users").len(), 99);
    assert_eq!(result.degraded_tables(), vec!["users"]);
    assert!(result.foreign_key_checks_restored);
}

#[tokio::test]
async fn test_fallback_only_retries_failed_batch() {
    let source = MemorySource::default().with_table("users", table(&["id", "name"], id_rows(25)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .rejecting(|_, _, row| row.first() == Some(&SqlValue::Integer(12))),
    );
    let config = MigrationConfig {
        chunk_size: 10,
        ..config(&["users"])
    };

    let migrator = migrator(source, &target, config, RunMode::Live);
    let result = migrator.run().await.unwrap();

    let inserts: Vec<usize> = target
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::Insert { rows, .. } => Some(*rows),
            _ => None,
        })
        .collect();
    // First batch whole, second batch row by row minus the bad row, last batch whole
    let mut expected = vec![10];
    expected.extend(std::iter::repeat(1).take(9));
    expected.push(5);
    assert_eq!(inserts, expected);

    let outcome = &result.table("users").unwrap().outcome;
    assert_eq!(outcome.rows_written(), 24);
    assert_eq!(outcome.rows_failed(), 1);
}

#[tokio::test]
async fn test_truncate_failure_does_not_stop_run() {
    let source = MemorySource::default()
        .with_table("users", table(&["id", "name"], id_rows(2)))
        .with_table("countries", table(&["id", "name"], id_rows(2)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .with_table("countries", &["id", "name"])
            .failing_truncate("countries"),
    );
    let config = MigrationConfig {
        skip_if_non_empty: false,
        ..config(&["users", "countries"])
    };

    let migrator = migrator(source, &target, config, RunMode::Live);
    let result = migrator.run().await.unwrap();

    assert_eq!(result.truncations.len(), 2);
    assert_eq!(result.truncations[0].table, "countries");
    assert!(matches!(
        result.truncations[0].outcome,
        TruncateOutcome::Failed { .. }
    ));
    assert_eq!(result.truncations[1].outcome, TruncateOutcome::Truncated);

    assert_eq!(result.rows_transferred(), 4);
    assert!(result.foreign_key_checks_restored);
}

#[tokio::test]
async fn test_missing_target_table_fails_only_that_table() {
    let source = MemorySource::default()
        .with_table("users", table(&["id", "name"], id_rows(2)))
        .with_table("audit_log", table(&["id", "name"], id_rows(2)));
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "name"]));

    let migrator = migrator(source, &target, config(&["users"]), RunMode::Live);
    let result = migrator.run().await.unwrap();

    assert_eq!(
        result.truncations.last().map(|t| &t.outcome),
        Some(&TruncateOutcome::Truncated)
    );
    assert_eq!(result.truncations[0].outcome, TruncateOutcome::Missing);
    assert!(matches!(
        result.table("audit_log").unwrap().outcome,
        TableOutcome::Failed { .. }
    ));
    assert_eq!(result.table("users").unwrap().outcome.rows_written(), 2);
    assert_eq!(result.tables_failed(), 1);
}

#[tokio::test]
async fn test_values_are_sanitized_before_insert() {
    let rows = vec![vec![
        SqlValue::Integer(1),
        SqlValue::from("`https://example.com/a.jpg`,"),
        SqlValue::from(" plain text, "),
    ]];
    let source = MemorySource::default().with_table("users", table(&["id", "avatar", "bio"], rows));
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "avatar", "bio"]));

    let migrator = migrator(source, &target, config(&["users"]), RunMode::Live);
    migrator.run().await.unwrap();

    let stored = target.rows("users");
    assert_eq!(
        stored[0].get("avatar"),
        Some(&SqlValue::from("https://example.com/a.jpg"))
    );
    assert_eq!(stored[0].get("bio"), Some(&SqlValue::from(" plain text, ")));
}

#[tokio::test]
async fn test_sanitizing_can_be_disabled() {
    let rows = vec![vec![SqlValue::Integer(1), SqlValue::from("www.example.com,")]];
    let source = MemorySource::default().with_table("users", table(&["id", "site"], rows));
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "site"]));
    let config = MigrationConfig {
        sanitize_urls: false,
        ..config(&["users"])
    };

    let migrator = migrator(source, &target, config, RunMode::Live);
    migrator.run().await.unwrap();

    assert_eq!(
        target.rows("users")[0].get("site"),
        Some(&SqlValue::from("www.example.com,"))
    );
}

#[tokio::test]
async fn test_columns_missing_in_target_are_dropped() {
    let rows = vec![vec![
        SqlValue::Integer(1),
        SqlValue::from("ada"),
        SqlValue::from("legacy"),
    ]];
    let source = MemorySource::default().with_table("users", table(&["id", "name", "old"], rows));
    let target = Arc::new(MemoryTarget::default().with_table("users", &["id", "name"]));

    let migrator = migrator(source, &target, config(&["users"]), RunMode::Live);
    let result = migrator.run().await.unwrap();

    assert_eq!(result.table("users").unwrap().outcome, TableOutcome::Success { rows: 1 });
    let stored = target.rows("users");
    assert_eq!(stored[0].len(), 2);
    assert!(!stored[0].contains_key("old"));
}

// =============================================================================
// Validation and health checks
// =============================================================================

#[tokio::test]
async fn test_validate_compares_row_counts() {
    let source = MemorySource::default()
        .with_table("users", table(&["id", "name"], id_rows(2)))
        .with_table("posts", table(&["id", "name"], id_rows(3)));
    let target = Arc::new(
        MemoryTarget::default()
            .with_table("users", &["id", "name"])
            .with_existing_rows("users", 2)
            .with_table("posts", &["id", "name"]),
    );

    let migrator = migrator(source, &target, config(&["users"]), RunMode::DryRun);
    let checks = migrator.validate().await.unwrap();

    assert_eq!(checks.len(), 2);
    assert!(checks[0].matches);
    assert_eq!(checks[1].table, "posts");
    assert_eq!(checks[1].source_rows, 3);
    assert_eq!(checks[1].target_rows, Some(0));
    assert_eq!(checks[1].target_error, None);
    assert!(!checks[1].matches);
}

#[tokio::test]
async fn test_validate_reports_unreadable_target_count() {
    let source = MemorySource::default().with_table("users", table(&["id", "name"], id_rows(2)));
    let target = Arc::new(MemoryTarget::default());

    let migrator = migrator(source, &target, config(&["users"]), RunMode::DryRun);
    let checks = migrator.validate().await.unwrap();

    assert_eq!(checks[0].source_rows, 2);
    assert_eq!(checks[0].target_rows, None);
    assert!(checks[0].target_error.as_deref().unwrap().contains("unknown table"));
    assert!(!checks[0].matches);
}

#[tokio::test]
async fn test_health_check_reports_target_error() {
    let target = Arc::new(MemoryTarget {
        offline: true,
        ..MemoryTarget::default()
    });

    let migrator = migrator(MemorySource::default(), &target, config(&[]), RunMode::DryRun);
    let health = migrator.health_check().await;

    assert!(health.source_connected);
    assert!(!health.target_connected);
    assert!(health.target_error.unwrap().contains("connection refused"));
    assert!(!health.healthy);
}
