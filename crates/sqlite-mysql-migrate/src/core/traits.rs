//! Core traits for the two stores a migration talks to.
//!
//! - [`SourceReader`]: lists and reads tables from the source database
//! - [`TargetWriter`]: inspects, clears and fills tables in the target database
//!
//! The migrator only depends on these traits, so tests drive it with
//! in-memory implementations.

use async_trait::async_trait;

use crate::error::Result;

use super::value::{Batch, TableData};

/// Read data from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables in discovery order.
    ///
    /// Internal tables of the engine are never returned. The bookkeeping
    /// table may be returned; the table plan excludes it.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Read every row of a table.
    ///
    /// A table that does not exist yields an empty [`TableData`].
    async fn read_table(&self, table: &str) -> Result<TableData>;

    /// Get the row count for a table (0 when the table does not exist).
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write data to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Column names of a table, in ordinal order.
    async fn column_names(&self, table: &str) -> Result<Vec<String>>;

    /// Get the row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Remove every row from a table.
    async fn truncate_table(&self, table: &str) -> Result<()>;

    /// Toggle foreign key enforcement for this writer's session.
    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()>;

    /// Insert a batch of rows.
    ///
    /// Either every row of the batch is written or none is.
    async fn write_batch(&self, table: &str, cols: &[String], batch: &Batch) -> Result<u64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
