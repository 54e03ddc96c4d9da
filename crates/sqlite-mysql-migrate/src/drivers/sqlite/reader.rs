//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait for reading data from a SQLite file.
//! Uses SQLx for connection pooling and async query execution.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::traits::SourceReader;
use crate::core::value::{SqlValue, TableData};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    /// Open the SQLite file named in the configuration, read-only.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        Self::open(&config.path).await
    }

    /// Open a SQLite file read-only.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrateError::Config(format!(
                "SQLite database not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "opening SQLite source"))?;

        let reader = Self::from_pool(pool);
        reader.test_connection().await?;

        info!("Using SQLite source at: {}", path.display());
        Ok(reader)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Quote a SQLite identifier.
    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Convert one column of a SQLite row to a `SqlValue`.
    ///
    /// SQLite is dynamically typed, so the storage class of the value itself
    /// decides the conversion, not the declared column type.
    fn convert_value(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let storage = raw.type_info().name().to_uppercase();

        let value = match storage.as_str() {
            "INTEGER" | "INT" | "BIGINT" => SqlValue::Integer(row.try_get::<i64, _>(idx)?),
            "BOOLEAN" => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => SqlValue::Real(row.try_get::<f64, _>(idx)?),
            "BLOB" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
            // TEXT that is not valid UTF-8 is carried over as raw bytes
            _ => match row.try_get::<String, _>(idx) {
                Ok(text) => SqlValue::Text(text),
                Err(e) => {
                    warn!("Non UTF-8 text in column {}, copying raw bytes: {}", idx, e);
                    SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?)
                }
            },
        };

        Ok(value)
    }

    /// Column names of a table, from `PRAGMA table_info`.
    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", Self::quote_ident(table));
        let rows: Vec<SqliteRow> = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(MigrateError::from))
            .collect()
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let tables = rows
            .iter()
            .map(|r| r.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("SQLite: found {} tables", tables.len());
        Ok(tables)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn read_table(&self, table: &str) -> Result<TableData> {
        if !self.table_exists(table).await? {
            debug!("SQLite: table {} does not exist", table);
            return Ok(TableData::default());
        }

        let sql = format!("SELECT * FROM {}", Self::quote_ident(table));
        let rows: Vec<SqliteRow> = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let columns = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            None => self.column_names(table).await?,
        };

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(Self::convert_value(row, idx)?);
            }
            data.push(values);
        }

        debug!("SQLite: read {} rows from {}", data.len(), table);
        Ok(TableData::new(columns, data))
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", Self::quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(SqliteReader::quote_ident("users"), "\"users\"");
        assert_eq!(SqliteReader::quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
