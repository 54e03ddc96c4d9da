//! MySQL/MariaDB target writer implementation.
//!
//! Implements the `TargetWriter` trait for writing data to MySQL/MariaDB databases.
//! Uses mysql_async and multi-row INSERT statements, one transaction per batch.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, TxOpts};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::traits::TargetWriter;
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result};

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// MySQL target writer implementation using mysql_async.
///
/// `FOREIGN_KEY_CHECKS` is a session variable, so every statement goes
/// through one connection held for the writer's lifetime.
pub struct MysqlWriter {
    pool: Pool,
    session: Mutex<Session>,
    database: String,
}

/// The held connection and the session state it must carry.
struct Session {
    conn: Option<Conn>,
    foreign_key_checks: bool,
}

impl Session {
    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| MigrateError::pool("no MySQL connection", "using MySQL session"))
    }
}

impl MysqlWriter {
    /// Create a new MySQL writer from configuration.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" => Some(SslOpts::default()),
            "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(1, 1)
            .ok_or_else(|| MigrateError::pool("invalid pool constraints", "creating MySQL pool"))?;
        let pool_opts = PoolOpts::new().with_constraints(constraints);

        let opts: Opts = builder.pool_opts(pool_opts).into();
        let pool = Pool::new(opts);

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL target pool"))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL target connection"))?;

        info!(
            "Connected to MySQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            session: Mutex::new(Session {
                conn: Some(conn),
                foreign_key_checks: true,
            }),
            database: config.database.clone(),
        })
    }

    /// Quote a MySQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Build a multi-row INSERT for `rows` rows of `cols`.
    fn build_insert(table: &str, cols: &[String], rows: usize) -> String {
        let col_list: Vec<String> = cols.iter().map(|c| Self::quote_ident(c)).collect();
        let placeholders_per_row = format!("({})", vec!["?"; cols.len()].join(", "));
        let all_placeholders: Vec<String> =
            std::iter::repeat_n(placeholders_per_row, rows).collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            Self::quote_ident(table),
            col_list.join(", "),
            all_placeholders.join(", ")
        )
    }

    /// Lock the session, replacing a connection the server dropped.
    ///
    /// A replacement connection gets the foreign key setting of the old one.
    async fn session(&self) -> Result<MutexGuard<'_, Session>> {
        let mut session = self.session.lock().await;
        let alive = match session.conn.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        };

        if !alive {
            warn!("MySQL session lost, reconnecting");
            session.conn = None;
            let mut conn = self
                .pool
                .get_conn()
                .await
                .map_err(|e| MigrateError::pool(e, "reconnecting to MySQL target"))?;
            if !session.foreign_key_checks {
                conn.query_drop(foreign_key_checks_sql(false))
                    .await
                    .map_err(|e| MigrateError::pool(e, "restoring MySQL session state"))?;
            }
            session.conn = Some(conn);
        }

        Ok(session)
    }
}

fn foreign_key_checks_sql(enabled: bool) -> String {
    format!("SET FOREIGN_KEY_CHECKS={}", u8::from(enabled))
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut session = self.session().await?;
        let conn = session.conn()?;

        let sql = r#"
            SELECT COUNT(*) as cnt FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let count: Option<i64> = conn
            .exec_first(sql, (self.database.as_str(), table))
            .await
            .map_err(|e| MigrateError::pool(e, "checking table existence"))?;

        Ok(count.unwrap_or(0) > 0)
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut session = self.session().await?;
        let conn = session.conn()?;

        let sql = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let columns: Vec<String> = conn.exec(sql, (self.database.as_str(), table)).await?;
        Ok(columns)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let mut session = self.session().await?;
        let conn = session.conn()?;

        let sql = format!("SELECT COUNT(*) as cnt FROM {}", Self::quote_ident(table));
        let count: Option<i64> = conn.query_first(&sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        let mut session = self.session().await?;
        let conn = session.conn()?;

        let sql = format!("TRUNCATE TABLE {}", Self::quote_ident(table));
        conn.query_drop(&sql).await?;

        debug!("Truncated table {}", table);
        Ok(())
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        let mut session = self.session().await?;
        session.conn()?.query_drop(foreign_key_checks_sql(enabled)).await?;
        session.foreign_key_checks = enabled;

        debug!("Set FOREIGN_KEY_CHECKS={}", u8::from(enabled));
        Ok(())
    }

    async fn write_batch(&self, table: &str, cols: &[String], batch: &Batch) -> Result<u64> {
        let rows = &batch.rows;
        if rows.is_empty() {
            return Ok(0);
        }
        if cols.is_empty() {
            return Err(MigrateError::transfer(table, "no columns to insert"));
        }

        let row_count = rows.len() as u64;
        let max_rows_per_stmt = (MYSQL_MAX_PLACEHOLDERS / cols.len()).max(1);

        let mut session = self.session().await?;
        let conn = session.conn()?;

        // One transaction per batch so a failed batch leaves no rows behind
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        for chunk in rows.chunks(max_rows_per_stmt) {
            let sql = Self::build_insert(table, cols, chunk.len());
            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_mysql))
                .collect();

            // Dropping the transaction rolls it back
            tx.exec_drop(&sql, params)
                .await
                .map_err(|e| MigrateError::transfer(table, format!("INSERT batch: {}", e)))?;
        }
        tx.commit().await?;

        debug!("MySQL: wrote {} rows to {} using INSERT", row_count, table);
        Ok(row_count)
    }

    async fn test_connection(&self) -> Result<()> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        if let Some(conn) = self.session.lock().await.conn.take() {
            conn.disconnect().await.ok();
        }
        self.pool.clone().disconnect().await.ok();
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Bool(b) => mysql_async::Value::from(*b),
        SqlValue::Integer(i) => mysql_async::Value::from(*i),
        SqlValue::Real(f) => mysql_async::Value::from(*f),
        SqlValue::Text(s) => mysql_async::Value::from(s.as_str()),
        SqlValue::Bytes(b) => mysql_async::Value::from(b.as_slice()),
    }
}
