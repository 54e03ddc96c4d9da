//! # sqlite-mysql-migrate
//!
//! One-shot SQLite to MySQL data migration library.
//!
//! The target schema must already exist; this library moves rows only:
//!
//! - **Dependency-aware ordering** with a configurable priority list
//! - **Target reset** by truncating tables in reverse order with foreign key checks off
//! - **Batched inserts** with a row-by-row fallback that isolates bad rows
//! - **Value sanitization** for URLs and embedded `data:image` payloads
//! - **Dry runs** that read and report without writing
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_mysql_migrate::{Config, Migrator, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_mysql_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let migrator = Migrator::connect(&config, RunMode::Live).await?;
//!     let result = migrator.run().await?;
//!     println!("Migrated {} rows", result.rows_transferred());
//!     migrator.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod sanitize;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{Batch, SourceReader, SqlValue, TableData, TargetWriter};
pub use drivers::{MysqlWriter, SqliteReader};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationResult, Migrator, RowCountCheck, RowFailure, RunMode, SkipReason,
    TableOutcome, TableReport, TruncateOutcome,
};
pub use plan::TablePlan;
