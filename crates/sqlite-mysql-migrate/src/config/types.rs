//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Tables whose foreign keys other tables depend on, in insert order.
pub const DEFAULT_PRIORITY_TABLES: &[&str] = &[
    "users",
    "countries",
    "locations",
    "activity_categories",
    "activities",
    "trip_plans",
    "activity_trip_plan",
    "subscriptions",
    "gallery_cities",
    "personal_access_tokens",
];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (MySQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Target database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per INSERT batch (default: 100).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Tables processed first, in this order, to satisfy foreign keys.
    #[serde(default = "default_priority_tables")]
    pub priority_tables: Vec<String>,

    /// Schema bookkeeping table, never transferred (default: "migrations").
    #[serde(default = "default_bookkeeping_table")]
    pub bookkeeping_table: String,

    /// Order tables by `priority_tables` before discovered ones (default: true).
    #[serde(default = "default_true")]
    pub use_priority_plan: bool,

    /// Strip copy-paste artifacts from URL-like strings (default: true).
    #[serde(default = "default_true")]
    pub sanitize_urls: bool,

    /// Leave destination tables that already hold rows untouched (default: true).
    #[serde(default = "default_true")]
    pub skip_if_non_empty: bool,

    /// Truncate destination tables before loading (default: true).
    #[serde(default = "default_true")]
    pub truncate_before_load: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            priority_tables: default_priority_tables(),
            bookkeeping_table: default_bookkeeping_table(),
            use_priority_plan: true,
            sanitize_urls: true,
            skip_if_non_empty: true,
            truncate_before_load: true,
        }
    }
}

// Default value functions for serde
fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_chunk_size() -> usize {
    100
}

fn default_priority_tables() -> Vec<String> {
    DEFAULT_PRIORITY_TABLES
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_bookkeeping_table() -> String {
    "migrations".to_string()
}

fn default_true() -> bool {
    true
}
