//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use std::collections::HashSet;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }

    // Migration config validation
    let migration = &config.migration;
    if migration.chunk_size == 0 {
        return Err(MigrateError::Config(
            "migration.chunk_size must be at least 1".into(),
        ));
    }
    if migration.bookkeeping_table.is_empty() {
        return Err(MigrateError::Config(
            "migration.bookkeeping_table must not be empty".into(),
        ));
    }
    if migration
        .priority_tables
        .iter()
        .any(|t| t == &migration.bookkeeping_table)
    {
        return Err(MigrateError::Config(format!(
            "migration.priority_tables must not contain the bookkeeping table '{}'",
            migration.bookkeeping_table
        )));
    }

    let mut seen = HashSet::new();
    for table in &migration.priority_tables {
        if !seen.insert(table.as_str()) {
            return Err(MigrateError::Config(format!(
                "migration.priority_tables lists '{}' more than once",
                table
            )));
        }
    }

    Ok(())
}
