//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors (bad YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for failures to reach either database.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for any other failure.
pub const EXIT_RUNTIME_ERROR: u8 = 3;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database (SQLite) error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database (MySQL) error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Connection error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => {
                EXIT_CONNECTION_ERROR
            }
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Transfer { .. } | MigrateError::Json(_) => EXIT_RUNTIME_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
