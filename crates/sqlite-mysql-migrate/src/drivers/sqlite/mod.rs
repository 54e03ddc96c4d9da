//! SQLite database driver.
//!
//! Provides [`SqliteReader`], the source side of a migration.
//!
//! # Connection
//!
//! The database is opened read-only from a file path; the file must exist.

mod reader;

pub use reader::SqliteReader;
