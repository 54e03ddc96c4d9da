//! Database driver implementations.
//!
//! - [`sqlite`]: source reader for SQLite files
//! - [`mysql`]: target writer for MySQL/MariaDB
//!
//! Each driver implements one of the core traits
//! ([`SourceReader`](crate::core::SourceReader) or
//! [`TargetWriter`](crate::core::TargetWriter)).

pub mod mysql;
pub mod sqlite;

pub use mysql::MysqlWriter;
pub use sqlite::SqliteReader;
