//! MySQL/MariaDB database driver.
//!
//! Provides [`MysqlWriter`], the target side of a migration.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod writer;

pub use writer::MysqlWriter;
