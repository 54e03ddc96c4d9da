//! Core abstractions shared by the drivers and the migrator.
//!
//! - [`value`]: scalar values, rows, batches
//! - [`traits`]: the source and target store interfaces

pub mod traits;
pub mod value;

pub use traits::{SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue, TableData};
