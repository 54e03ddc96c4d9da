//! SQL value types for moving rows between the source and target stores.
//!
//! SQLite only stores five storage classes, so the value model is a small
//! scalar enum. Rows are kept column-aligned (`Vec<SqlValue>`) and paired with
//! the table's column names through [`Row`] when a named view is needed.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Scalar SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer (SQLite INTEGER).
    Integer(i64),

    /// Double precision float (SQLite REAL).
    Real(f64),

    /// Text data (SQLite TEXT).
    Text(String),

    /// Binary data (SQLite BLOB).
    Bytes(Vec<u8>),
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Bool(v) => serializer.serialize_bool(*v),
            SqlValue::Integer(v) => serializer.serialize_i64(*v),
            SqlValue::Real(v) => serializer.serialize_f64(*v),
            SqlValue::Text(v) => serializer.serialize_str(v),
            // Blobs render as MySQL hex literals
            SqlValue::Bytes(v) => serializer.serialize_str(&format!("0x{}", hex::encode(v))),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Named view over one row: column names paired with values in column order.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub columns: &'a [String],
    pub values: &'a [SqlValue],
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a [String], values: &'a [SqlValue]) -> Self {
        Self { columns, values }
    }

    /// Look up a field by column name.
    pub fn get(&self, column: &str) -> Option<&'a SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Render the row as a JSON object with columns in table order.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self.values))
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// All rows of one table, as read from the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    /// Column names in source order.
    pub columns: Vec<String>,

    /// Rows, each aligned with `columns`.
    pub rows: Vec<Vec<SqlValue>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Named view of the row at `idx`.
    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row::new(&self.columns, values))
    }

    /// Keep only the named columns, in their source order.
    ///
    /// Returns the names of the columns that were dropped.
    pub fn retain_columns(&mut self, keep: &[String]) -> Vec<String> {
        let mask: Vec<bool> = self.columns.iter().map(|c| keep.contains(c)).collect();
        if mask.iter().all(|k| *k) {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (column, keep) in self.columns.drain(..).zip(&mask) {
            if *keep {
                columns.push(column);
            } else {
                dropped.push(column);
            }
        }
        self.columns = columns;

        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|_| {
                let keep = mask.get(idx).copied().unwrap_or(false);
                idx += 1;
                keep
            });
        }

        dropped
    }

    /// Split the rows into batches of at most `chunk_size` rows, preserving order.
    pub fn into_batches(self, chunk_size: usize) -> Vec<Batch> {
        let chunk_size = chunk_size.max(1);
        let mut batches = Vec::with_capacity(self.rows.len().div_ceil(chunk_size));
        let mut rows = self.rows.into_iter().enumerate().peekable();

        while rows.peek().is_some() {
            let mut first_index = None;
            let chunk: Vec<Vec<SqlValue>> = rows
                .by_ref()
                .take(chunk_size)
                .map(|(idx, row)| {
                    first_index.get_or_insert(idx);
                    row
                })
                .collect();
            batches.push(Batch::new(chunk).with_offset(first_index.unwrap_or(0)));
        }

        batches
    }
}

/// A group of rows written with a single INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Vec<SqlValue>>,

    /// Index of the first row within the table's full row set.
    pub offset: usize,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self { rows, offset: 0 }
    }

    /// Set the position of this batch's first row within the table.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
