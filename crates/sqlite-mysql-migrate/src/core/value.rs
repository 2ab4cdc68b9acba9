//! SQL value types for row transfer.
//!
//! SQLite stores every cell in one of five storage classes. [`SqlValue`]
//! mirrors those classes and adds `DateTime` for values converted on the way
//! to a MySQL `DATETIME` column.

use chrono::NaiveDateTime;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// 64-bit signed integer (SQLite INTEGER storage class).
    Integer(i64),

    /// 64-bit float (SQLite REAL storage class).
    Real(f64),

    /// UTF-8 text.
    Text(String),

    /// Raw bytes.
    Bytes(Vec<u8>),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short storage-class name, used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "blob",
            SqlValue::DateTime(_) => "datetime",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
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

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One source row, values in table column order.
pub type Row = Vec<SqlValue>;

/// A bounded group of rows bound to one table.
///
/// Built by the transfer engine, written in a single insert, then dropped.
#[derive(Debug)]
pub struct BatchUnit {
    /// Target table name.
    pub table: String,

    /// 1-based batch number within the table.
    pub number: usize,

    /// Zero-based index of the first row in the table's row sequence.
    pub first_row: usize,

    /// Rows in this batch.
    pub rows: Vec<Row>,
}

impl BatchUnit {
    /// Create an empty batch with room for `capacity` rows.
    pub fn new(table: impl Into<String>, number: usize, first_row: usize, capacity: usize) -> Self {
        Self {
            table: table.into(),
            number,
            first_row,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
