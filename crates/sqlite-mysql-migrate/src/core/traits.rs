//! Capability handles for the two ends of a migration.
//!
//! - [`SourceStore`]: reads metadata and streams rows from the source (SQLite)
//! - [`TargetStore`]: executes DDL and writes batches to the target (MySQL/MariaDB)
//!
//! The orchestrator only talks to these traits, so tests can substitute
//! in-memory implementations for either side.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::TableDescriptor;
use super::value::Row;

/// Capacity of the channel between the background reader and the transfer engine.
pub const ROW_CHANNEL_CAPACITY: usize = 4096;

/// Forward-only stream of rows in the source's natural order.
///
/// Backed by a bounded channel fed by a background reader task. Once an item
/// is received it cannot be read again; a stream cannot be restarted.
pub struct RowStream {
    rx: mpsc::Receiver<Result<Row>>,
}

impl RowStream {
    /// Wrap a receiver fed by a reader task.
    pub fn new(rx: mpsc::Receiver<Result<Row>>) -> Self {
        Self { rx }
    }

    /// Create a stream over rows already in memory.
    ///
    /// Used by tests and by stores that do not read lazily.
    pub fn from_rows(rows: Vec<Result<Row>>) -> Self {
        let (tx, rx) = mpsc::channel(rows.len().max(1));
        for row in rows {
            // Capacity covers every row, so try_send cannot fail on a full channel.
            if tx.try_send(row).is_err() {
                break;
            }
        }
        Self { rx }
    }

    /// Pull the next row. `None` once the source is exhausted.
    pub async fn next(&mut self) -> Option<Result<Row>> {
        self.rx.recv().await
    }
}

/// Target server flavor, detected at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    Mysql,
    Mariadb,
}

impl ServerFlavor {
    /// Classify a `SELECT VERSION()` string.
    pub fn from_version(version: &str) -> Self {
        if version.to_ascii_lowercase().contains("mariadb") {
            ServerFlavor::Mariadb
        } else {
            ServerFlavor::Mysql
        }
    }

    /// Whether TEXT/BLOB columns may carry a literal DEFAULT.
    pub fn allows_blob_defaults(&self) -> bool {
        matches!(self, ServerFlavor::Mariadb)
    }
}

impl std::fmt::Display for ServerFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerFlavor::Mysql => write!(f, "MySQL"),
            ServerFlavor::Mariadb => write!(f, "MariaDB"),
        }
    }
}

/// Read metadata and rows from the source database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// User table names in catalog order, internal tables excluded.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns, primary key and indexes for one table.
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor>;

    /// Start streaming a table's rows.
    ///
    /// Values in each row follow the descriptor's column order. A read error
    /// is delivered in-band and ends the stream.
    async fn read_rows(&self, table: &TableDescriptor) -> Result<RowStream>;

    /// Short description of the source for log and error messages.
    fn endpoint(&self) -> String;

    /// Release the source connection.
    async fn close(&self);
}

/// Execute DDL and write row batches on the target database.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Detected server flavor.
    fn server_flavor(&self) -> ServerFlavor;

    /// Run one statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Insert a batch, skipping rows that collide with an existing key.
    ///
    /// The whole batch is written in one transaction; on error nothing from
    /// the batch is committed. Returns the number of rows actually inserted.
    async fn insert_batch(&self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64>;

    /// Toggle referential-integrity enforcement for this session.
    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()>;

    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    /// Short description of the target for log and error messages.
    fn endpoint(&self) -> String;

    /// Release the target session.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;

    #[test]
    fn test_server_flavor_from_version() {
        assert_eq!(
            ServerFlavor::from_version("10.11.6-MariaDB-0+deb12u1"),
            ServerFlavor::Mariadb
        );
        assert_eq!(ServerFlavor::from_version("8.0.36"), ServerFlavor::Mysql);
        assert!(ServerFlavor::Mariadb.allows_blob_defaults());
        assert!(!ServerFlavor::Mysql.allows_blob_defaults());
    }

    #[tokio::test]
    async fn test_row_stream_from_rows_is_forward_only() {
        let mut stream = RowStream::from_rows(vec![
            Ok(vec![SqlValue::Integer(1)]),
            Ok(vec![SqlValue::Integer(2)]),
        ]);
        assert_eq!(stream.next().await.unwrap().unwrap(), vec![SqlValue::Integer(1)]);
        assert_eq!(stream.next().await.unwrap().unwrap(), vec![SqlValue::Integer(2)]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_row_stream_empty() {
        let mut stream = RowStream::from_rows(vec![]);
        assert!(stream.next().await.is_none());
    }
}
