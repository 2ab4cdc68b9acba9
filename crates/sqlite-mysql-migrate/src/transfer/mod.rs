//! Batched row transfer from a source row stream into a target table.
//!
//! Rows are pulled one at a time from a [`RowStream`], grouped into
//! [`BatchUnit`]s of at most `batch_size` rows and written with a single
//! duplicate-skipping insert per batch. A failed batch is logged and counted;
//! the transfer carries on with the next one.

pub mod convert;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::traits::{RowStream, TargetStore};
use crate::core::value::{BatchUnit, Row, SqlValue};
use crate::error::MigrateError;
use crate::typemap::ColumnMapping;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum rows per batch.
    pub batch_size: usize,

    /// Extra attempts for a failed batch before it is recorded as failed.
    pub batch_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_retries: 0,
        }
    }
}

/// A batch the target rejected.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// 1-based batch number.
    pub batch: usize,

    /// Zero-based index of the batch's first row.
    pub first_row: usize,

    /// Error reported by the target.
    pub message: String,
}

/// Statistics from transferring one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    /// Rows read from the source.
    pub rows_attempted: u64,

    /// Rows the target reports as inserted (duplicates excluded).
    pub rows_inserted: u64,

    /// Batches sent to the target.
    pub batches_attempted: u64,

    /// Batches committed.
    pub batches_succeeded: u64,

    /// Values replaced by NULL because they could not be converted.
    pub values_nulled: u64,

    /// Batches that failed after all retries.
    pub failed_batches: Vec<BatchFailure>,

    /// Set when reading from the source stopped early.
    pub source_error: Option<String>,

    /// Wall-clock time for the table.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TransferStats {
    /// Every row read was sent in a committed batch and the source was exhausted.
    pub fn is_complete(&self) -> bool {
        self.batches_succeeded == self.batches_attempted && self.source_error.is_none()
    }
}

/// Moves rows for one table at a time.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    config: TransferConfig,
}

impl TransferEngine {
    /// Create a new transfer engine.
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config: TransferConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
        }
    }

    /// Get the effective batch size.
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Stream `rows` into `table` on `target`.
    ///
    /// `columns` gives the resolved target columns in the same order as the
    /// values in each row. Never fails: every problem is recorded in the
    /// returned stats.
    pub async fn transfer(
        &self,
        target: &dyn TargetStore,
        table: &str,
        columns: &[ColumnMapping],
        mut rows: RowStream,
    ) -> TransferStats {
        let start = Instant::now();
        let batch_size = self.config.batch_size;
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let datetime_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_datetime())
            .map(|(i, _)| i)
            .collect();

        let mut stats = TransferStats::default();
        let mut number = 1;
        let mut batch = BatchUnit::new(table, number, 0, batch_size);

        while let Some(item) = rows.next().await {
            let mut row = match item {
                Ok(row) => row,
                Err(e) => {
                    error!(
                        "{}: source read failed after {} rows: {}",
                        table, stats.rows_attempted, e
                    );
                    stats.source_error = Some(e.to_string());
                    break;
                }
            };

            stats.values_nulled += convert_row(&mut row, &datetime_cols, columns);
            stats.rows_attempted += 1;
            batch.rows.push(row);

            if batch.len() >= batch_size {
                let first_row = batch.first_row + batch.len();
                number += 1;
                let full = std::mem::replace(
                    &mut batch,
                    BatchUnit::new(table, number, first_row, batch_size),
                );
                self.write_batch(target, &names, full, &mut stats).await;
            }
        }

        if !batch.is_empty() {
            self.write_batch(target, &names, batch, &mut stats).await;
        }

        if stats.values_nulled > 0 {
            warn!(
                "{}: {} values could not be converted and were stored as NULL",
                table, stats.values_nulled
            );
        }

        stats.elapsed = start.elapsed();
        info!(
            "{}: {} rows read, {}/{} batches committed in {:?}",
            table,
            stats.rows_attempted,
            stats.batches_succeeded,
            stats.batches_attempted,
            stats.elapsed
        );
        stats
    }

    async fn write_batch(
        &self,
        target: &dyn TargetStore,
        columns: &[String],
        batch: BatchUnit,
        stats: &mut TransferStats,
    ) {
        stats.batches_attempted += 1;
        let attempts = self.config.batch_retries + 1;

        for attempt in 1..=attempts {
            match target.insert_batch(&batch.table, columns, &batch.rows).await {
                Ok(inserted) => {
                    stats.batches_succeeded += 1;
                    stats.rows_inserted += inserted;
                    debug!(
                        "{}: batch {} committed ({} rows, {} inserted)",
                        batch.table,
                        batch.number,
                        batch.len(),
                        inserted
                    );
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "{}: batch {} attempt {}/{} failed, retrying: {}",
                        batch.table, batch.number, attempt, attempts, e
                    );
                }
                Err(e) => {
                    let err = MigrateError::batch(&batch.table, batch.number, e);
                    error!("{} (starting row {})", err, batch.first_row);
                    stats.failed_batches.push(BatchFailure {
                        batch: batch.number,
                        first_row: batch.first_row,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Convert DATETIME-bound values in place; returns how many became NULL.
///
/// Epoch columns are converted strictly: text that is neither an epoch nor
/// a date becomes NULL instead of being passed to the server.
fn convert_row(row: &mut Row, datetime_cols: &[usize], columns: &[ColumnMapping]) -> u64 {
    let mut nulled = 0;
    for &i in datetime_cols {
        let Some(slot) = row.get_mut(i) else {
            continue;
        };
        let value = std::mem::replace(slot, SqlValue::Null);
        let column = &columns[i];
        match convert::to_datetime(&column.name, value, column.is_epoch) {
            Ok(converted) => *slot = converted,
            Err(e) => {
                debug!("{}", e);
                nulled += 1;
            }
        }
    }
    nulled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ServerFlavor;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Target that records batches and fails the listed batch numbers.
    #[derive(Default)]
    struct RecordingTarget {
        fail_batches: Vec<usize>,
        calls: Mutex<usize>,
        rows: Mutex<Vec<Row>>,
    }

    #[async_trait]
    impl TargetStore for RecordingTarget {
        fn server_flavor(&self) -> ServerFlavor {
            ServerFlavor::Mysql
        }

        async fn execute(&self, _sql: &str) -> Result<()> {
            Ok(())
        }

        async fn insert_batch(&self, table: &str, _columns: &[String], rows: &[Row]) -> Result<u64> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_batches.contains(&call) {
                return Err(MigrateError::ddl(table, "simulated failure"));
            }
            self.rows.lock().unwrap().extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        }

        async fn set_foreign_key_checks(&self, _enabled: bool) -> Result<()> {
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn endpoint(&self) -> String {
            "recording".into()
        }

        async fn close(&self) {}
    }

    fn int_column(name: &str) -> ColumnMapping {
        ColumnMapping {
            name: name.into(),
            target_type: "INT".into(),
            is_nullable: true,
            default: None,
            auto_increment: false,
            is_epoch: false,
            warning: None,
        }
    }

    fn rows(n: i64) -> RowStream {
        RowStream::from_rows((0..n).map(|i| Ok(vec![SqlValue::Integer(i)])).collect())
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        for (n, b, expected) in [(0, 1000, 0), (1, 1000, 1), (1000, 1000, 1), (1001, 1000, 2), (7, 3, 3)] {
            let target = RecordingTarget::default();
            let engine = TransferEngine::new(TransferConfig {
                batch_size: b,
                batch_retries: 0,
            });
            let stats = engine.transfer(&target, "t", &[int_column("id")], rows(n)).await;
            assert_eq!(stats.rows_attempted, n as u64);
            assert_eq!(stats.batches_attempted, expected, "n={} b={}", n, b);
            assert_eq!(stats.batches_succeeded, expected);
            assert!(stats.is_complete());
        }
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_transfer() {
        let target = RecordingTarget {
            fail_batches: vec![2],
            ..Default::default()
        };
        let engine = TransferEngine::new(TransferConfig::default());
        let stats = engine.transfer(&target, "t", &[int_column("id")], rows(2500)).await;

        assert_eq!(stats.batches_attempted, 3);
        assert_eq!(stats.batches_succeeded, 2);
        assert_eq!(stats.failed_batches.len(), 1);
        assert_eq!(stats.failed_batches[0].batch, 2);
        assert_eq!(stats.failed_batches[0].first_row, 1000);
        assert!(stats.failed_batches[0]
            .message
            .starts_with("Batch 2 of table t failed: "));
        assert_eq!(target.rows.lock().unwrap().len(), 1500);
        assert!(!stats.is_complete());
    }

    #[tokio::test]
    async fn test_retry_recovers_batch() {
        let target = RecordingTarget {
            fail_batches: vec![1],
            ..Default::default()
        };
        let engine = TransferEngine::new(TransferConfig {
            batch_size: 10,
            batch_retries: 1,
        });
        let stats = engine.transfer(&target, "t", &[int_column("id")], rows(5)).await;
        assert_eq!(stats.batches_attempted, 1);
        assert_eq!(stats.batches_succeeded, 1);
        assert_eq!(stats.rows_inserted, 5);
    }

    #[tokio::test]
    async fn test_source_error_flushes_buffered_rows() {
        let stream = RowStream::from_rows(vec![
            Ok(vec![SqlValue::Integer(1)]),
            Ok(vec![SqlValue::Integer(2)]),
            Err(MigrateError::Config("disk I/O error".into())),
            Ok(vec![SqlValue::Integer(3)]),
        ]);
        let target = RecordingTarget::default();
        let stats = TransferEngine::default()
            .transfer(&target, "t", &[int_column("id")], stream)
            .await;

        assert_eq!(stats.rows_attempted, 2);
        assert_eq!(stats.batches_succeeded, 1);
        assert!(stats.source_error.is_some());
        assert_eq!(target.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_datetime_conversion_nulls_bad_values() {
        let mut time_col = int_column("migration_time");
        time_col.target_type = "DATETIME".into();
        time_col.is_epoch = true;
        let stream = RowStream::from_rows(vec![
            Ok(vec![SqlValue::Integer(1), SqlValue::Integer(1_700_000_000)]),
            Ok(vec![SqlValue::Integer(2), SqlValue::Text("not a date".into())]),
        ]);
        let target = RecordingTarget::default();
        let stats = TransferEngine::default()
            .transfer(&target, "knex_migrations", &[int_column("id"), time_col], stream)
            .await;

        assert_eq!(stats.values_nulled, 1);
        let written = target.rows.lock().unwrap();
        assert_eq!(written.len(), 2);
        match &written[0][1] {
            SqlValue::DateTime(dt) => {
                assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-11-14 22:13:20")
            }
            other => panic!("expected datetime, got {:?}", other),
        }
        assert_eq!(written[1][1], SqlValue::Null);
        assert_eq!(written[1][0], SqlValue::Integer(2));
    }

    #[tokio::test]
    async fn test_datetime_column_keeps_unparsed_text() {
        let mut created = int_column("created_date");
        created.target_type = "DATETIME".into();
        let stream = RowStream::from_rows(vec![
            Ok(vec![SqlValue::Integer(1), SqlValue::Text("2023/11/14 22:13:20".into())]),
            Ok(vec![SqlValue::Integer(2), SqlValue::Text("14 Nov 2023".into())]),
            Ok(vec![SqlValue::Integer(3), SqlValue::Bytes(vec![0xff])]),
        ]);
        let target = RecordingTarget::default();
        let stats = TransferEngine::default()
            .transfer(&target, "incident", &[int_column("id"), created], stream)
            .await;

        assert_eq!(stats.values_nulled, 1);
        let written = target.rows.lock().unwrap();
        assert!(matches!(written[0][1], SqlValue::DateTime(_)));
        assert_eq!(written[1][1], SqlValue::Text("14 Nov 2023".into()));
        assert_eq!(written[2][1], SqlValue::Null);
    }
}
