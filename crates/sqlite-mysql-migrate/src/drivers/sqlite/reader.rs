//! SQLite source reader.
//!
//! Implements [`SourceStore`] over a single read-only sqlx connection.
//! Metadata comes from the `pragma_*` table-valued functions; rows are
//! streamed by a background task into a bounded channel.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::quote_sqlite;
use crate::core::schema::{ColumnDescriptor, IndexDescriptor, PrimaryKeySpec, TableDescriptor};
use crate::core::traits::{RowStream, SourceStore, ROW_CHANNEL_CAPACITY};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection acquire timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader.
pub struct SqliteReader {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteReader {
    /// Open the database file read-only.
    ///
    /// Fails with a connection error if the file is missing or is not a
    /// SQLite database.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let path = config.path.clone();
        let endpoint = format!("sqlite:{}", path.display());

        if !path.is_file() {
            return Err(MigrateError::connection(endpoint, "file does not exist"));
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        // The header is only checked on first read.
        let tables: i64 = sqlx::query_scalar("SELECT count(*) FROM sqlite_master")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        info!(
            "Opened SQLite source: {} ({} catalog entries)",
            path.display(),
            tables
        );

        Ok(Self { pool, path })
    }

    async fn load_columns(&self, table: &str) -> Result<(Vec<ColumnDescriptor>, Option<PrimaryKeySpec>)> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk
               FROM pragma_table_info(?1)
               ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut pk: Vec<(i64, String)> = Vec::new();

        for row in &rows {
            let name: String = row.try_get("name")?;
            let source_type: Option<String> = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let default_value: Option<String> = row.try_get("dflt_value")?;
            let pk_pos: i64 = row.try_get("pk")?;

            if pk_pos > 0 {
                pk.push((pk_pos, name.clone()));
            }

            columns.push(ColumnDescriptor {
                name,
                source_type: source_type.unwrap_or_default(),
                is_nullable: not_null == 0,
                default_value,
                is_auto_increment: false,
            });
        }

        pk.sort_by_key(|(pos, _)| *pos);
        let primary_key = if pk.is_empty() {
            None
        } else {
            Some(PrimaryKeySpec {
                columns: pk.into_iter().map(|(_, name)| name).collect(),
            })
        };

        Ok((columns, primary_key))
    }

    async fn load_indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        // seq counts down from the newest index.
        let rows = sqlx::query(
            r#"SELECT name, "unique", origin, partial
               FROM pragma_index_list(?1)
               ORDER BY seq DESC"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes = Vec::new();
        for row in &rows {
            let name: String = row.try_get("name")?;
            let unique: i64 = row.try_get("unique")?;
            let origin: String = row.try_get("origin")?;
            let partial: i64 = row.try_get("partial")?;

            if origin == "pk" {
                continue;
            }
            if partial != 0 {
                warn!("{}: skipping partial index {}", table, name);
                continue;
            }

            let cols: Vec<Option<String>> = sqlx::query_scalar(
                "SELECT name FROM pragma_index_info(?1) ORDER BY seqno",
            )
            .bind(&name)
            .fetch_all(&self.pool)
            .await?;

            // Expression indexes report NULL column names.
            let Some(columns) = cols.into_iter().collect::<Option<Vec<String>>>() else {
                warn!("{}: skipping expression index {}", table, name);
                continue;
            };

            indexes.push(IndexDescriptor {
                name,
                columns,
                is_unique: unique != 0,
            });
        }

        Ok(indexes)
    }
}

#[async_trait]
impl SourceStore for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"SELECT name FROM sqlite_master
               WHERE type = 'table'
                 AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
                 AND sql NOT LIKE 'CREATE VIRTUAL TABLE%'
               ORDER BY rowid"#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} tables in {}", tables.len(), self.path.display());
        Ok(tables)
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescriptor> {
        let (columns, primary_key) = self.load_columns(table).await?;
        let indexes = self.load_indexes(table).await?;

        debug!(
            "{}: {} columns, {} indexes, pk {:?}",
            table,
            columns.len(),
            indexes.len(),
            primary_key.as_ref().map(|pk| &pk.columns)
        );

        Ok(TableDescriptor::new(table, columns, indexes, primary_key))
    }

    async fn read_rows(&self, table: &TableDescriptor) -> Result<RowStream> {
        let col_list = table
            .columns
            .iter()
            .map(|c| quote_sqlite(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM {}", col_list, quote_sqlite(&table.name));

        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        let name = table.name.clone();

        tokio::spawn(async move {
            let mut rows = sqlx::query(&sql).fetch(&pool);
            loop {
                let item = match rows.try_next().await {
                    Ok(Some(row)) => row_to_values(&row),
                    Ok(None) => break,
                    Err(e) => Err(MigrateError::Source(e)),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("{}: row receiver dropped, stopping reader", name);
                    break;
                }
                if failed {
                    break;
                }
            }
        });

        Ok(RowStream::new(rx))
    }

    fn endpoint(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode a row by each value's storage class.
fn row_to_values(row: &SqliteRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());

    for i in 0..row.len() {
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();

        let value = match storage.as_str() {
            "INTEGER" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(i)?),
            "REAL" => SqlValue::Real(row.try_get_unchecked::<f64, _>(i)?),
            "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
            _ => match row.try_get_unchecked::<String, _>(i) {
                Ok(s) => SqlValue::Text(s),
                // Text that is not valid UTF-8 is carried as bytes.
                Err(_) => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
            },
        };
        values.push(value);
    }

    Ok(values)
}
