//! MySQL/MariaDB target writer implementation.
//!
//! Implements [`TargetStore`] over one exclusively owned mysql_async
//! connection. `FOREIGN_KEY_CHECKS` is a session variable, so DDL, inserts
//! and the integrity toggle all have to run on the same session.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts, Transaction, TxOpts};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::quote_ident;
use crate::core::traits::{ServerFlavor, TargetStore};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// MySQL target writer implementation using mysql_async.
pub struct MysqlWriter {
    conn: Mutex<Option<Conn>>,
    flavor: ServerFlavor,
    endpoint: String,
}

impl MysqlWriter {
    /// Connect to the target and detect the server flavor.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let endpoint = format!("mysql:{}:{}/{}", config.host, config.port, config.database);

        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => {
                Some(SslOpts::default())
            }
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to prefer",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let opts: Opts = builder.into();
        let mut conn = Conn::new(opts)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        let version: Option<String> = conn
            .query_first("SELECT VERSION()")
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;
        let version = version.unwrap_or_default();
        let flavor = ServerFlavor::from_version(&version);

        info!("Connected to {} {} target: {}", flavor, version, endpoint);

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            flavor,
            endpoint,
        })
    }

    fn closed(&self) -> MigrateError {
        MigrateError::connection(&self.endpoint, "connection already closed")
    }

    /// Write rows using multi-row INSERT IGNORE inside an open transaction.
    async fn write_batch_insert(
        tx: &mut Transaction<'_>,
        table: &str,
        cols: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        let num_cols = cols.len();
        if num_cols == 0 || rows.is_empty() {
            return Ok(0);
        }

        let qualified_table = quote_ident(table);
        let col_list = cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let max_rows_per_stmt = (MYSQL_MAX_PLACEHOLDERS / num_cols).max(1);
        let placeholders_per_row = format!("({})", vec!["?"; num_cols].join(", "));

        let mut inserted = 0;
        for chunk in rows.chunks(max_rows_per_stmt) {
            let all_placeholders: Vec<&str> =
                std::iter::repeat(placeholders_per_row.as_str()).take(chunk.len()).collect();

            let sql = format!(
                "INSERT IGNORE INTO {} ({}) VALUES {}",
                qualified_table,
                col_list,
                all_placeholders.join(", ")
            );

            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_mysql))
                .collect();

            tx.exec_drop(&sql, params).await?;
            inserted += tx.affected_rows();
        }

        Ok(inserted)
    }
}

#[async_trait]
impl TargetStore for MysqlWriter {
    fn server_flavor(&self) -> ServerFlavor {
        self.flavor
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| self.closed())?;
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn insert_batch(&self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| self.closed())?;

        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        match Self::write_batch_insert(&mut tx, table, columns, rows).await {
            Ok(inserted) => {
                tx.commit().await?;
                debug!(
                    "MySQL: inserted {} of {} rows into {}",
                    inserted,
                    rows.len(),
                    table
                );
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("{}: rollback failed: {}", table, rb);
                }
                Err(e)
            }
        }
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        let sql = format!("SET FOREIGN_KEY_CHECKS = {}", u8::from(enabled));
        self.execute(&sql).await?;
        debug!("{}", sql);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1").await
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.disconnect().await {
                warn!("Error closing MySQL connection: {}", e);
            }
        }
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Integer(i) => mysql_async::Value::from(*i),
        SqlValue::Real(f) => mysql_async::Value::from(*f),
        SqlValue::Text(s) => mysql_async::Value::from(s.as_str()),
        SqlValue::Bytes(b) => mysql_async::Value::from(b.as_slice()),
        SqlValue::DateTime(dt) => mysql_async::Value::from(*dt),
    }
}
