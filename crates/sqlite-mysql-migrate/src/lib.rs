//! # sqlite-mysql-migrate
//!
//! One-shot SQLite to MySQL/MariaDB migration library.
//!
//! This library copies every user table of a SQLite database into a MySQL
//! or MariaDB database with:
//!
//! - **Type mapping** from loose SQLite declared types to concrete MySQL types
//! - **Index-safe DDL** with key prefixes for long or unbounded columns
//! - **Batched inserts** that skip rows already present, so re-runs are safe
//! - **Per-table isolation**: a failed table or batch never stops the run
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_mysql_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_mysql_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let report = orchestrator.run().await?;
//!     println!("Read {} rows", report.rows_attempted());
//!     report.ensure_complete()
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{
    ColumnDescriptor, IndexDescriptor, PrimaryKeySpec, Row, RowStream, ServerFlavor, SourceStore,
    SqlValue, TableDescriptor, TargetStore,
};
pub use drivers::{MysqlWriter, SqliteReader};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationReport, Orchestrator, TableOutcome, TablePlan, TableReport,
};
pub use schema::{DdlOptions, SchemaTranslator};
pub use transfer::{TransferConfig, TransferEngine, TransferStats};
pub use typemap::{map_type, ColumnMapping, TypeMapOptions};
