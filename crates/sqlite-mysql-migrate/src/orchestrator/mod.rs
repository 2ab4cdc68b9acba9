//! Migration orchestrator - main workflow coordinator.
//!
//! A run moves through `connected -> per-table (drop?, create, transfer) ->
//! finalized -> closed`. Only a failure to connect stops a run; every other
//! problem is recorded against its table and the next table is processed.

mod report;

pub use report::{MigrationReport, TableOutcome, TableReport};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::traits::{ServerFlavor, SourceStore, TargetStore};
use crate::drivers::{MysqlWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::schema::SchemaTranslator;
use crate::transfer::TransferEngine;

/// Migration orchestrator.
pub struct Orchestrator {
    migration: MigrationConfig,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    translator: SchemaTranslator,
    engine: TransferEngine,
}

/// DDL that a run would execute for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TablePlan {
    pub name: String,
    pub statements: Vec<String>,
    pub error: Option<String>,
}

/// Result of testing both connections.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub server_flavor: ServerFlavor,
    pub healthy: bool,
}

/// Keeps target referential-integrity checks off while alive.
///
/// [`IntegrityGuard::restore`] re-enables them on the normal path. If the
/// guard is dropped without that call (e.g. during a panic), `Drop` spawns
/// the restore on the current runtime.
struct IntegrityGuard {
    target: Arc<dyn TargetStore>,
    restored: bool,
}

impl IntegrityGuard {
    async fn suspend(target: Arc<dyn TargetStore>) -> Self {
        match target.set_foreign_key_checks(false).await {
            Ok(()) => info!("Foreign key checks disabled on target"),
            Err(e) => warn!("Could not disable foreign key checks: {}", e),
        }
        Self {
            target,
            restored: false,
        }
    }

    async fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.target.set_foreign_key_checks(true).await?;
        info!("Foreign key checks re-enabled on target");
        Ok(())
    }
}

impl Drop for IntegrityGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        warn!("Run ended without restoring foreign key checks; restoring now");
        let target = self.target.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = target.set_foreign_key_checks(true).await {
                    error!("Failed to re-enable foreign key checks: {}", e);
                }
            });
        }
    }
}

impl Orchestrator {
    /// Connect to both databases.
    ///
    /// The source is opened first. If the target cannot be reached the
    /// source is closed again before the error is returned.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;

        let target = match MysqlWriter::new(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::from_stores(
            config.migration,
            Arc::new(source),
            Arc::new(target),
        ))
    }

    /// Build an orchestrator over already-connected stores.
    pub fn from_stores(
        migration: MigrationConfig,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        let translator = SchemaTranslator::new(
            migration
                .ddl_options()
                .with_flavor(target.server_flavor()),
        );
        let engine = TransferEngine::new(migration.transfer_config());

        Self {
            migration,
            source,
            target,
            translator,
            engine,
        }
    }

    /// Source tables that pass the include/exclude filters, in catalog order.
    pub async fn selected_tables(&self) -> Result<Vec<String>> {
        let all = self.source.list_tables().await?;
        let total = all.len();
        let selected: Vec<String> = all
            .into_iter()
            .filter(|t| self.migration.table_selected(t))
            .collect();
        if selected.len() < total {
            info!(
                "{} of {} tables selected by include/exclude filters",
                selected.len(),
                total
            );
        }
        Ok(selected)
    }

    /// Run the migration and close both connections.
    pub async fn run(self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting migration run {}: {} -> {} ({})",
            run_id,
            self.source.endpoint(),
            self.target.endpoint(),
            self.target.server_flavor()
        );

        let guard = IntegrityGuard::suspend(self.target.clone()).await;

        let mut tables = Vec::new();
        let mut run_error = None;

        match self.selected_tables().await {
            Ok(names) => {
                info!("Found {} tables to migrate", names.len());
                for (i, name) in names.iter().enumerate() {
                    info!("[{}/{}] Migrating table {}", i + 1, names.len(), name);
                    tables.push(self.migrate_table(name).await);
                }
            }
            Err(e) => {
                error!("Could not list source tables: {}", e);
                run_error = Some(format!("listing source tables: {}", e));
            }
        }

        if let Err(e) = guard.restore().await {
            error!("Failed to re-enable foreign key checks: {}", e);
            run_error.get_or_insert_with(|| format!("re-enabling foreign key checks: {}", e));
        }

        let report = MigrationReport::new(
            run_id,
            self.source.endpoint(),
            self.target.endpoint(),
            self.target.server_flavor(),
            started_at,
            tables,
            run_error,
        );

        self.close().await;
        report.log_summary();
        Ok(report)
    }

    /// Describe, translate, create and transfer one table.
    async fn migrate_table(&self, name: &str) -> TableReport {
        let start = Instant::now();

        let table = match self.source.describe_table(name).await {
            Ok(table) => table,
            Err(e) => {
                let err = MigrateError::schema(name, e.to_string());
                error!("{}", err);
                return TableReport::failed(name, &err);
            }
        };

        let translated = match self.translator.translate(&table, self.migration.drop_first) {
            Ok(t) => t,
            Err(e) => {
                error!("{}", e);
                return TableReport::failed(name, &e);
            }
        };

        for stmt in &translated.statements {
            debug!("{}: executing\n{}", name, stmt);
            if let Err(e) = self.target.execute(stmt).await {
                let err = MigrateError::ddl(name, e);
                error!("{}", err);
                return TableReport::failed(name, &err);
            }
        }

        let rows = match self.source.read_rows(&table).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("{}: could not start reading rows: {}", name, e);
                return TableReport::failed(name, &e);
            }
        };

        let stats = self
            .engine
            .transfer(self.target.as_ref(), name, &translated.columns, rows)
            .await;

        let mut report = TableReport::from_transfer(name, stats);
        report.warnings = translated
            .columns
            .iter()
            .filter_map(|c| c.warning.as_ref().map(|w| format!("{}: {}", c.name, w)))
            .collect();
        report.duration_seconds = start.elapsed().as_secs_f64();
        report
    }

    /// DDL for every selected table, without executing anything.
    pub async fn plan(&self) -> Result<Vec<TablePlan>> {
        let mut plans = Vec::new();

        for name in self.selected_tables().await? {
            let result = match self.source.describe_table(&name).await {
                Ok(table) => self
                    .translator
                    .build_create_table(&table, self.migration.drop_first),
                Err(e) => Err(MigrateError::schema(&name, e.to_string())),
            };
            plans.push(match result {
                Ok(statements) => TablePlan {
                    name,
                    statements,
                    error: None,
                },
                Err(e) => TablePlan {
                    name,
                    statements: Vec::new(),
                    error: Some(e.to_string()),
                },
            });
        }

        Ok(plans)
    }

    /// Test both connections and measure round-trip latency.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let source = self.source.list_tables().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.ping().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let source_error = source.err().map(|e| e.to_string());
        let target_error = target.err().map(|e| e.to_string());

        HealthCheckResult {
            source_connected: source_error.is_none(),
            source_latency_ms,
            target_connected: target_error.is_none(),
            target_latency_ms,
            healthy: source_error.is_none() && target_error.is_none(),
            source_error,
            target_error,
            server_flavor: self.target.server_flavor(),
        }
    }

    /// Close both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        debug!("Connections closed");
    }
}
