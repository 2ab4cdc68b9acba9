//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::schema::{DEFAULT_COLLATION, DEFAULT_KEY_PREFIX_CAP_BYTES};
use crate::transfer::DEFAULT_BATCH_SIZE;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (MySQL/MariaDB).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file. Opened read-only.
    pub path: PathBuf,
}

/// Target database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name. Must already exist.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per insert batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Drop each target table before creating it (default: false).
    #[serde(default)]
    pub drop_first: bool,

    /// Table collation (default: utf8mb4_unicode_ci).
    #[serde(default = "default_collation")]
    pub collation: String,

    /// Byte cap on an indexed column (default: 767, the InnoDB COMPACT limit).
    #[serde(default = "default_key_prefix_cap_bytes")]
    pub key_prefix_cap_bytes: u32,

    /// Extra attempts for a failed batch (default: 0).
    #[serde(default)]
    pub batch_retries: u32,

    /// Columns holding Unix epoch values, as `table.column` or `column`.
    #[serde(default)]
    pub epoch_columns: Vec<String>,

    /// Tables to include (glob patterns). Empty means all tables.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (glob patterns).
    #[serde(default)]
    pub exclude_tables: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            drop_first: false,
            collation: default_collation(),
            key_prefix_cap_bytes: default_key_prefix_cap_bytes(),
            batch_retries: 0,
            epoch_columns: Vec::new(),
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_collation() -> String {
    DEFAULT_COLLATION.to_string()
}

fn default_key_prefix_cap_bytes() -> u32 {
    DEFAULT_KEY_PREFIX_CAP_BYTES
}
