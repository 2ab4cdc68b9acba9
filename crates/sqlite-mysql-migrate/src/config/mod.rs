//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::schema::DdlOptions;
use crate::transfer::TransferConfig;
use crate::typemap::TypeMapOptions;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl MigrationConfig {
    /// DDL options for the schema translator. The flavor is filled in once
    /// the target is connected.
    pub fn ddl_options(&self) -> DdlOptions {
        DdlOptions {
            collation: self.collation.clone(),
            key_prefix_cap_bytes: self.key_prefix_cap_bytes,
            type_map: TypeMapOptions {
                epoch_columns: self.epoch_columns.clone(),
                ..Default::default()
            },
        }
    }

    /// Settings for the transfer engine.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            batch_size: self.batch_size,
            batch_retries: self.batch_retries,
        }
    }

    /// Whether `table` passes the include/exclude filters.
    ///
    /// An empty include list selects every table. Exclusion wins over inclusion.
    pub fn table_selected(&self, table: &str) -> bool {
        let included = self.include_tables.is_empty()
            || self.include_tables.iter().any(|p| glob_match(p, table));
        included && !self.exclude_tables.iter().any(|p| glob_match(p, table))
    }
}

/// Match `name` against a pattern with `*` (any run) and `?` (one character).
///
/// Matching is case-insensitive, like SQLite table names.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let n: Vec<char> = name.to_lowercase().chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "monitor"));
        assert!(glob_match("monitor*", "monitor_tag"));
        assert!(glob_match("*_tag", "monitor_tag"));
        assert!(glob_match("heart?eat", "heartbeat"));
        assert!(glob_match("USER", "user"));
        assert!(!glob_match("monitor", "monitor_tag"));
        assert!(!glob_match("a*b", "acd"));
        assert!(glob_match("a*b*c", "axxbyyc"));
    }

    #[test]
    fn test_table_selected() {
        let mut m = MigrationConfig::default();
        assert!(m.table_selected("anything"));

        m.include_tables = vec!["monitor*".into()];
        m.exclude_tables = vec!["monitor_tls*".into()];
        assert!(m.table_selected("monitor"));
        assert!(m.table_selected("monitor_tag"));
        assert!(!m.table_selected("monitor_tls_info"));
        assert!(!m.table_selected("heartbeat"));
    }

    #[test]
    fn test_ddl_options_carry_settings() {
        let m = MigrationConfig {
            collation: "utf8mb4_bin".into(),
            key_prefix_cap_bytes: 3072,
            epoch_columns: vec!["ts".into()],
            ..Default::default()
        };
        let opts = m.ddl_options();
        assert_eq!(opts.collation, "utf8mb4_bin");
        assert_eq!(opts.key_prefix_cap_bytes, 3072);
        assert!(opts.type_map.is_epoch_column("any", "ts"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Io(_)));
    }
}
