//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.port == 0 {
        return Err(MigrateError::Config("target.port must be non-zero".into()));
    }

    // Migration config validation
    let m = &config.migration;
    if m.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if m.key_prefix_cap_bytes < 4 {
        return Err(MigrateError::Config(
            "migration.key_prefix_cap_bytes must be at least 4".into(),
        ));
    }
    // Tables are always created with CHARSET=utf8mb4.
    if !m.collation.starts_with("utf8mb4_") {
        return Err(MigrateError::Config(format!(
            "migration.collation must be a utf8mb4 collation, got '{}'",
            m.collation
        )));
    }
    if m
        .collation
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    {
        return Err(MigrateError::Config(format!(
            "migration.collation contains invalid characters: '{}'",
            m.collation
        )));
    }
    for entry in &m.epoch_columns {
        if entry.is_empty() || entry.starts_with('.') || entry.ends_with('.') {
            return Err(MigrateError::Config(format!(
                "migration.epoch_columns entry '{}' must be 'table.column' or 'column'",
                entry
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                path: "kuma.db".into(),
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "kuma".to_string(),
                user: "kuma".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_collation_must_be_utf8mb4() {
        let mut config = valid_config();
        config.migration.collation = "latin1_swedish_ci".to_string();
        assert!(validate(&config).is_err());

        config.migration.collation = "utf8mb4_general_ci; DROP".to_string();
        assert!(validate(&config).is_err());

        config.migration.collation = "utf8mb4_0900_ai_ci".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_epoch_column_entry() {
        let mut config = valid_config();
        config.migration.epoch_columns = vec!["table.".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
