//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors (bad YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when either database cannot be reached at start.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when the run finished but some tables failed or were partial.
pub const EXIT_INCOMPLETE: u8 = 3;
/// Exit code for unexpected runtime errors.
pub const EXIT_RUNTIME_ERROR: u8 = 4;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source or target unreachable when the run starts. Fatal.
    #[error("Connection error ({endpoint}): {message}")]
    Connection { endpoint: String, message: String },

    /// Source metadata for a table is malformed or unreadable.
    #[error("Schema translation failed for table {table}: {message}")]
    SchemaTranslation { table: String, message: String },

    /// Target rejected generated DDL.
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Target rejected a batch for a reason other than duplicate keys.
    #[error("Batch {batch} of table {table} failed: {message}")]
    BatchInsert {
        table: String,
        batch: usize,
        message: String,
    },

    /// A single field could not be converted to its target representation.
    #[error("Cannot convert value in column {column}: {message}")]
    ValueConversion { column: String, message: String },

    /// The run completed but one or more tables did not fully migrate.
    #[error("Migration incomplete: {0}")]
    Incomplete(String),

    /// Source database (SQLite) error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database (MySQL/MariaDB) error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error for the given endpoint.
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a SchemaTranslation error.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::SchemaTranslation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Ddl error.
    pub fn ddl(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Ddl {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a BatchInsert error.
    pub fn batch(table: impl Into<String>, batch: usize, message: impl ToString) -> Self {
        MigrateError::BatchInsert {
            table: table.into(),
            batch,
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Incomplete(_) => EXIT_INCOMPLETE,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_RUNTIME_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            MigrateError::connection("sqlite", "missing").exit_code(),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(
            MigrateError::Incomplete("1 table failed".into()).exit_code(),
            EXIT_INCOMPLETE
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
        assert_eq!(MigrateError::ddl("t", "syntax").exit_code(), EXIT_RUNTIME_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::batch("heartbeat", 3, "Lost connection");
        let text = err.format_detailed();
        assert!(text.starts_with("Error: Batch 3 of table heartbeat failed"));
    }
}
