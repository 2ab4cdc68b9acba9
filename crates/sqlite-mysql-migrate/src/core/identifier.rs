//! Identifier validation and quoting.
//!
//! Target identifiers are always wrapped in backticks. SQLite metadata does
//! not say which names are reserved in MySQL, so quoting is unconditional and
//! the name's bytes are kept exactly as the source reports them.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted by MySQL.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Common MySQL reserved words that show up as SQLite table or column names.
const RESERVED_WORDS: &[&str] = &[
    "add", "alter", "asc", "check", "column", "constraint", "create", "database", "delete",
    "desc", "distinct", "drop", "foreign", "from", "group", "having", "index", "inner",
    "insert", "interval", "join", "key", "keys", "left", "limit", "offset", "order",
    "primary", "range", "references", "right", "select", "status", "table", "union",
    "unique", "update", "where",
];

/// Validate an identifier before it is used in DDL.
///
/// Rejects empty names, names containing NUL bytes, and names longer than
/// MySQL's 64 character limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a target (MySQL) identifier with backticks.
///
/// ```ignore
/// assert_eq!(quote_ident("group"), "`group`");
/// ```
pub fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    quoted.push_str(name);
    quoted.push('`');
    quoted
}

/// Quote a source (SQLite) identifier with double quotes.
pub fn quote_sqlite(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Whether `name` is a MySQL reserved word (case-insensitive).
pub fn is_reserved_word(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
}
