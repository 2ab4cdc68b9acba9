//! Type mapping from SQLite declared types to MySQL/MariaDB column types.
//!
//! SQLite accepts any text as a column type. The declaration is normalized
//! (uppercased, whitespace collapsed, parenthesized parameters split off) and
//! the base keyword is looked up in the closed [`SourceTypeTag`] enumeration.
//! Anything not recognised falls through to `VARCHAR(255)`.

use tracing::warn;

use crate::core::identifier::quote_ident;
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::ServerFlavor;

/// Widest `CHAR` MySQL accepts.
const MAX_CHAR_LENGTH: u32 = 255;

/// Widest `VARCHAR` that fits a utf8mb4 row (65535 bytes / 4).
const MAX_VARCHAR_LENGTH: u32 = 16383;

/// Largest DECIMAL precision MySQL accepts.
const MAX_DECIMAL_PRECISION: u32 = 65;

/// Largest DECIMAL scale MySQL accepts.
const MAX_DECIMAL_SCALE: u32 = 30;

/// Epoch values above this are taken to be milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 4_000_000_000;

/// Normalized base type of a SQLite column declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTypeTag {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Boolean,
    Double,
    Decimal,
    Char,
    Varchar,
    Text,
    Json,
    Blob,
    DateTime,
    Time,
    Unknown,
}

impl SourceTypeTag {
    /// Classify a declared type such as `"varchar(100)"` or `"UNSIGNED BIG INT"`.
    pub fn parse(declared: &str) -> Self {
        Self::from_base(&DeclaredType::parse(declared).base)
    }

    fn from_base(base: &str) -> Self {
        let base = base.strip_suffix(" UNSIGNED").unwrap_or(base);
        match base {
            "TINYINT" => SourceTypeTag::TinyInt,
            "SMALLINT" | "INT2" => SourceTypeTag::SmallInt,
            "MEDIUMINT" => SourceTypeTag::MediumInt,
            "INT" | "INTEGER" => SourceTypeTag::Int,
            "BIGINT" | "INT8" | "UNSIGNED BIG INT" => SourceTypeTag::BigInt,
            "BOOLEAN" | "BOOL" => SourceTypeTag::Boolean,
            "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => SourceTypeTag::Double,
            "NUMERIC" | "DECIMAL" => SourceTypeTag::Decimal,
            "CHAR" | "CHARACTER" | "NCHAR" | "NATIVE CHARACTER" => SourceTypeTag::Char,
            "VARCHAR" | "NVARCHAR" | "VARYING CHARACTER" | "CHARACTER VARYING" => {
                SourceTypeTag::Varchar
            }
            "TEXT" | "CLOB" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "" => SourceTypeTag::Text,
            "JSON" => SourceTypeTag::Json,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => SourceTypeTag::Blob,
            "DATE" | "DATETIME" | "TIMESTAMP" => SourceTypeTag::DateTime,
            "TIME" => SourceTypeTag::Time,
            other => Self::from_affinity(other),
        }
    }

    /// SQLite's column affinity rules, applied in SQLite's order, for
    /// declarations that are not an exact keyword (`UNSIGNED INTEGER`,
    /// `VARCHAR2`, `DATETIME2`).
    fn from_affinity(base: &str) -> Self {
        if base.contains("INT") {
            if base.contains("BIG") {
                SourceTypeTag::BigInt
            } else {
                SourceTypeTag::Int
            }
        } else if base.contains("CHAR") {
            SourceTypeTag::Varchar
        } else if base.contains("CLOB") || base.contains("TEXT") {
            SourceTypeTag::Text
        } else if base.contains("BLOB") {
            SourceTypeTag::Blob
        } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
            SourceTypeTag::Double
        } else if base.contains("DATE") || base.contains("TIMESTAMP") {
            SourceTypeTag::DateTime
        } else {
            SourceTypeTag::Unknown
        }
    }

    /// Whether the tag is one of the integer widths.
    ///
    /// Booleans are stored as integers but never become auto-increment keys.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SourceTypeTag::TinyInt
                | SourceTypeTag::SmallInt
                | SourceTypeTag::MediumInt
                | SourceTypeTag::Int
                | SourceTypeTag::BigInt
        )
    }
}

/// A declared type split into base keyword and numeric parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclaredType {
    base: String,
    params: Vec<u32>,
}

impl DeclaredType {
    fn parse(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        let (base, params) = match upper.find('(') {
            Some(open) => {
                let close = upper[open..].find(')').map(|i| open + i).unwrap_or(upper.len());
                let params = upper[open + 1..close]
                    .split(',')
                    .filter_map(|p| p.trim().parse::<u32>().ok())
                    .collect();
                // Keep anything after the parameters, e.g. "INT(11) UNSIGNED".
                let tail = upper.get(close + 1..).unwrap_or("");
                (format!("{} {}", &upper[..open], tail), params)
            }
            None => (upper, Vec::new()),
        };

        Self {
            base: base.split_whitespace().collect::<Vec<_>>().join(" "),
            params,
        }
    }
}

/// Map a declared source type to a target column type.
///
/// Total: every input, including the empty string, yields a usable type.
pub fn map_type(source_type: &str) -> String {
    let declared = DeclaredType::parse(source_type);
    let tag = SourceTypeTag::from_base(&declared.base);
    let p = &declared.params;

    match tag {
        SourceTypeTag::TinyInt => "TINYINT".to_string(),
        SourceTypeTag::SmallInt => "SMALLINT".to_string(),
        SourceTypeTag::MediumInt => "MEDIUMINT".to_string(),
        SourceTypeTag::Int => "INT".to_string(),
        SourceTypeTag::BigInt => "BIGINT".to_string(),
        SourceTypeTag::Boolean => "TINYINT(1)".to_string(),
        SourceTypeTag::Double => "DOUBLE".to_string(),
        SourceTypeTag::Decimal => match p.as_slice() {
            [precision, scale, ..] => {
                let precision = (*precision).clamp(1, MAX_DECIMAL_PRECISION);
                let scale = (*scale).min(MAX_DECIMAL_SCALE).min(precision);
                format!("DECIMAL({},{})", precision, scale)
            }
            [precision] => format!("DECIMAL({})", (*precision).clamp(1, MAX_DECIMAL_PRECISION)),
            [] => "DECIMAL(10,2)".to_string(),
        },
        SourceTypeTag::Char => match p.first().copied().filter(|n| *n > 0) {
            Some(n) if n > MAX_CHAR_LENGTH => varchar(n),
            Some(n) => format!("CHAR({})", n),
            None => "CHAR(1)".to_string(),
        },
        SourceTypeTag::Varchar => match p.first().copied().filter(|n| *n > 0) {
            Some(n) => varchar(n),
            None => "VARCHAR(255)".to_string(),
        },
        SourceTypeTag::Text | SourceTypeTag::Json => "LONGTEXT".to_string(),
        SourceTypeTag::Blob => "LONGBLOB".to_string(),
        SourceTypeTag::DateTime => "DATETIME".to_string(),
        SourceTypeTag::Time => "TIME".to_string(),
        SourceTypeTag::Unknown => "VARCHAR(255)".to_string(),
    }
}

fn varchar(n: u32) -> String {
    if n > MAX_VARCHAR_LENGTH {
        "LONGTEXT".to_string()
    } else {
        format!("VARCHAR({})", n)
    }
}

/// Indexable width of a target column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    /// Fixed or variable-length character column of `n` characters.
    Chars(u32),
    /// TEXT/BLOB family; an index on it always needs a prefix length.
    Unbounded,
    /// Numeric and temporal types; never prefixed.
    Fixed,
}

/// Classify a mapped target type for index prefix calculations.
pub fn key_width(target_type: &str) -> KeyWidth {
    if is_blob_family(target_type) {
        return KeyWidth::Unbounded;
    }
    let declared = DeclaredType::parse(target_type);
    match (declared.base.as_str(), declared.params.first()) {
        ("CHAR" | "VARCHAR", Some(n)) => KeyWidth::Chars(*n),
        _ => KeyWidth::Fixed,
    }
}

/// TEXT, BLOB, JSON and GEOMETRY columns (which MySQL forbids literal defaults on).
pub fn is_blob_family(target_type: &str) -> bool {
    let upper = target_type.trim().to_ascii_uppercase();
    ["TINYTEXT", "TEXT", "MEDIUMTEXT", "LONGTEXT", "TINYBLOB", "BLOB", "MEDIUMBLOB", "LONGBLOB", "JSON"]
        .contains(&upper.as_str())
        || upper.contains("GEOMETRY")
}

/// Per-run settings the type mapper needs beyond the column itself.
#[derive(Debug, Clone)]
pub struct TypeMapOptions {
    /// Target server flavor; controls whether blob defaults are kept.
    pub flavor: ServerFlavor,

    /// Columns holding Unix epoch values, as `table.column` or bare `column`.
    pub epoch_columns: Vec<String>,
}

impl Default for TypeMapOptions {
    fn default() -> Self {
        Self {
            flavor: ServerFlavor::Mysql,
            epoch_columns: Vec::new(),
        }
    }
}

impl TypeMapOptions {
    /// Whether `table.column` is configured as an epoch column.
    pub fn is_epoch_column(&self, table: &str, column: &str) -> bool {
        self.epoch_columns.iter().any(|entry| match entry.split_once('.') {
            Some((t, c)) => t == table && c == column,
            None => entry == column,
        })
    }
}

/// Fully resolved target column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    /// Column name, unchanged from the source.
    pub name: String,

    /// Target type, e.g. `VARCHAR(150)` or `INT UNSIGNED`.
    pub target_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Rendered default clause without the `DEFAULT` keyword.
    pub default: Option<String>,

    /// Emit `AUTO_INCREMENT`.
    pub auto_increment: bool,

    /// Configured as a Unix epoch column; values that are not timestamps
    /// are stored as NULL.
    pub is_epoch: bool,

    /// Set when part of the source declaration could not be carried over.
    pub warning: Option<String>,
}

impl ColumnMapping {
    /// Column definition for a `CREATE TABLE` body.
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.target_type);
        if !self.is_nullable {
            def.push_str(" NOT NULL");
        }
        if self.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = &self.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }

    /// Whether values bound for this column go through timestamp conversion.
    pub fn is_datetime(&self) -> bool {
        self.target_type == "DATETIME"
    }
}

/// Map a column, resolving type, nullability, default and auto-increment.
pub fn map_column(table: &str, col: &ColumnDescriptor, opts: &TypeMapOptions) -> ColumnMapping {
    if col.is_auto_increment {
        let target_type = match SourceTypeTag::parse(&col.source_type) {
            SourceTypeTag::BigInt => "BIGINT UNSIGNED",
            _ => "INT UNSIGNED",
        };
        return ColumnMapping {
            name: col.name.clone(),
            target_type: target_type.to_string(),
            is_nullable: false,
            default: None,
            auto_increment: true,
            is_epoch: false,
            warning: None,
        };
    }

    let is_epoch = opts.is_epoch_column(table, &col.name);
    let mut target_type = if is_epoch {
        "DATETIME".to_string()
    } else {
        map_type(&col.source_type)
    };

    let mut warning = None;
    let default = match col.default_value.as_deref() {
        Some(raw) => match map_default(raw, &target_type, col.is_nullable, opts.flavor) {
            DefaultAction::Keep(value) => {
                if target_type == "TINYINT" && tinyint_overflow(&value) {
                    target_type = "SMALLINT".to_string();
                }
                Some(value)
            }
            DefaultAction::Skip(reason) => {
                warn!(
                    "{}.{}: dropping default {} ({})",
                    table, col.name, raw, reason
                );
                warning = Some(format!("default {} dropped: {}", raw, reason));
                None
            }
        },
        None => None,
    };

    ColumnMapping {
        name: col.name.clone(),
        target_type,
        is_nullable: col.is_nullable,
        default,
        auto_increment: false,
        is_epoch,
        warning,
    }
}

#[derive(Debug, PartialEq)]
enum DefaultAction {
    Keep(String),
    Skip(&'static str),
}

fn map_default(raw: &str, target_type: &str, nullable: bool, flavor: ServerFlavor) -> DefaultAction {
    let expr = strip_outer_parens(raw.trim());
    let upper = expr.to_ascii_uppercase();

    if !flavor.allows_blob_defaults() && is_blob_family(target_type) {
        return DefaultAction::Skip("TEXT/BLOB columns cannot have a default on MySQL");
    }

    if upper == "CURRENT_TIMESTAMP"
        || upper == "'CURRENT_TIMESTAMP'"
        || upper.contains("DATETIME('NOW')")
    {
        return if target_type == "DATETIME" {
            DefaultAction::Keep("CURRENT_TIMESTAMP".to_string())
        } else {
            DefaultAction::Skip("CURRENT_TIMESTAMP only applies to DATETIME columns")
        };
    }

    if upper == "NULL" || upper == "'NULL'" {
        return if nullable {
            DefaultAction::Keep("NULL".to_string())
        } else {
            DefaultAction::Skip("NOT NULL column cannot default to NULL")
        };
    }

    if expr.len() >= 2 && expr.starts_with('"') && expr.ends_with('"') {
        let inner = &expr[1..expr.len() - 1];
        return DefaultAction::Keep(format!("'{}'", inner.replace('\'', "''")));
    }

    DefaultAction::Keep(expr.to_string())
}

/// Remove parentheses that wrap the whole expression, e.g. `(datetime('now'))`.
fn strip_outer_parens(mut expr: &str) -> &str {
    while expr.starts_with('(') && expr.ends_with(')') && wraps_whole(expr) {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0i32;
    for (i, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != expr.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn tinyint_overflow(default: &str) -> bool {
    default
        .trim_matches('\'')
        .parse::<i64>()
        .map(|v| !(-128..=127).contains(&v))
        .unwrap_or(false)
}
