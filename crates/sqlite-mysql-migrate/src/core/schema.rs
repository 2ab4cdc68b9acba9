//! Schema metadata for source tables, columns, indexes and primary keys.
//!
//! A [`TableDescriptor`] is built once per table from source metadata and is
//! read-only afterwards; both the schema translator and the transfer engine
//! consume it.

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name as it appears in the source catalog.
    pub name: String,

    /// Column definitions in source order.
    pub columns: Vec<ColumnDescriptor>,

    /// Secondary indexes in source listing order.
    pub indexes: Vec<IndexDescriptor>,

    /// Primary key, if the source declares one.
    pub primary_key: Option<PrimaryKeySpec>,
}

impl TableDescriptor {
    /// Assemble a descriptor, deriving the auto-increment flag.
    ///
    /// A column is auto-increment only when it is the table's sole primary
    /// key column and its declared type is an integer type. Composite keys
    /// never qualify.
    pub fn new(
        name: impl Into<String>,
        mut columns: Vec<ColumnDescriptor>,
        indexes: Vec<IndexDescriptor>,
        primary_key: Option<PrimaryKeySpec>,
    ) -> Self {
        let sole_pk = primary_key
            .as_ref()
            .filter(|pk| pk.columns.len() == 1)
            .map(|pk| pk.columns[0].clone());

        for col in &mut columns {
            col.is_auto_increment = sole_pk.as_deref() == Some(col.name.as_str())
                && crate::typemap::SourceTypeTag::parse(&col.source_type).is_integer();
        }

        Self {
            name: name.into(),
            columns,
            indexes,
            primary_key,
        }
    }

    /// Find a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, empty when the table has none.
    pub fn pk_columns(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or(&[])
    }

    /// The auto-increment column, if any.
    pub fn auto_increment_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_auto_increment)
    }

    /// Check the descriptor for metadata the target cannot accept.
    pub fn validate(&self) -> Result<()> {
        crate::core::identifier::validate_identifier(&self.name)
            .map_err(|e| MigrateError::schema(&self.name, e.to_string()))?;

        if self.columns.is_empty() {
            return Err(MigrateError::schema(&self.name, "table has no columns"));
        }

        for col in &self.columns {
            crate::core::identifier::validate_identifier(&col.name)
                .map_err(|e| MigrateError::schema(&self.name, e.to_string()))?;
        }

        let auto_inc = self.columns.iter().filter(|c| c.is_auto_increment).count();
        if auto_inc > 1 {
            return Err(MigrateError::schema(
                &self.name,
                format!("{} auto-increment columns, at most one allowed", auto_inc),
            ));
        }

        for pk_col in self.pk_columns() {
            if self.column(pk_col).is_none() {
                return Err(MigrateError::schema(
                    &self.name,
                    format!("primary key references unknown column '{}'", pk_col),
                ));
            }
        }

        for idx in &self.indexes {
            if idx.columns.is_empty() {
                return Err(MigrateError::schema(
                    &self.name,
                    format!("index '{}' has no columns", idx.name),
                ));
            }
            for col in &idx.columns {
                if self.column(col).is_none() {
                    return Err(MigrateError::schema(
                        &self.name,
                        format!("index '{}' references unknown column '{}'", idx.name, col),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Declared type exactly as the source reports it (e.g. "VARCHAR(100)").
    pub source_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default value expression as declared in the source, if any.
    pub default_value: Option<String>,

    /// Sole integer primary key column.
    pub is_auto_increment: bool,
}

impl ColumnDescriptor {
    /// Create a nullable column with no default.
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            is_nullable: true,
            default_value: None,
            is_auto_increment: false,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Attach a default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,

    /// Indexed column names, in key order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,
}

/// Primary key column names in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeySpec {
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(cols: &[&str]) -> Option<PrimaryKeySpec> {
        Some(PrimaryKeySpec {
            columns: cols.iter().map(|c| c.to_string()).collect(),
        })
    }

    #[test]
    fn test_sole_integer_pk_is_auto_increment() {
        let table = TableDescriptor::new(
            "monitor",
            vec![
                ColumnDescriptor::new("id", "INTEGER"),
                ColumnDescriptor::new("name", "VARCHAR(150)"),
            ],
            vec![],
            pk(&["id"]),
        );
        assert!(table.columns[0].is_auto_increment);
        assert!(!table.columns[1].is_auto_increment);
        assert_eq!(table.auto_increment_column().unwrap().name, "id");
    }

    #[test]
    fn test_unsigned_integer_pk_is_auto_increment() {
        let table = TableDescriptor::new(
            "heartbeat",
            vec![
                ColumnDescriptor::new("id", "UNSIGNED INTEGER"),
                ColumnDescriptor::new("msg", "LONGTEXT"),
            ],
            vec![],
            pk(&["id"]),
        );
        assert_eq!(table.auto_increment_column().unwrap().name, "id");
    }

    #[test]
    fn test_text_pk_is_not_auto_increment() {
        let table = TableDescriptor::new(
            "setting",
            vec![ColumnDescriptor::new("key", "VARCHAR(200)")],
            vec![],
            pk(&["key"]),
        );
        assert!(table.auto_increment_column().is_none());
    }

    #[test]
    fn test_composite_pk_never_auto_increment() {
        let table = TableDescriptor::new(
            "monitor_tag",
            vec![
                ColumnDescriptor::new("monitor_id", "INTEGER"),
                ColumnDescriptor::new("tag_id", "INTEGER"),
            ],
            vec![IndexDescriptor {
                name: "idx_tag".into(),
                columns: vec!["tag_id".into()],
                is_unique: false,
            }],
            pk(&["monitor_id", "tag_id"]),
        );
        assert!(table.auto_increment_column().is_none());
        assert_eq!(table.pk_columns(), ["monitor_id", "tag_id"]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let table = TableDescriptor::new("empty", vec![], vec![], None);
        let err = table.validate().unwrap_err();
        assert!(matches!(err, MigrateError::SchemaTranslation { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_index_column() {
        let table = TableDescriptor::new(
            "t",
            vec![ColumnDescriptor::new("a", "TEXT")],
            vec![IndexDescriptor {
                name: "idx_b".into(),
                columns: vec!["b".into()],
                is_unique: true,
            }],
            None,
        );
        assert!(table.validate().is_err());
    }
}
