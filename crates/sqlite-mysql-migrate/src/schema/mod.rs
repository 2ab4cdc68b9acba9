//! Schema translation: source table descriptors to MySQL DDL.
//!
//! Every statement produced here is safe to re-issue. Tables are created with
//! `CREATE TABLE IF NOT EXISTS` and secondary indexes are declared inside
//! the same statement, so an existing target table is left untouched.

use tracing::debug;

use crate::core::identifier::{is_reserved_word, quote_ident};
use crate::core::schema::{IndexDescriptor, TableDescriptor};
use crate::core::traits::ServerFlavor;
use crate::error::{MigrateError, Result};
use crate::typemap::{key_width, map_column, ColumnMapping, KeyWidth, TypeMapOptions};

/// Default collation for created tables.
pub const DEFAULT_COLLATION: &str = "utf8mb4_unicode_ci";

/// InnoDB key prefix limit for COMPACT/REDUNDANT row formats.
pub const DEFAULT_KEY_PREFIX_CAP_BYTES: u32 = 767;

/// Maximum bytes per character in utf8mb4.
const UTF8MB4_BYTES_PER_CHAR: u32 = 4;

/// Options that shape the generated DDL.
#[derive(Debug, Clone)]
pub struct DdlOptions {
    /// Table collation; the character set is always utf8mb4.
    pub collation: String,

    /// Byte cap on a single indexed column.
    pub key_prefix_cap_bytes: u32,

    /// Type mapping settings.
    pub type_map: TypeMapOptions,
}

impl Default for DdlOptions {
    fn default() -> Self {
        Self {
            collation: DEFAULT_COLLATION.to_string(),
            key_prefix_cap_bytes: DEFAULT_KEY_PREFIX_CAP_BYTES,
            type_map: TypeMapOptions::default(),
        }
    }
}

impl DdlOptions {
    /// Set the server flavor.
    pub fn with_flavor(mut self, flavor: ServerFlavor) -> Self {
        self.type_map.flavor = flavor;
        self
    }

    /// Largest index prefix, in characters, that fits under the byte cap.
    pub fn max_prefix_chars(&self) -> u32 {
        (self.key_prefix_cap_bytes / UTF8MB4_BYTES_PER_CHAR).max(1)
    }
}

/// Output of translating one table.
#[derive(Debug, Clone)]
pub struct TranslatedTable {
    /// Statements to execute, in order.
    pub statements: Vec<String>,

    /// Resolved target columns, in source column order.
    pub columns: Vec<ColumnMapping>,
}

/// Builds target DDL from source table descriptors.
#[derive(Debug, Clone, Default)]
pub struct SchemaTranslator {
    options: DdlOptions,
}

impl SchemaTranslator {
    /// Create a translator with the given options.
    pub fn new(options: DdlOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &DdlOptions {
        &self.options
    }

    /// DDL statements for `table`.
    ///
    /// With `drop_first`, a `DROP TABLE IF EXISTS` precedes the create.
    pub fn build_create_table(&self, table: &TableDescriptor, drop_first: bool) -> Result<Vec<String>> {
        Ok(self.translate(table, drop_first)?.statements)
    }

    /// Map columns and build DDL for `table`.
    pub fn translate(&self, table: &TableDescriptor, drop_first: bool) -> Result<TranslatedTable> {
        table.validate()?;

        let columns: Vec<ColumnMapping> = table
            .columns
            .iter()
            .map(|c| map_column(&table.name, c, &self.options.type_map))
            .collect();

        let mut body: Vec<String> = columns.iter().map(ColumnMapping::definition).collect();

        if !table.pk_columns().is_empty() {
            body.push(format!(
                "PRIMARY KEY ({})",
                self.key_parts(&table.name, table.pk_columns(), &columns)?
            ));
        }

        for idx in &table.indexes {
            body.push(self.index_clause(&table.name, idx, &columns)?);
        }

        let table_ident = quote_ident(&table.name);
        if is_reserved_word(&table.name) {
            debug!("{}: table name is a reserved word", table.name);
        }

        let mut statements = Vec::with_capacity(2);
        if drop_first {
            statements.push(format!("DROP TABLE IF EXISTS {}", table_ident));
        }
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE={}",
            table_ident,
            body.join(",\n    "),
            self.options.collation
        ));

        Ok(TranslatedTable { statements, columns })
    }

    fn index_clause(
        &self,
        table: &str,
        idx: &IndexDescriptor,
        columns: &[ColumnMapping],
    ) -> Result<String> {
        let kind = if idx.is_unique { "UNIQUE KEY" } else { "KEY" };
        Ok(format!(
            "{} {} ({})",
            kind,
            quote_ident(&idx.name),
            self.key_parts(table, &idx.columns, columns)?
        ))
    }

    /// Render indexed columns, adding a prefix length where the column is too wide.
    fn key_parts(&self, table: &str, names: &[String], columns: &[ColumnMapping]) -> Result<String> {
        let max_chars = self.options.max_prefix_chars();
        let mut parts = Vec::with_capacity(names.len());

        for name in names {
            let mapping = columns
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| MigrateError::schema(table, format!("unknown key column '{}'", name)))?;

            let prefix = match key_width(&mapping.target_type) {
                KeyWidth::Chars(n) if n.saturating_mul(UTF8MB4_BYTES_PER_CHAR) > self.options.key_prefix_cap_bytes => {
                    Some(max_chars)
                }
                KeyWidth::Unbounded => Some(max_chars),
                _ => None,
            };

            match prefix {
                Some(len) => {
                    debug!("{}.{}: indexing first {} characters", table, name, len);
                    parts.push(format!("{}({})", quote_ident(name), len));
                }
                None => parts.push(quote_ident(name)),
            }
        }

        Ok(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, PrimaryKeySpec};

    fn monitor() -> TableDescriptor {
        TableDescriptor::new(
            "monitor",
            vec![
                ColumnDescriptor::new("id", "INTEGER").not_null(),
                ColumnDescriptor::new("name", "VARCHAR(150)"),
                ColumnDescriptor::new("url", "TEXT"),
                ColumnDescriptor::new("active", "BOOLEAN").not_null().with_default("1"),
            ],
            vec![
                IndexDescriptor {
                    name: "monitor_name_unique".into(),
                    columns: vec!["name".into()],
                    is_unique: true,
                },
                IndexDescriptor {
                    name: "monitor_url_index".into(),
                    columns: vec!["url".into()],
                    is_unique: false,
                },
            ],
            Some(PrimaryKeySpec {
                columns: vec!["id".into()],
            }),
        )
    }

    #[test]
    fn test_create_table_layout() {
        let translator = SchemaTranslator::default();
        let ddl = translator.build_create_table(&monitor(), false).unwrap();
        assert_eq!(ddl.len(), 1);
        assert_eq!(
            ddl[0],
            "CREATE TABLE IF NOT EXISTS `monitor` (\n    \
             `id` INT UNSIGNED NOT NULL AUTO_INCREMENT,\n    \
             `name` VARCHAR(150),\n    \
             `url` LONGTEXT,\n    \
             `active` TINYINT(1) NOT NULL DEFAULT 1,\n    \
             PRIMARY KEY (`id`),\n    \
             UNIQUE KEY `monitor_name_unique` (`name`),\n    \
             KEY `monitor_url_index` (`url`(191))\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
        );
    }

    #[test]
    fn test_drop_first_prepends_drop() {
        let translator = SchemaTranslator::default();
        let ddl = translator.build_create_table(&monitor(), true).unwrap();
        assert_eq!(ddl.len(), 2);
        assert_eq!(ddl[0], "DROP TABLE IF EXISTS `monitor`");
        assert!(ddl[1].starts_with("CREATE TABLE IF NOT EXISTS `monitor`"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let translator = SchemaTranslator::default();
        let table = monitor();
        assert_eq!(
            translator.build_create_table(&table, false).unwrap(),
            translator.build_create_table(&table, false).unwrap()
        );
    }

    #[test]
    fn test_reserved_table_name_is_quoted() {
        let table = TableDescriptor::new(
            "group",
            vec![ColumnDescriptor::new("order", "INTEGER")],
            vec![],
            None,
        );
        let ddl = SchemaTranslator::default().build_create_table(&table, false).unwrap();
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS `group` (\n    `order` INT"));
    }

    #[test]
    fn test_wide_varchar_index_gets_prefix_but_keeps_width() {
        let table = TableDescriptor::new(
            "setting",
            vec![ColumnDescriptor::new("key", "VARCHAR(255)").not_null()],
            vec![],
            Some(PrimaryKeySpec {
                columns: vec!["key".into()],
            }),
        );
        let ddl = SchemaTranslator::default().build_create_table(&table, false).unwrap();
        assert!(ddl[0].contains("`key` VARCHAR(255) NOT NULL"));
        assert!(ddl[0].contains("PRIMARY KEY (`key`(191))"));
    }

    #[test]
    fn test_narrow_varchar_index_has_no_prefix() {
        let table = TableDescriptor::new(
            "tag",
            vec![ColumnDescriptor::new("color", "VARCHAR(191)")],
            vec![IndexDescriptor {
                name: "tag_color".into(),
                columns: vec!["color".into()],
                is_unique: false,
            }],
            None,
        );
        let ddl = SchemaTranslator::default().build_create_table(&table, false).unwrap();
        assert!(ddl[0].contains("KEY `tag_color` (`color`)"));
    }

    #[test]
    fn test_custom_cap_and_collation() {
        let options = DdlOptions {
            collation: "utf8mb4_general_ci".into(),
            key_prefix_cap_bytes: 3072,
            ..Default::default()
        };
        let translator = SchemaTranslator::new(options);
        assert_eq!(translator.options().max_prefix_chars(), 768);

        let ddl = translator.build_create_table(&monitor(), false).unwrap();
        assert!(ddl[0].ends_with("COLLATE=utf8mb4_general_ci"));
        assert!(ddl[0].contains("KEY `monitor_url_index` (`url`(768))"));
    }

    #[test]
    fn test_composite_pk_in_declared_order() {
        let table = TableDescriptor::new(
            "monitor_tag",
            vec![
                ColumnDescriptor::new("tag_id", "INTEGER").not_null(),
                ColumnDescriptor::new("monitor_id", "INTEGER").not_null(),
            ],
            vec![],
            Some(PrimaryKeySpec {
                columns: vec!["monitor_id".into(), "tag_id".into()],
            }),
        );
        let ddl = SchemaTranslator::default().build_create_table(&table, false).unwrap();
        assert!(ddl[0].contains("PRIMARY KEY (`monitor_id`, `tag_id`)"));
        assert!(!ddl[0].contains("AUTO_INCREMENT"));
    }

    #[test]
    fn test_malformed_table_is_schema_error() {
        let table = TableDescriptor::new("broken", vec![], vec![], None);
        let err = SchemaTranslator::default()
            .build_create_table(&table, false)
            .unwrap_err();
        assert!(matches!(err, MigrateError::SchemaTranslation { .. }));
    }

    #[test]
    fn test_translate_exposes_datetime_columns() {
        let table = TableDescriptor::new(
            "heartbeat",
            vec![
                ColumnDescriptor::new("id", "INTEGER"),
                ColumnDescriptor::new("time", "DATETIME"),
            ],
            vec![],
            None,
        );
        let translated = SchemaTranslator::default().translate(&table, false).unwrap();
        let flags: Vec<bool> = translated.columns.iter().map(|c| c.is_datetime()).collect();
        assert_eq!(flags, vec![false, true]);
    }
}
