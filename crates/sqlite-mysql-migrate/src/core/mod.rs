//! Core abstractions shared by every stage of a migration.
//!
//! - [`schema`]: table, column, index and primary-key descriptors
//! - [`value`]: dynamically-typed cell values and batches
//! - [`traits`]: source and target capability handles
//! - [`identifier`]: identifier validation and quoting
//!
//! Driver modules implement the traits; the schema translator, transfer
//! engine and orchestrator depend only on this module.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnDescriptor, IndexDescriptor, PrimaryKeySpec, TableDescriptor};
pub use traits::{RowStream, ServerFlavor, SourceStore, TargetStore};
pub use value::{BatchUnit, Row, SqlValue};
