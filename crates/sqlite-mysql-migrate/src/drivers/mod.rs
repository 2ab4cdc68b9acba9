//! Database driver implementations.
//!
//! - [`sqlite`]: read-only source over sqlx
//! - [`mysql`]: MySQL/MariaDB target over mysql_async
//!
//! Each driver implements one of the capability traits in
//! [`crate::core::traits`].

pub mod mysql;
pub mod sqlite;

pub use mysql::MysqlWriter;
pub use sqlite::SqliteReader;
