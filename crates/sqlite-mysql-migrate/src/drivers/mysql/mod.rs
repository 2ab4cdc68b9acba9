//! MySQL/MariaDB target driver.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! The server flavor is detected from `SELECT VERSION()` at connect time;
//! MariaDB allows literal defaults on TEXT/BLOB columns, MySQL does not.

mod writer;

pub use writer::MysqlWriter;
