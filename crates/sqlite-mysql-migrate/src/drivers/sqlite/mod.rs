//! SQLite source driver.
//!
//! The source is opened read-only through sqlx with a single connection.
//! Rows are decoded by the storage class of each value rather than the
//! declared column type, since SQLite does not enforce declared types.

mod reader;

pub use reader::SqliteReader;
