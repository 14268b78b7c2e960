#![forbid(unsafe_code)]
//! SQLite storage for `hierarchy-core`.
//! Nodes and closure rows live in two tables of one database, so a single SQLite
//! transaction covers both stores.

mod schema;
mod storage;

pub use schema::ensure_schema;
pub use storage::{SqliteBackend, SqliteSnapshot, SqliteUnitOfWork};
