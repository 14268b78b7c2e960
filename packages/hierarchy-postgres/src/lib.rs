#![forbid(unsafe_code)]
//! Postgres-backed persistence for `hierarchy-core`.
//!
//! Nodes and closure rows are stored in vanilla PostgreSQL tables inside a caller-chosen
//! schema, so several independent hierarchies can share one database.

mod schema;
mod store;

pub use schema::{ensure_schema, reset_for_tests};
pub use store::{PgBackend, PgSnapshot, PgUnitOfWork};
