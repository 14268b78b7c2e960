#![forbid(unsafe_code)]
//! Closure-table hierarchy engine.
//!
//! Every ancestor-descendant pair of a named tree is stored as a row with its distance, so
//! subtree queries are a single lookup. [`HierarchyEngine`] keeps those rows correct when
//! nodes are added, subtrees are deleted and subtrees are moved. Persistence goes through
//! [`Backend`]; this crate ships an in-memory one and the SQL backends live in sibling crates.

pub mod closure;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod memory;
pub mod traits;
pub mod validate;

pub use config::HierarchyConfig;
pub use engine::{HierarchyEngine, SharedHierarchy};
pub use error::{Error, Result};
pub use ids::{Depth, Node, NodeId, Relationship, Seq};
pub use memory::{MemoryBackend, MemorySnapshot, MemoryUnitOfWork};
pub use traits::{
    Backend, NodeLookup, NodeStore, RelationshipIndex, RelationshipLookup, UnitOfWork,
};
pub use validate::check_closure;
