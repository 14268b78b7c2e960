use crate::error::Result;
use crate::ids::{Depth, Node, NodeId, Relationship};

/// Read access to node records.
pub trait NodeLookup {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>>;
    /// Every node, ordered by id.
    fn all_nodes(&self) -> Result<Vec<Node>>;
}

/// Node records keyed by unique name.
pub trait NodeStore: NodeLookup {
    /// Create a node. Fails if the name is already present.
    fn create(&mut self, name: &str) -> Result<Node>;
    fn delete(&mut self, node: &Node) -> Result<()>;
}

/// Read access to the closure table.
pub trait RelationshipLookup {
    /// Rows where `ancestor` is the ancestor, oldest first.
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>>;
    /// Rows where `descendant` is the descendant, oldest first.
    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>>;
    /// The unique depth-1 row for `descendant`, if any.
    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>>;
    /// Every row, oldest first.
    fn all_relationships(&self) -> Result<Vec<Relationship>>;
}

/// Durable `(ancestor, descendant, depth)` rows. Rows are never updated in place.
pub trait RelationshipIndex: RelationshipLookup {
    fn insert(&mut self, ancestor: &Node, descendant: &Node, depth: Depth) -> Result<()>;
    fn delete_by_ancestor(&mut self, ancestor: NodeId) -> Result<usize>;
    fn delete_by_descendant(&mut self, descendant: NodeId) -> Result<usize>;
    fn delete_by_ancestor_and_descendant(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<usize>;
}

/// Atomic scope spanning both stores.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls back every write
/// made through it.
pub trait UnitOfWork: NodeStore + RelationshipIndex {
    fn commit(self) -> Result<()>;
}

/// A storage engine able to hand out units of work and read snapshots.
pub trait Backend {
    type UnitOfWork<'a>: UnitOfWork
    where
        Self: 'a;
    type Snapshot<'a>: NodeLookup + RelationshipLookup
    where
        Self: 'a;

    /// Start an exclusive read-write unit of work.
    fn begin(&mut self) -> Result<Self::UnitOfWork<'_>>;
    /// Open a consistent read-only view.
    fn snapshot(&self) -> Result<Self::Snapshot<'_>>;
}
