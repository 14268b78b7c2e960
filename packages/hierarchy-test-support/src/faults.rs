use hierarchy_core::{
    Backend, Depth, Error, Node, NodeId, NodeLookup, NodeStore, Relationship, RelationshipIndex,
    RelationshipLookup, Result, UnitOfWork,
};

/// Wraps a backend and fails the n-th relationship insert of every unit of work.
pub struct FlakyBackend<B> {
    inner: B,
    fail_on_insert: Option<usize>,
}

impl<B: Backend> FlakyBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_on_insert: None,
        }
    }

    /// Make the `n`-th insert (1-based) of each subsequent unit of work fail.
    pub fn fail_on_insert(&mut self, n: usize) {
        self.fail_on_insert = Some(n);
    }

    pub fn heal(&mut self) {
        self.fail_on_insert = None;
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: Backend> Backend for FlakyBackend<B> {
    type UnitOfWork<'a>
        = FlakyUnitOfWork<B::UnitOfWork<'a>>
    where
        Self: 'a;
    type Snapshot<'a>
        = B::Snapshot<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::UnitOfWork<'_>> {
        Ok(FlakyUnitOfWork {
            inner: self.inner.begin()?,
            inserts: 0,
            fail_on_insert: self.fail_on_insert,
        })
    }

    fn snapshot(&self) -> Result<Self::Snapshot<'_>> {
        self.inner.snapshot()
    }
}

pub struct FlakyUnitOfWork<U> {
    inner: U,
    inserts: usize,
    fail_on_insert: Option<usize>,
}

impl<U: UnitOfWork> NodeLookup for FlakyUnitOfWork<U> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        self.inner.find_by_name(name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        self.inner.all_nodes()
    }
}

impl<U: UnitOfWork> NodeStore for FlakyUnitOfWork<U> {
    fn create(&mut self, name: &str) -> Result<Node> {
        self.inner.create(name)
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        self.inner.delete(node)
    }
}

impl<U: UnitOfWork> RelationshipLookup for FlakyUnitOfWork<U> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        self.inner.find_by_ancestor(ancestor)
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        self.inner.find_by_descendant(descendant)
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        self.inner.find_direct_parent(descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        self.inner.all_relationships()
    }
}

impl<U: UnitOfWork> RelationshipIndex for FlakyUnitOfWork<U> {
    fn insert(&mut self, ancestor: &Node, descendant: &Node, depth: Depth) -> Result<()> {
        self.inserts += 1;
        if self.fail_on_insert == Some(self.inserts) {
            return Err(Error::Storage(format!("injected failure on insert #{}", self.inserts)));
        }
        self.inner.insert(ancestor, descendant, depth)
    }

    fn delete_by_ancestor(&mut self, ancestor: NodeId) -> Result<usize> {
        self.inner.delete_by_ancestor(ancestor)
    }

    fn delete_by_descendant(&mut self, descendant: NodeId) -> Result<usize> {
        self.inner.delete_by_descendant(descendant)
    }

    fn delete_by_ancestor_and_descendant(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<usize> {
        self.inner.delete_by_ancestor_and_descendant(ancestor, descendant)
    }
}

impl<U: UnitOfWork> UnitOfWork for FlakyUnitOfWork<U> {
    fn commit(self) -> Result<()> {
        self.inner.commit()
    }
}
