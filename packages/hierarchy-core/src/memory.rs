use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::ids::{Depth, Node, NodeId, Relationship, Seq};
use crate::traits::{
    Backend, NodeLookup, NodeStore, RelationshipIndex, RelationshipLookup, UnitOfWork,
};

#[derive(Clone, Copy, Debug)]
struct RelationshipRow {
    ancestor: NodeId,
    descendant: NodeId,
    depth: Depth,
}

#[derive(Clone, Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    relationships: BTreeMap<Seq, RelationshipRow>,
    pairs: HashMap<(NodeId, NodeId), Seq>,
    last_node: i64,
    last_seq: Seq,
}

impl MemoryState {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| {
            Error::InconsistentState(format!("relationship references missing node {}", id.0))
        })
    }

    fn materialize(&self, seq: Seq, row: &RelationshipRow) -> Result<Relationship> {
        Ok(Relationship {
            seq,
            ancestor: self.node(row.ancestor)?.clone(),
            descendant: self.node(row.descendant)?.clone(),
            depth: row.depth,
        })
    }

    fn select(&self, pred: impl Fn(&RelationshipRow) -> bool) -> Result<Vec<Relationship>> {
        self.relationships
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(seq, row)| self.materialize(*seq, row))
            .collect()
    }

    fn remove_where(&mut self, pred: impl Fn(&RelationshipRow) -> bool) -> usize {
        let doomed: Vec<Seq> = self
            .relationships
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &doomed {
            if let Some(row) = self.relationships.remove(seq) {
                self.pairs.remove(&(row.ancestor, row.descendant));
            }
        }
        doomed.len()
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        Ok(self.names.get(name).and_then(|id| self.nodes.get(id)).cloned())
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        self.select(|row| row.ancestor == ancestor)
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        self.select(|row| row.descendant == descendant)
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        let mut direct = self.select(|row| row.descendant == descendant && row.depth == 1)?;
        if direct.len() > 1 {
            return Err(Error::InconsistentState(format!(
                "node {} has {} direct parents",
                descendant.0,
                direct.len()
            )));
        }
        Ok(direct.pop())
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        self.select(|_| true)
    }
}

/// In-memory backend for tests, benchmarks, and embedding.
///
/// A unit of work operates on a private copy of the state that replaces the committed
/// state only on commit. `begin` clones the whole state, so every write costs time linear
/// in the number of nodes and rows no matter how few rows it touches.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: MemoryState,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.relationships.len()
    }
}

impl Backend for MemoryBackend {
    type UnitOfWork<'a> = MemoryUnitOfWork<'a>;
    type Snapshot<'a> = MemorySnapshot<'a>;

    fn begin(&mut self) -> Result<MemoryUnitOfWork<'_>> {
        let working = self.state.clone();
        Ok(MemoryUnitOfWork {
            target: &mut self.state,
            working,
        })
    }

    fn snapshot(&self) -> Result<MemorySnapshot<'_>> {
        Ok(MemorySnapshot { state: &self.state })
    }
}

/// Read view over the committed state of a [`MemoryBackend`].
pub struct MemorySnapshot<'a> {
    state: &'a MemoryState,
}

impl NodeLookup for MemorySnapshot<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        self.state.find_by_name(name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        self.state.all_nodes()
    }
}

impl RelationshipLookup for MemorySnapshot<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        self.state.find_by_ancestor(ancestor)
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        self.state.find_by_descendant(descendant)
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        self.state.find_direct_parent(descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        self.state.all_relationships()
    }
}

/// Working copy of a [`MemoryBackend`]; discarded unless committed.
pub struct MemoryUnitOfWork<'a> {
    target: &'a mut MemoryState,
    working: MemoryState,
}

impl NodeLookup for MemoryUnitOfWork<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        self.working.find_by_name(name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        self.working.all_nodes()
    }
}

impl NodeStore for MemoryUnitOfWork<'_> {
    fn create(&mut self, name: &str) -> Result<Node> {
        let state = &mut self.working;
        if state.names.contains_key(name) {
            return Err(Error::already_exists(name));
        }
        state.last_node += 1;
        let node = Node::new(NodeId(state.last_node), name);
        state.names.insert(node.name.clone(), node.id);
        state.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        let state = &mut self.working;
        if state
            .relationships
            .values()
            .any(|row| row.ancestor == node.id || row.descendant == node.id)
        {
            return Err(Error::Storage(format!(
                "node '{}' is still referenced by relationships",
                node.name
            )));
        }
        if let Some(removed) = state.nodes.remove(&node.id) {
            state.names.remove(&removed.name);
        }
        Ok(())
    }
}

impl RelationshipLookup for MemoryUnitOfWork<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        self.working.find_by_ancestor(ancestor)
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        self.working.find_by_descendant(descendant)
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        self.working.find_direct_parent(descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        self.working.all_relationships()
    }
}

impl RelationshipIndex for MemoryUnitOfWork<'_> {
    fn insert(&mut self, ancestor: &Node, descendant: &Node, depth: Depth) -> Result<()> {
        let state = &mut self.working;
        if ancestor.id == descendant.id {
            return Err(Error::Storage(format!(
                "self relationship on '{}'",
                ancestor.name
            )));
        }
        if depth == 0 {
            return Err(Error::Storage("relationship depth must be at least 1".into()));
        }
        for endpoint in [ancestor, descendant] {
            if !state.nodes.contains_key(&endpoint.id) {
                return Err(Error::Storage(format!("unknown node '{}'", endpoint.name)));
            }
        }
        let key = (ancestor.id, descendant.id);
        if state.pairs.contains_key(&key) {
            return Err(Error::Storage(format!(
                "duplicate relationship ('{}', '{}')",
                ancestor.name, descendant.name
            )));
        }
        state.last_seq += 1;
        let seq = state.last_seq;
        state.relationships.insert(
            seq,
            RelationshipRow {
                ancestor: ancestor.id,
                descendant: descendant.id,
                depth,
            },
        );
        state.pairs.insert(key, seq);
        Ok(())
    }

    fn delete_by_ancestor(&mut self, ancestor: NodeId) -> Result<usize> {
        Ok(self.working.remove_where(|row| row.ancestor == ancestor))
    }

    fn delete_by_descendant(&mut self, descendant: NodeId) -> Result<usize> {
        Ok(self.working.remove_where(|row| row.descendant == descendant))
    }

    fn delete_by_ancestor_and_descendant(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<usize> {
        Ok(self
            .working
            .remove_where(|row| row.ancestor == ancestor && row.descendant == descendant))
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn commit(self) -> Result<()> {
        let MemoryUnitOfWork { target, working } = self;
        *target = working;
        Ok(())
    }
}
