//! Closure-table maintenance shared by every engine operation.
//!
//! All functions run inside a caller-owned unit of work and never commit on their own.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::ids::Node;
use crate::traits::{NodeLookup, RelationshipIndex, RelationshipLookup, UnitOfWork};

pub fn require_node<S: NodeLookup + ?Sized>(store: &S, name: &str) -> Result<Node> {
    store.find_by_name(name)?.ok_or_else(|| {
        debug!(node = name, "node lookup failed");
        Error::not_found(name)
    })
}

/// Immediate children of `node`, in relationship insertion order.
pub fn children_of<S: RelationshipLookup + ?Sized>(index: &S, node: &Node) -> Result<Vec<Node>> {
    Ok(index
        .find_by_ancestor(node.id)?
        .into_iter()
        .filter(|rel| rel.is_direct())
        .map(|rel| rel.descendant)
        .collect())
}

/// Whether `ancestor` is a proper ancestor of `node`.
pub fn is_ancestor<S: RelationshipLookup + ?Sized>(
    index: &S,
    ancestor: &Node,
    node: &Node,
) -> Result<bool> {
    Ok(index
        .find_by_descendant(node.id)?
        .iter()
        .any(|rel| rel.ancestor.id == ancestor.id))
}

/// Give `child` the ancestor chain of `parent` plus `parent` itself.
///
/// `child` must currently have no incoming rows. Returns the number of rows inserted.
pub fn attach_to_parent<I: RelationshipIndex + ?Sized>(
    index: &mut I,
    child: &Node,
    parent: &Node,
) -> Result<usize> {
    index.insert(parent, child, 1)?;
    trace!(ancestor = %parent.name, descendant = %child.name, depth = 1, "inserted relationship");

    let inherited = index.find_by_descendant(parent.id)?;
    for rel in &inherited {
        let depth = rel.depth + 1;
        index.insert(&rel.ancestor, child, depth)?;
        trace!(ancestor = %rel.ancestor.name, descendant = %child.name, depth, "inserted relationship");
    }
    Ok(1 + inherited.len())
}

/// Recompute the ancestor chains of every proper descendant of `top`.
///
/// `top` must already carry its correct chain. Nodes are rebased in level order so each
/// node's direct parent is final before the node itself is rebased. Returns the number of
/// nodes rebased.
pub fn rebuild_subtree<U: UnitOfWork>(uow: &mut U, top: &Node) -> Result<usize> {
    let mut queue = VecDeque::from([top.clone()]);
    let mut rebased = 0;

    while let Some(current) = queue.pop_front() {
        debug!(node = %current.name, "rebasing children");
        // Immediate children only: the queue reaches every depth, one node at a time.
        for child in children_of(&*uow, &current)? {
            let parent = uow
                .find_direct_parent(child.id)?
                .ok_or_else(|| {
                    Error::InconsistentState(format!("node '{}' has no direct parent", child.name))
                })?
                .ancestor;
            uow.delete_by_descendant(child.id)?;
            attach_to_parent(uow, &child, &parent)?;
            queue.push_back(child);
            rebased += 1;
        }
    }
    Ok(rebased)
}

/// Delete `top`, every node below it, and every row touching any of them.
///
/// Returns the number of nodes removed.
pub fn remove_subtree<U: UnitOfWork>(uow: &mut U, top: &Node) -> Result<usize> {
    let mut pending = vec![top.clone()];
    let mut removed = 0;

    while let Some(current) = pending.pop() {
        debug!(node = %current.name, "removing node");
        pending.extend(children_of(&*uow, &current)?);

        uow.delete_by_ancestor(current.id)?;
        uow.delete_by_descendant(current.id)?;
        uow.delete(&current)?;
        removed += 1;
    }
    Ok(removed)
}
