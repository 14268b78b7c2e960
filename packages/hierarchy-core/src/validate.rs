use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ids::{Depth, NodeId};
use crate::traits::{NodeLookup, RelationshipLookup};

fn inconsistent(msg: String) -> Error {
    Error::InconsistentState(msg)
}

/// Check that the stored rows are exactly the transitive closure of the depth-1 edges.
///
/// Verifies: no self rows, no duplicate pairs, at most one direct parent per node, a single
/// root, no cycles, and that every `(ancestor, descendant)` pair appears with its true
/// distance and nothing else appears. Intended for tests and debugging.
pub fn check_closure<S: NodeLookup + RelationshipLookup + ?Sized>(store: &S) -> Result<()> {
    let nodes = store.all_nodes()?;
    let rows = store.all_relationships()?;
    let known: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();

    let mut stored: HashMap<(NodeId, NodeId), Depth> = HashMap::new();
    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
    for rel in &rows {
        let (a, d) = (rel.ancestor.id, rel.descendant.id);
        if a == d {
            return Err(inconsistent(format!("self relationship on '{}'", rel.ancestor.name)));
        }
        if rel.depth == 0 {
            return Err(inconsistent(format!(
                "zero-depth row ('{}', '{}')",
                rel.ancestor.name, rel.descendant.name
            )));
        }
        if !known.contains(&a) || !known.contains(&d) {
            return Err(inconsistent(format!("row {} references a missing node", rel.seq)));
        }
        if stored.insert((a, d), rel.depth).is_some() {
            return Err(inconsistent(format!(
                "duplicate row ('{}', '{}')",
                rel.ancestor.name, rel.descendant.name
            )));
        }
        if rel.is_direct() && parent.insert(d, a).is_some() {
            return Err(inconsistent(format!(
                "'{}' has more than one direct parent",
                rel.descendant.name
            )));
        }
    }

    let roots = nodes.iter().filter(|n| !parent.contains_key(&n.id)).count();
    if !nodes.is_empty() && roots != 1 {
        return Err(inconsistent(format!("expected a single root, found {roots}")));
    }

    let mut expected = 0usize;
    for node in &nodes {
        let mut seen = HashSet::from([node.id]);
        let mut depth: Depth = 0;
        let mut cursor = node.id;
        while let Some(&up) = parent.get(&cursor) {
            if !seen.insert(up) {
                return Err(inconsistent(format!("cycle above '{}'", node.name)));
            }
            depth += 1;
            match stored.get(&(up, node.id)) {
                Some(&d) if d == depth => {}
                Some(&d) => {
                    return Err(inconsistent(format!(
                        "'{}' stored at depth {d}, expected {depth}",
                        node.name
                    )))
                }
                None => {
                    return Err(inconsistent(format!(
                        "missing ancestor row for '{}' at depth {depth}",
                        node.name
                    )))
                }
            }
            expected += 1;
            cursor = up;
        }
    }

    if expected != stored.len() {
        return Err(inconsistent(format!(
            "{} rows stored but the closure has {expected}",
            stored.len()
        )));
    }
    Ok(())
}
