#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of parent edges between an ancestor and a descendant. 1 = immediate parent.
pub type Depth = u32;

/// Insertion sequence of a relationship row. Strictly increasing, never reused.
pub type Seq = i64;

/// Opaque stable identifier assigned by the node store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub i64);

/// A uniquely named node.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub name: String,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One closure-table row: `ancestor` sits `depth` levels above `descendant`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Relationship {
    pub seq: Seq,
    pub ancestor: Node,
    pub descendant: Node,
    pub depth: Depth,
}

impl Relationship {
    pub fn is_direct(&self) -> bool {
        self.depth == 1
    }
}
