use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use hierarchy_core::{Error, HierarchyEngine, MemoryBackend};

const NAMES: [&str; 7] = ["root", "a", "b", "c", "d", "e", "f"];

#[derive(Clone, Debug)]
enum Op {
    Add(usize, usize),
    Delete(usize, usize),
    Move(usize, usize),
}

/// Naive parent-pointer tree the closure table is checked against.
#[derive(Default)]
struct Model {
    nodes: BTreeSet<String>,
    parent: HashMap<String, String>,
}

impl Model {
    fn is_under(&self, node: &str, ancestor: &str) -> bool {
        let mut cursor = node;
        while let Some(up) = self.parent.get(cursor) {
            if up == ancestor {
                return true;
            }
            cursor = up.as_str();
        }
        false
    }

    fn descendants(&self, name: &str) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter(|n| self.is_under(n, name))
            .cloned()
            .collect()
    }

    fn require(&self, name: &str) -> Result<(), Error> {
        if self.nodes.contains(name) {
            Ok(())
        } else {
            Err(Error::not_found(name))
        }
    }

    fn apply(&mut self, op: &Op) -> Result<(), Error> {
        match *op {
            Op::Add(p, c) => {
                let (parent, child) = (NAMES[p], NAMES[c]);
                self.require(parent)?;
                if self.nodes.contains(child) {
                    return Err(Error::already_exists(child));
                }
                self.nodes.insert(child.to_string());
                self.parent.insert(child.to_string(), parent.to_string());
            }
            Op::Delete(p, c) => {
                let (parent, child) = (NAMES[p], NAMES[c]);
                self.require(parent)?;
                self.require(child)?;
                let mut doomed = self.descendants(child);
                doomed.insert(child.to_string());
                for name in doomed {
                    self.nodes.remove(&name);
                    self.parent.remove(&name);
                }
            }
            Op::Move(c, p) => {
                let (child, parent) = (NAMES[c], NAMES[p]);
                self.require(child)?;
                self.require(parent)?;
                match self.parent.get(child) {
                    None => return Err(Error::InvalidMove(String::new())),
                    Some(current) if current == parent => {
                        return Err(Error::AlreadyPositioned {
                            node: child.into(),
                            parent: parent.into(),
                        })
                    }
                    Some(_) => {}
                }
                if child == parent || self.is_under(parent, child) {
                    return Err(Error::InvalidMove(String::new()));
                }
                self.parent.insert(child.to_string(), parent.to_string());
            }
        }
        Ok(())
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let idx = 0..NAMES.len();
    prop_oneof![
        4 => (idx.clone(), 1..NAMES.len()).prop_map(|(p, c)| Op::Add(p, c)),
        1 => (idx.clone(), 1..NAMES.len()).prop_map(|(p, c)| Op::Delete(p, c)),
        3 => (idx.clone(), idx).prop_map(|(c, p)| Op::Move(c, p)),
    ]
}

proptest! {
    #[test]
    fn closure_matches_parent_pointer_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut engine = HierarchyEngine::new(MemoryBackend::new());
        engine.ensure_root().unwrap();
        let mut model = Model::default();
        model.nodes.insert("root".to_string());

        for op in &ops {
            let expected = model.apply(op);
            let actual = match *op {
                Op::Add(p, c) => engine.add_child(NAMES[p], NAMES[c]).map(|_| ()),
                Op::Delete(p, c) => engine.delete_subtree(NAMES[p], NAMES[c]),
                Op::Move(c, p) => engine.move_subtree(NAMES[c], NAMES[p]),
            };
            match (&expected, &actual) {
                (Ok(()), Ok(())) => {}
                (Err(e), Err(a)) => {
                    prop_assert_eq!(
                        std::mem::discriminant(e),
                        std::mem::discriminant(a),
                        "{:?}: expected {:?}, got {:?}", op, e, a
                    );
                }
                _ => {
                    prop_assert!(false, "{:?}: expected {:?}, got {:?}", op, expected, actual);
                }
            }
            engine.validate().unwrap();
        }

        for name in &model.nodes {
            let listed: BTreeSet<String> = engine.list_descendants(name).unwrap().into_iter().collect();
            prop_assert_eq!(listed, model.descendants(name));
        }
    }
}
