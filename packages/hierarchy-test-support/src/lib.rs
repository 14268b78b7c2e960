//! Backend conformance suite shared by every storage implementation.
//!
//! Each case takes a freshly created, empty backend and panics on failure. Backend crates
//! instantiate the whole suite with [`backend_conformance_suite!`].

mod faults;

pub use faults::{FlakyBackend, FlakyUnitOfWork};

use hierarchy_core::{
    Backend, Depth, Error, HierarchyEngine, NodeLookup, RelationshipLookup,
};

pub type Row = (String, String, Depth);

pub fn fresh_engine<B: Backend>(backend: B) -> HierarchyEngine<B> {
    let mut engine = HierarchyEngine::new(backend);
    engine.ensure_root().unwrap();
    engine
}

/// All closure rows as `(ancestor, descendant, depth)`, sorted for set comparison.
pub fn rows<B: Backend>(engine: &HierarchyEngine<B>) -> Vec<Row> {
    let snapshot = engine.backend().snapshot().unwrap();
    let mut rows: Vec<Row> = snapshot
        .all_relationships()
        .unwrap()
        .into_iter()
        .map(|r| (r.ancestor.name, r.descendant.name, r.depth))
        .collect();
    rows.sort();
    rows
}

pub fn row(ancestor: &str, descendant: &str, depth: Depth) -> Row {
    (ancestor.to_string(), descendant.to_string(), depth)
}

/// Sorted `(ancestor, depth)` chain of `name`.
pub fn ancestors<B: Backend>(engine: &HierarchyEngine<B>, name: &str) -> Vec<(String, Depth)> {
    let snapshot = engine.backend().snapshot().unwrap();
    let node = snapshot.find_by_name(name).unwrap().unwrap();
    let mut chain: Vec<(String, Depth)> = snapshot
        .find_by_descendant(node.id)
        .unwrap()
        .into_iter()
        .map(|r| (r.ancestor.name, r.depth))
        .collect();
    chain.sort_by_key(|(_, depth)| *depth);
    chain
}

pub fn node_names<B: Backend>(engine: &HierarchyEngine<B>) -> Vec<String> {
    let snapshot = engine.backend().snapshot().unwrap();
    let mut names: Vec<String> = snapshot
        .all_nodes()
        .unwrap()
        .into_iter()
        .map(|n| n.name)
        .collect();
    names.sort();
    names
}

fn build<B: Backend>(engine: &mut HierarchyEngine<B>, edges: &[(&str, &str)]) {
    for (parent, child) in edges {
        engine.add_child(parent, child).unwrap();
    }
}

pub fn add_child_builds_full_ancestor_chain<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C")]);

    assert_eq!(
        rows(&engine),
        vec![
            row("A", "B", 1),
            row("A", "C", 2),
            row("B", "C", 1),
            row("root", "A", 1),
            row("root", "B", 2),
            row("root", "C", 3),
        ]
    );
    assert_eq!(
        ancestors(&engine, "C"),
        vec![("B".to_string(), 1), ("A".to_string(), 2), ("root".to_string(), 3)]
    );
    engine.validate().unwrap();
}

pub fn add_child_returns_created_node<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    let node = engine.add_child("root", "A").unwrap();
    assert_eq!(node.name, "A");
    assert_eq!(engine.find_node("A").unwrap(), node);
}

pub fn add_child_requires_existing_parent<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    let err = engine.add_child("ghost", "A").unwrap_err();
    assert_eq!(err, Error::not_found("ghost"));
    assert_eq!(node_names(&engine), vec!["root".to_string()]);
}

pub fn add_child_rejects_taken_name<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("root", "D"), ("A", "B")]);
    let before = rows(&engine);

    let err = engine.add_child("D", "B").unwrap_err();
    assert_eq!(err, Error::already_exists("B"));
    assert!(err.is_already_exists());
    let err = engine.add_child("B", "root").unwrap_err();
    assert_eq!(err, Error::already_exists("root"));

    assert_eq!(rows(&engine), before);
    engine.validate().unwrap();
}

pub fn list_descendants_in_insertion_order<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C")]);

    assert_eq!(engine.list_descendants("root").unwrap(), vec!["A", "B", "C"]);
    assert_eq!(engine.list_descendants("A").unwrap(), vec!["B", "C"]);
    assert!(engine.list_descendants("C").unwrap().is_empty());
    assert!(engine.list_descendants("ghost").unwrap_err().is_not_found());
}

pub fn delete_subtree_removes_all_descendants<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C")]);

    engine.delete_subtree("A", "B").unwrap();

    assert_eq!(engine.list_descendants("root").unwrap(), vec!["A"]);
    assert_eq!(rows(&engine), vec![row("root", "A", 1)]);
    assert_eq!(node_names(&engine), vec!["A".to_string(), "root".to_string()]);
    assert!(engine.find_node("B").unwrap_err().is_not_found());
    assert!(engine.find_node("C").unwrap_err().is_not_found());
    engine.validate().unwrap();
}

pub fn delete_subtree_leaves_siblings_untouched<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(
        &mut engine,
        &[
            ("root", "A"),
            ("root", "D"),
            ("A", "B"),
            ("A", "E"),
            ("B", "C"),
            ("B", "F"),
            ("D", "G"),
        ],
    );

    engine.delete_subtree("root", "A").unwrap();

    assert_eq!(engine.list_descendants("root").unwrap(), vec!["D", "G"]);
    assert_eq!(
        rows(&engine),
        vec![row("D", "G", 1), row("root", "D", 1), row("root", "G", 2)]
    );
    assert_eq!(
        node_names(&engine),
        vec!["D".to_string(), "G".to_string(), "root".to_string()]
    );
    engine.validate().unwrap();

    // the freed names can be reused
    engine.add_child("G", "A").unwrap();
    assert_eq!(ancestors(&engine, "A").len(), 3);
    engine.validate().unwrap();
}

pub fn delete_subtree_requires_both_nodes<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A")]);
    let before = rows(&engine);

    assert_eq!(engine.delete_subtree("root", "ghost").unwrap_err(), Error::not_found("ghost"));
    assert_eq!(engine.delete_subtree("ghost", "A").unwrap_err(), Error::not_found("ghost"));
    assert_eq!(rows(&engine), before);
}

pub fn delete_subtree_tolerates_indirect_pair<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("root", "D")]);

    // D is not B's parent; the subtree is still removed
    engine.delete_subtree("D", "B").unwrap();

    assert_eq!(engine.list_descendants("root").unwrap(), vec!["A", "D"]);
    assert!(engine.list_descendants("A").unwrap().is_empty());
    engine.validate().unwrap();
}

pub fn move_subtree_rebases_leaf<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("root", "D"), ("A", "B")]);

    engine.move_subtree("B", "D").unwrap();

    assert_eq!(engine.list_descendants("D").unwrap(), vec!["B"]);
    assert!(engine.list_descendants("A").unwrap().is_empty());
    assert_eq!(
        ancestors(&engine, "B"),
        vec![("D".to_string(), 1), ("root".to_string(), 2)]
    );
    engine.validate().unwrap();
}

pub fn move_subtree_rebases_every_descendant<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(
        &mut engine,
        &[
            ("root", "A"),
            ("A", "B"),
            ("B", "C"),
            ("B", "E"),
            ("C", "F"),
            ("root", "X"),
            ("X", "Y"),
            ("Y", "Z"),
        ],
    );

    engine.move_subtree("B", "Z").unwrap();

    // shape below B is unchanged
    assert_eq!(
        ancestors(&engine, "F"),
        vec![
            ("C".to_string(), 1),
            ("B".to_string(), 2),
            ("Z".to_string(), 3),
            ("Y".to_string(), 4),
            ("X".to_string(), 5),
            ("root".to_string(), 6),
        ]
    );
    assert_eq!(
        ancestors(&engine, "E"),
        vec![
            ("B".to_string(), 1),
            ("Z".to_string(), 2),
            ("Y".to_string(), 3),
            ("X".to_string(), 4),
            ("root".to_string(), 5),
        ]
    );
    assert!(engine.list_descendants("A").unwrap().is_empty());
    let mut under_z = engine.list_descendants("Z").unwrap();
    under_z.sort();
    assert_eq!(under_z, vec!["B", "C", "E", "F"]);
    engine.validate().unwrap();
}

pub fn move_subtree_up_the_tree<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C"), ("C", "D")]);

    engine.move_subtree("C", "root").unwrap();

    assert_eq!(
        ancestors(&engine, "D"),
        vec![("C".to_string(), 1), ("root".to_string(), 2)]
    );
    assert_eq!(engine.list_descendants("A").unwrap(), vec!["B"]);
    engine.validate().unwrap();
}

pub fn move_subtree_to_current_parent_fails_without_changes<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B")]);
    let before = rows(&engine);

    let err = engine.move_subtree("A", "root").unwrap_err();
    assert_eq!(
        err,
        Error::AlreadyPositioned {
            node: "A".into(),
            parent: "root".into()
        }
    );
    assert!(err.is_already_exists());
    assert_eq!(rows(&engine), before);
}

pub fn move_subtree_into_own_subtree_is_rejected<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C")]);
    let before = rows(&engine);

    assert!(matches!(engine.move_subtree("A", "C"), Err(Error::InvalidMove(_))));
    assert!(matches!(engine.move_subtree("A", "A"), Err(Error::InvalidMove(_))));
    assert_eq!(rows(&engine), before);
}

pub fn move_subtree_requires_both_nodes<B: Backend>(backend: B) {
    let mut engine = fresh_engine(backend);
    build(&mut engine, &[("root", "A")]);

    assert_eq!(engine.move_subtree("ghost", "A").unwrap_err(), Error::not_found("ghost"));
    assert_eq!(engine.move_subtree("A", "ghost").unwrap_err(), Error::not_found("ghost"));
}

/// A failure raised halfway through a multi-row write must leave no trace.
pub fn failed_operations_roll_back<B: Backend>(backend: B) {
    let mut engine = fresh_engine(FlakyBackend::new(backend));
    build(&mut engine, &[("root", "A"), ("A", "B"), ("B", "C"), ("root", "D")]);
    let before = rows(&engine);

    let mut backend = engine.into_backend();
    // the third insert of AddChild(C, X) is the (A, X, 3) row
    backend.fail_on_insert(3);
    let mut engine = HierarchyEngine::new(backend);

    assert!(matches!(engine.add_child("C", "X"), Err(Error::Storage(_))));
    assert!(engine.find_node("X").unwrap_err().is_not_found());
    assert!(matches!(engine.move_subtree("B", "D"), Err(Error::Storage(_))));
    assert_eq!(rows(&engine), before);
    engine.validate().unwrap();

    let mut backend = engine.into_backend();
    backend.heal();
    let mut engine = HierarchyEngine::new(backend);
    engine.move_subtree("B", "D").unwrap();
    assert_eq!(engine.list_descendants("D").unwrap(), vec!["B", "C"]);
    engine.validate().unwrap();
}

/// Instantiate every conformance case as a `#[test]`.
///
/// `$make` is an expression evaluating to `Option<B>`; `None` skips the case, which lets
/// environment-gated backends opt out when their server is unavailable.
#[macro_export]
macro_rules! backend_conformance_suite {
    (@cases $make:expr; $($case:ident),* $(,)?) => {
        $(
            #[test]
            fn $case() {
                let Some(backend) = $make else {
                    return;
                };
                $crate::$case(backend);
            }
        )*
    };
    ($make:expr) => {
        $crate::backend_conformance_suite!(@cases $make;
            add_child_builds_full_ancestor_chain,
            add_child_returns_created_node,
            add_child_requires_existing_parent,
            add_child_rejects_taken_name,
            list_descendants_in_insertion_order,
            delete_subtree_removes_all_descendants,
            delete_subtree_leaves_siblings_untouched,
            delete_subtree_requires_both_nodes,
            delete_subtree_tolerates_indirect_pair,
            move_subtree_rebases_leaf,
            move_subtree_rebases_every_descendant,
            move_subtree_up_the_tree,
            move_subtree_to_current_parent_fails_without_changes,
            move_subtree_into_own_subtree_is_rejected,
            move_subtree_requires_both_nodes,
            failed_operations_roll_back,
        );
    };
}
