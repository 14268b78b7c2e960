use std::path::Path;
use std::thread;
use std::time::Duration;

use hierarchy_core::{Backend, Error, HierarchyEngine, RelationshipIndex, RelationshipLookup, UnitOfWork};
use hierarchy_sqlite::SqliteBackend;
use hierarchy_test_support::{fresh_engine, row, rows};

#[test]
fn closure_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hierarchy.db");

    {
        let mut engine = fresh_engine(SqliteBackend::open(&path).unwrap());
        engine.add_child("root", "A").unwrap();
        engine.add_child("A", "B").unwrap();
        engine.add_child("root", "D").unwrap();
        engine.move_subtree("B", "D").unwrap();
    }

    let mut engine = HierarchyEngine::new(SqliteBackend::open(&path).unwrap());
    engine.ensure_root().unwrap();
    assert_eq!(engine.list_descendants("root").unwrap(), vec!["A", "D", "B"]);
    assert_eq!(
        rows(&engine),
        vec![row("D", "B", 1), row("root", "A", 1), row("root", "B", 2), row("root", "D", 1)]
    );
    engine.validate().unwrap();
}

#[test]
fn uncommitted_unit_of_work_is_rolled_back_on_drop() {
    let mut engine = fresh_engine(SqliteBackend::open_in_memory().unwrap());
    engine.add_child("root", "A").unwrap();
    let before = rows(&engine);

    let mut backend = engine.into_backend();
    {
        let mut uow = backend.begin().unwrap();
        let a = hierarchy_core::closure::require_node(&uow, "A").unwrap();
        uow.delete_by_descendant(a.id).unwrap();
        assert!(uow.find_direct_parent(a.id).unwrap().is_none());
    }
    let engine = HierarchyEngine::new(backend);
    assert_eq!(rows(&engine), before);
}

#[test]
fn schema_rejects_duplicate_and_self_rows() {
    let mut backend = SqliteBackend::open_in_memory().unwrap();
    let mut uow = backend.begin().unwrap();
    let a = hierarchy_core::NodeStore::create(&mut uow, "a").unwrap();
    let b = hierarchy_core::NodeStore::create(&mut uow, "b").unwrap();
    uow.insert(&a, &b, 1).unwrap();

    assert!(matches!(uow.insert(&a, &b, 2), Err(Error::Storage(_))));
    assert!(matches!(uow.insert(&a, &a, 1), Err(Error::Storage(_))));
    assert!(matches!(uow.insert(&b, &a, 0), Err(Error::Storage(_))));
    assert!(matches!(
        hierarchy_core::NodeStore::create(&mut uow, "a"),
        Err(Error::AlreadyExists { .. })
    ));
    uow.commit().unwrap();
}

#[test]
fn second_connection_sees_only_committed_moves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let mut writer = fresh_engine(SqliteBackend::open(&path).unwrap());
    writer.add_child("root", "left").unwrap();
    writer.add_child("root", "right").unwrap();
    writer.add_child("left", "x").unwrap();
    writer.add_child("x", "y").unwrap();

    let reader = HierarchyEngine::new(SqliteBackend::open(&path).unwrap());
    assert_eq!(reader.list_descendants("left").unwrap(), vec!["x", "y"]);

    writer.move_subtree("x", "right").unwrap();
    assert!(reader.list_descendants("left").unwrap().is_empty());
    assert_eq!(reader.list_descendants("right").unwrap(), vec!["x", "y"]);
    reader.validate().unwrap();
}

fn open_shared(path: &Path) -> HierarchyEngine<SqliteBackend> {
    let backend = SqliteBackend::open(path).unwrap();
    backend.connection().busy_timeout(Duration::from_secs(30)).unwrap();
    HierarchyEngine::new(backend)
}

#[test]
fn connections_on_one_file_serialize_writers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");

    let mut setup = fresh_engine(SqliteBackend::open(&path).unwrap());
    setup.add_child("root", "left").unwrap();
    setup.add_child("root", "right").unwrap();
    let mut parent = "left".to_string();
    for i in 0..15 {
        let child = format!("c{i}");
        setup.add_child(&parent, &child).unwrap();
        parent = child;
    }
    drop(setup);

    let movers = (0..2).map(|_| {
        let path = path.clone();
        thread::spawn(move || {
            let mut engine = open_shared(&path);
            for i in 0..20 {
                let target = if i % 2 == 0 { "right" } else { "left" };
                match engine.move_subtree("c0", target) {
                    Ok(()) => {}
                    Err(e) if e.is_already_exists() => {}
                    Err(e) => panic!("move to {target} failed: {e}"),
                }
            }
        })
    });
    let adders = (0..2).map(|t| {
        let path = path.clone();
        thread::spawn(move || {
            let mut engine = open_shared(&path);
            let branch = format!("inbox-{t}");
            engine.add_child("root", &branch).unwrap();
            let mut parent = branch;
            for i in 0..20 {
                let child = format!("inbox-{t}-{i}");
                engine.add_child(&parent, &child).unwrap();
                parent = child;
            }
        })
    });
    let reader = {
        let path = path.clone();
        thread::spawn(move || {
            let engine = open_shared(&path);
            for _ in 0..40 {
                let seen = engine.list_descendants("left").unwrap().len();
                assert!(seen == 0 || seen == 15, "saw {seen} nodes under left");
            }
        })
    };

    let handles: Vec<_> = movers.chain(adders).chain(std::iter::once(reader)).collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let engine = open_shared(&path);
    engine.validate().unwrap();
    let left = engine.list_descendants("left").unwrap().len();
    let right = engine.list_descendants("right").unwrap().len();
    assert_eq!(left + right, 15);
    assert_eq!(engine.list_descendants("inbox-0").unwrap().len(), 20);
    assert_eq!(engine.list_descendants("inbox-1").unwrap().len(), 20);
    assert_eq!(engine.list_descendants("root").unwrap().len(), 2 + 15 + 2 * 21);
}
