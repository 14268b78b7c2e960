use std::sync::Arc;
use std::thread;

use hierarchy_core::{HierarchyEngine, MemoryBackend, SharedHierarchy};

#[test]
fn concurrent_writers_keep_closure_consistent() {
    let mut engine = HierarchyEngine::new(MemoryBackend::new());
    engine.ensure_root().unwrap();
    let shared = Arc::new(SharedHierarchy::new(engine));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let branch = format!("branch-{t}");
                shared.add_child("root", &branch).unwrap();
                let mut parent = branch.clone();
                for i in 0..10 {
                    let child = format!("{branch}-{i}");
                    shared.add_child(&parent, &child).unwrap();
                    parent = child;
                }
                shared.list_descendants(&branch).unwrap().len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
    shared.validate().unwrap();
    assert_eq!(shared.list_descendants("root").unwrap().len(), 44);
}

#[test]
fn readers_see_whole_moves_only() {
    let mut engine = HierarchyEngine::new(MemoryBackend::new());
    engine.ensure_root().unwrap();
    engine.add_child("root", "left").unwrap();
    engine.add_child("root", "right").unwrap();
    engine.add_child("left", "n0").unwrap();
    for i in 1..20 {
        engine.add_child(&format!("n{}", i - 1), &format!("n{i}")).unwrap();
    }
    let shared = Arc::new(SharedHierarchy::new(engine));

    let mover = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for i in 0..20 {
                let target = if i % 2 == 0 { "right" } else { "left" };
                shared.move_subtree("n0", target).unwrap();
            }
        })
    };
    let reader = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for _ in 0..50 {
                let left = shared.list_descendants("left").unwrap().len();
                let right = shared.list_descendants("right").unwrap().len();
                assert!(left == 0 || left == 20, "left saw {left}");
                assert!(right == 0 || right == 20, "right saw {right}");
            }
        })
    };

    mover.join().unwrap();
    reader.join().unwrap();
    assert_eq!(shared.list_descendants("left").unwrap().len(), 20);
    shared.validate().unwrap();
}

#[test]
fn memory_backed_handle_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}

    let mut engine = HierarchyEngine::new(MemoryBackend::new());
    engine.ensure_root().unwrap();
    let shared = SharedHierarchy::new(engine);
    assert_send_sync(&shared);
    assert_eq!(shared.into_inner().unwrap().backend().node_count(), 1);
}
