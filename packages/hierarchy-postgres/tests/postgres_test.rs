use uuid::Uuid;

use hierarchy_core::{Error, HierarchyEngine};
use hierarchy_postgres::{reset_for_tests, PgBackend};
use hierarchy_test_support::{fresh_engine, rows};

/// Connect to the database named by `HIERARCHY_POSTGRES_URL` in a fresh schema.
///
/// Returns `None` (and the calling test passes vacuously) when the variable is unset.
fn connect() -> Option<PgBackend> {
    let url = std::env::var("HIERARCHY_POSTGRES_URL").ok()?;
    let schema = format!("hierarchy_test_{}", Uuid::new_v4().simple());
    let mut backend = PgBackend::connect(&url, &schema).ok()?;
    reset_for_tests(backend.client_mut()).unwrap();
    Some(backend)
}

hierarchy_test_support::backend_conformance_suite!(connect());

#[test]
fn postgres_schemas_isolate_hierarchies() {
    let (Some(a), Some(b)) = (connect(), connect()) else {
        return;
    };
    let mut a = fresh_engine(a);
    let mut b = fresh_engine(b);

    a.add_child("root", "only-in-a").unwrap();
    b.add_child("root", "only-in-b").unwrap();

    assert_eq!(a.list_descendants("root").unwrap(), vec!["only-in-a"]);
    assert_eq!(b.list_descendants("root").unwrap(), vec!["only-in-b"]);
}

#[test]
fn postgres_rejects_unsafe_schema_names() {
    let Ok(url) = std::env::var("HIERARCHY_POSTGRES_URL") else {
        return;
    };
    let err = PgBackend::connect(&url, "bad\"; DROP TABLE x; --").err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn postgres_reconnect_sees_committed_tree() {
    let Ok(url) = std::env::var("HIERARCHY_POSTGRES_URL") else {
        return;
    };
    let schema = format!("hierarchy_test_{}", Uuid::new_v4().simple());
    {
        let mut engine = fresh_engine(PgBackend::connect(&url, &schema).unwrap());
        engine.add_child("root", "A").unwrap();
        engine.add_child("A", "B").unwrap();
        engine.add_child("root", "D").unwrap();
        engine.move_subtree("B", "D").unwrap();
    }

    let mut engine = HierarchyEngine::new(PgBackend::connect(&url, &schema).unwrap());
    engine.ensure_root().unwrap();
    assert_eq!(engine.list_descendants("D").unwrap(), vec!["B"]);
    assert_eq!(rows(&engine).len(), 4);
    engine.validate().unwrap();
}
