use scopetree::{ManualAdapter, ScopeConfig, ScopeError, ScopeId, ScopeStore, Value};
use serde_json::json;

fn id(raw: u64) -> ScopeId {
    ScopeId(raw)
}

/// 1 ─┬─ 2 ─┬─ 4
///    │     └─ 5
///    └─ 3 ── 6
fn family() -> (ScopeStore<ManualAdapter>, ManualAdapter) {
    let adapter = ManualAdapter::new();
    let mut store = ScopeStore::new(ScopeConfig::new(), adapter.clone()).unwrap();
    for (child, parent) in [(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2)), (5, Some(2)), (6, Some(3))] {
        store.on_create(id(child), parent.map(id));
    }
    (store, adapter)
}

#[test]
fn test_value_is_inherited_by_all_descendants() {
    let (mut store, adapter) = family();
    adapter.enter(id(1));
    store.set("trace_id", "t-1");

    for scope in 1..=6 {
        adapter.enter(id(scope));
        assert_eq!(
            store.get::<String>("trace_id").unwrap().as_deref(),
            Some("t-1"),
            "scope {}",
            scope
        );
    }
}

#[test]
fn test_nearest_ancestor_wins() {
    let (mut store, _) = family();
    store.set_in(id(1), "level", 1_i64);
    store.set_in(id(2), "level", 2_i64);

    assert_eq!(store.get_in::<i64>(id(4), "level").unwrap(), Some(2));
    assert_eq!(store.get_in::<i64>(id(6), "level").unwrap(), Some(1));
    assert_eq!(store.get_in::<i64>(id(1), "level").unwrap(), Some(1));
}

#[test]
fn test_siblings_and_cousins_are_isolated() {
    let (mut store, _) = family();
    store.set_in(id(4), "secret", "only-4");
    store.set_in(id(2), "branch", "two");

    assert_eq!(store.get_value_in(id(5), "secret"), None);
    assert_eq!(store.get_value_in(id(2), "secret"), None);
    assert_eq!(store.get_value_in(id(6), "secret"), None);
    assert_eq!(store.get_value_in(id(3), "branch"), None);
    assert_eq!(store.get_value_in(id(6), "branch"), None);
}

#[test]
fn test_delete_propagates_upward_only() {
    let (mut store, adapter) = family();
    for scope in 1..=6 {
        store.set_in(id(scope), "k", scope as i64);
    }

    adapter.enter(id(4));
    assert_eq!(store.delete("k"), 3);

    assert_eq!(store.get_value_in(id(4), "k"), None);
    assert_eq!(store.get_value_in(id(2), "k"), None);
    assert_eq!(store.get_value_in(id(1), "k"), None);
    assert_eq!(store.get_in::<i64>(id(5), "k").unwrap(), Some(5));
    assert_eq!(store.get_in::<i64>(id(3), "k").unwrap(), Some(3));
    assert_eq!(store.get_in::<i64>(id(6), "k").unwrap(), Some(6));
}

#[test]
fn test_delete_reaches_past_gaps() {
    let (mut store, _) = family();
    store.set_in(id(1), "k", true);

    assert_eq!(store.delete_in(id(4), "k"), 1);
    assert_eq!(store.get_value_in(id(4), "k"), None);
}

#[test]
fn test_lineage_of_current_scope() {
    let (store, adapter) = family();
    adapter.enter(id(6));
    assert_eq!(store.lineage(), vec![id(6), id(3), id(1)]);

    adapter.enter(id(99));
    assert_eq!(store.lineage(), vec![id(99)]);
}

#[test]
fn test_typed_reads() {
    let (mut store, _) = family();
    store.set_in(id(1), "flag", true);
    store.set_in(id(1), "ratio", 0.5);
    store.set_in(id(1), "payload", json!({"items": [1, 2, 3]}));

    assert_eq!(store.get_in::<bool>(id(4), "flag").unwrap(), Some(true));
    assert_eq!(store.get_in::<f64>(id(4), "ratio").unwrap(), Some(0.5));
    assert_eq!(
        store.get_in::<serde_json::Value>(id(4), "payload").unwrap(),
        Some(json!({"items": [1, 2, 3]}))
    );
    assert_eq!(
        store.get_in::<Value>(id(4), "flag").unwrap(),
        Some(Value::Boolean(true))
    );

    match store.get_in::<i64>(id(4), "flag") {
        Err(ScopeError::TypeMismatch { key, expected, found }) => {
            assert_eq!(key, "flag");
            assert_eq!(expected, "INTEGER");
            assert_eq!(found, "BOOLEAN");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn test_write_from_unknown_scope_creates_root() {
    let (mut store, adapter) = family();
    adapter.enter(id(50));
    store.set("k", "v");

    assert_eq!(store.size().live_count, 7);
    assert!(store.tree().get(id(50)).unwrap().is_root());
    assert_eq!(store.get::<String>("k").unwrap().as_deref(), Some("v"));
    assert_eq!(store.get_value_in(id(1), "k"), None);
}
