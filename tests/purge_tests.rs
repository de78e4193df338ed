use scopetree::{Clock, ManualAdapter, ManualClock, ScopeConfig, ScopeId, ScopeStore, spawn_purge_worker};
use std::time::Duration;

fn id(raw: u64) -> ScopeId {
    ScopeId(raw)
}

fn store(ttl_secs: u64) -> (ScopeStore<ManualAdapter, ManualClock>, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    let config = ScopeConfig::new()
        .ttl(Duration::from_secs(ttl_secs))
        .purge_interval(Duration::from_secs(ttl_secs));
    let store = ScopeStore::with_clock(config, ManualAdapter::new(), clock.clone()).unwrap();
    (store, clock)
}

#[test]
fn test_no_stale_node_survives_a_sweep() {
    let (mut store, clock) = store(60);
    for raw in 1..=20u64 {
        let parent = (raw > 1).then(|| id((raw + 1) / 3));
        store.on_create(id(raw), parent);
        clock.advance(Duration::from_secs(5));
    }

    let ttl_ms = 60_000;
    let report = store.purge_now();
    let now = clock.now_ms();
    assert!(!report.removed.is_empty());

    for node in store.tree().iter() {
        let stale = now - node.touched_at_ms() > ttl_ms;
        if stale {
            assert!(node.child_count() > 0, "{} is stale and childless", node.id());
        }
    }
    store.check_invariants().unwrap();
}

#[test]
fn test_child_attach_keeps_parent_fresh() {
    let (mut store, clock) = store(10);
    store.on_create(id(1), None);
    clock.advance(Duration::from_secs(8));
    store.on_create(id(2), Some(id(1)));
    clock.advance(Duration::from_secs(8));

    let report = store.purge_now();
    assert!(report.removed.is_empty());
    assert!(store.tree().contains(id(1)));
}

#[test]
fn test_completed_parent_goes_with_its_last_stale_child() {
    let (mut store, clock) = store(10);
    store.on_create(id(1), None);
    store.on_create(id(2), Some(id(1)));
    store.on_complete(id(1));
    clock.advance(Duration::from_secs(11));

    let report = store.purge_now();
    assert_eq!(report.removed, vec![id(2), id(1)]);
    assert_eq!(store.size().live_count, 0);
    assert_eq!(store.stats().purged, 2);
}

#[test]
fn test_zero_ttl_never_purges() {
    let clock = ManualClock::new(0);
    let config = ScopeConfig::new().without_purge();
    let mut store = ScopeStore::with_clock(config, ManualAdapter::new(), clock.clone()).unwrap();

    store.on_create(id(1), None);
    clock.advance(Duration::from_secs(86_400));
    store.on_create(id(2), None);

    assert!(store.purge_now().removed.is_empty());
    assert_eq!(store.size().live_count, 2);
}

#[tokio::test]
async fn test_background_worker_sweeps_shared_store() {
    let (store, clock) = store(1);
    let shared = store.shared();
    shared.lock().unwrap().on_create(id(1), None);
    clock.advance(Duration::from_secs(5));

    let worker = spawn_purge_worker(shared.clone(), Duration::from_millis(10));
    for _ in 0..200 {
        if shared.lock().unwrap().size().live_count == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    worker.stop().await.unwrap();

    let guard = shared.lock().unwrap();
    assert_eq!(guard.size().live_count, 0);
    assert!(guard.stats().sweeps >= 1);
}
