use crate::adapter::{LifecycleAdapter, LifecycleEvent};
use crate::clock::{Clock, SystemClock};
use crate::config::ScopeConfig;
use crate::core::{FromValue, Result, ScopeError, ScopeId, ScopeStats, SizeProfile, Value};
use crate::lineage::{self, LineageResolver};
use crate::purge::{PurgeReport, PurgeSweeper};
use crate::tree::{DestroyOutcome, Eviction, InsertOutcome, ScopeTree};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A store handle that lifecycle hooks and callers on other tasks can share.
pub type SharedScopeStore<A, C = SystemClock> = Arc<Mutex<ScopeStore<A, C>>>;

/// Hierarchical per-scope key/value store.
///
/// Reads and writes without an explicit scope run in the adapter's current
/// scope. Lifecycle events arrive through [`ScopeStore::on_create`] and
/// [`ScopeStore::on_complete`] (or [`ScopeStore::apply`]) in the order the
/// runtime produced them.
///
/// # Examples
///
/// ```
/// use scopetree::{ManualAdapter, ScopeConfig, ScopeId, ScopeStore};
///
/// # fn main() -> scopetree::Result<()> {
/// let adapter = ManualAdapter::new();
/// let mut store = ScopeStore::new(ScopeConfig::default(), adapter.clone())?;
///
/// store.on_create(ScopeId(1), None);
/// store.on_create(ScopeId(2), Some(ScopeId(1)));
///
/// adapter.enter(ScopeId(1));
/// store.set("request_id", "abc-123");
///
/// adapter.enter(ScopeId(2));
/// assert_eq!(store.get::<String>("request_id")?.as_deref(), Some("abc-123"));
/// assert_eq!(store.lineage(), vec![ScopeId(2), ScopeId(1)]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScopeStore<A: LifecycleAdapter, C: Clock = SystemClock> {
    config: ScopeConfig,
    tree: ScopeTree,
    sweeper: PurgeSweeper,
    adapter: A,
    clock: C,
    stats: ScopeStats,
}

impl<A: LifecycleAdapter> ScopeStore<A, SystemClock> {
    pub fn new(config: ScopeConfig, adapter: A) -> Result<Self> {
        Self::with_clock(config, adapter, SystemClock)
    }
}

impl<A: LifecycleAdapter, C: Clock> ScopeStore<A, C> {
    pub fn with_clock(config: ScopeConfig, adapter: A, clock: C) -> Result<Self> {
        config.validate()?;
        let now_ms = clock.now_ms();

        Ok(Self {
            tree: ScopeTree::with_capacity(config.capacity),
            sweeper: PurgeSweeper::from_config(&config, now_ms),
            config,
            adapter,
            clock,
            stats: ScopeStats::default(),
        })
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Read-only view of the underlying tree.
    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn current_scope_id(&self) -> ScopeId {
        self.adapter.current_scope_id()
    }

    // ------------------------------------------------------------------
    // Reads and writes
    // ------------------------------------------------------------------

    /// Typed lookup in the calling scope's lineage.
    ///
    /// Absent keys and stored `Null` give `Ok(None)`; a stored value of a
    /// different type gives [`ScopeError::TypeMismatch`].
    pub fn get<T: FromValue>(&mut self, key: &str) -> Result<Option<T>> {
        let scope = self.current_scope_id();
        self.get_in(scope, key)
    }

    pub fn get_in<T: FromValue>(&mut self, scope: ScopeId, key: &str) -> Result<Option<T>> {
        match self.get_value_in(scope, key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(key, &value).map(Some),
        }
    }

    /// Untyped lookup; never fails.
    pub fn get_value(&mut self, key: &str) -> Option<Value> {
        let scope = self.current_scope_id();
        self.get_value_in(scope, key)
    }

    pub fn get_value_in(&mut self, scope: ScopeId, key: &str) -> Option<Value> {
        let now_ms = self.prepare_scope(scope);
        LineageResolver::new(&mut self.tree, now_ms).get(key, scope).cloned()
    }

    /// Write into the calling scope's own mapping.
    pub fn set<V: Into<Value>>(&mut self, key: impl Into<String>, value: V) {
        let scope = self.current_scope_id();
        self.set_in(scope, key, value);
    }

    pub fn set_in<V: Into<Value>>(&mut self, scope: ScopeId, key: impl Into<String>, value: V) {
        let now_ms = self.prepare_scope(scope);
        LineageResolver::new(&mut self.tree, now_ms).set(key, value.into(), scope);
    }

    /// Forget `key` in the calling scope and in all of its ancestors. Returns
    /// how many scopes held it.
    pub fn delete(&mut self, key: &str) -> usize {
        let scope = self.current_scope_id();
        self.delete_in(scope, key)
    }

    pub fn delete_in(&mut self, scope: ScopeId, key: &str) -> usize {
        let now_ms = self.clock.now_ms();
        LineageResolver::new(&mut self.tree, now_ms).delete(key, scope)
    }

    /// The calling scope followed by its ancestors up to a root.
    pub fn lineage(&self) -> Vec<ScopeId> {
        self.lineage_of(self.current_scope_id())
    }

    pub fn lineage_of(&self, scope: ScopeId) -> Vec<ScopeId> {
        lineage::lineage(&self.tree, scope)
    }

    pub fn size(&self) -> SizeProfile {
        SizeProfile {
            live_count: self.tree.len(),
            capacity: self.tree.capacity(),
        }
    }

    pub fn stats(&self) -> ScopeStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// A new scope started under `parent`. Repeated ids are ignored.
    pub fn on_create(&mut self, id: ScopeId, parent: Option<ScopeId>) {
        let now_ms = self.clock.now_ms();
        if let InsertOutcome::Created { evicted } = self.tree.insert(id, parent, now_ms) {
            self.stats.created += 1;
            self.record_evictions(&evicted);
        }
        self.maybe_purge(now_ms);
    }

    /// The scope's unit of work finished.
    pub fn on_complete(&mut self, id: ScopeId) {
        let now_ms = self.clock.now_ms();
        if let DestroyOutcome::Removed(removed) = self.tree.destroy(id) {
            self.stats.destroyed += removed.len() as u64;
        }
        self.maybe_purge(now_ms);
    }

    pub fn apply(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Create { id, parent } => self.on_create(id, parent),
            LifecycleEvent::Complete { id } => self.on_complete(id),
        }
    }

    /// Sweep now regardless of the purge interval. A no-op sweep when TTL is
    /// disabled.
    pub fn purge_now(&mut self) -> PurgeReport {
        let now_ms = self.clock.now_ms();
        let report = self.sweeper.sweep(&mut self.tree, now_ms);
        self.record_sweep(&report);
        report
    }

    pub fn check_invariants(&self) -> Result<()> {
        self.tree.check_invariants()
    }

    pub fn shared(self) -> SharedScopeStore<A, C> {
        Arc::new(Mutex::new(self))
    }

    /// Materialise an unknown `scope` as an implicit root, accounting for any
    /// eviction that needed. Returns the timestamp used.
    fn prepare_scope(&mut self, scope: ScopeId) -> i64 {
        let now_ms = self.clock.now_ms();
        if let InsertOutcome::Created { evicted } = self.tree.ensure_root(scope, now_ms) {
            self.record_evictions(&evicted);
        }
        now_ms
    }

    fn maybe_purge(&mut self, now_ms: i64) {
        if let Some(report) = self.sweeper.maybe_sweep(&mut self.tree, now_ms) {
            self.record_sweep(&report);
        }
    }

    fn record_evictions(&mut self, evicted: &[Eviction]) {
        for eviction in evicted {
            self.stats.evicted += 1;
            self.stats.orphaned += eviction.orphaned.len() as u64;
            self.stats.destroyed += eviction.reclaimed.len() as u64;
        }
    }

    fn record_sweep(&mut self, report: &PurgeReport) {
        self.stats.sweeps += 1;
        self.stats.purged += report.removed.len() as u64;
        if !report.removed.is_empty() {
            debug!(purged = report.removed.len(), live = self.tree.len(), "stale scopes purged");
        }
    }
}

/// Lock a shared store, mapping poisoning to [`ScopeError::LockError`].
pub fn lock_store<A: LifecycleAdapter, C: Clock>(
    store: &SharedScopeStore<A, C>,
) -> Result<std::sync::MutexGuard<'_, ScopeStore<A, C>>> {
    store.lock().map_err(ScopeError::from)
}
