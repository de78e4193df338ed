use super::{LifecycleAdapter, LifecycleEvent};
use crate::clock::{Clock, SystemClock};
use crate::core::{Result, ScopeId};
use crate::facade::{ScopeStore, SharedScopeStore};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::warn;

tokio::task_local! {
    static CURRENT_SCOPE: ScopeId;
}

/// Reports the scope of the running Tokio task, or [`ScopeId::ROOT`] outside
/// any scope opened by [`TaskScopes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskAdapter;

impl TaskAdapter {
    pub fn current() -> ScopeId {
        CURRENT_SCOPE.try_with(|id| *id).unwrap_or(ScopeId::ROOT)
    }
}

impl LifecycleAdapter for TaskAdapter {
    fn current_scope_id(&self) -> ScopeId {
        Self::current()
    }
}

/// Opens scopes around futures and forwards their lifecycle to a shared store.
///
/// Each scope is created as a child of the scope it was opened from, so values
/// set by a caller are visible inside the futures it wraps or spawns.
pub struct TaskScopes<C: Clock = SystemClock> {
    store: SharedScopeStore<TaskAdapter, C>,
    next_id: Arc<AtomicU64>,
}

impl<C: Clock> Clone for TaskScopes<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<C: Clock + 'static> TaskScopes<C> {
    pub fn new(store: SharedScopeStore<TaskAdapter, C>) -> Self {
        Self {
            store,
            next_id: Arc::new(AtomicU64::new(ScopeId::ROOT.as_u64() + 1)),
        }
    }

    pub fn store(&self) -> &SharedScopeStore<TaskAdapter, C> {
        &self.store
    }

    /// Run `f` against the store while holding its lock.
    ///
    /// Dropping a future returned by [`TaskScopes::scope`] completes its scope,
    /// which takes the same lock. Do not drop scoped futures inside `f`: the
    /// lock is not reentrant and the thread would deadlock.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut ScopeStore<TaskAdapter, C>) -> R) -> Result<R> {
        let mut guard = self.store.lock()?;
        Ok(f(&mut guard))
    }

    /// Run `fut` inside a fresh child scope of the calling scope.
    ///
    /// The scope is completed when `fut` finishes, panics, or is dropped.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        let guard = self.open();
        let id = guard.id;
        let output = CURRENT_SCOPE.scope(id, fut).await;
        drop(guard);
        output
    }

    /// Spawn `fut` on a new Tokio task inside a fresh child scope.
    ///
    /// The scope is created before this returns, so creation order follows
    /// spawn order.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.open();
        tokio::spawn(async move {
            let id = guard.id;
            let output = CURRENT_SCOPE.scope(id, fut).await;
            drop(guard);
            output
        })
    }

    fn open(&self) -> CompleteOnDrop<C> {
        let parent = TaskAdapter::current();
        let id = ScopeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.emit(LifecycleEvent::Create {
            id,
            parent: Some(parent),
        });
        CompleteOnDrop {
            scopes: self.clone(),
            id,
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        match self.store.lock() {
            Ok(mut store) => store.apply(event),
            Err(err) => warn!(scope = %event.id(), error = %err, "scope store lock poisoned; event dropped"),
        }
    }
}

struct CompleteOnDrop<C: Clock + 'static> {
    scopes: TaskScopes<C>,
    id: ScopeId,
}

impl<C: Clock + 'static> Drop for CompleteOnDrop<C> {
    fn drop(&mut self) {
        self.scopes.emit(LifecycleEvent::Complete { id: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;

    fn scopes() -> TaskScopes {
        let store = ScopeStore::new(ScopeConfig::new(), TaskAdapter).unwrap();
        TaskScopes::new(store.shared())
    }

    #[tokio::test]
    async fn test_outside_any_scope_is_root() {
        assert_eq!(TaskAdapter::current(), ScopeId::ROOT);
    }

    #[tokio::test]
    async fn test_scope_sets_current_and_completes() {
        let scopes = scopes();
        let inner = scopes.scope(async { TaskAdapter::current() }).await;

        assert_ne!(inner, ScopeId::ROOT);
        assert_eq!(TaskAdapter::current(), ScopeId::ROOT);

        let live = scopes.with_store(|store| store.tree().contains(inner)).unwrap();
        assert!(!live);
    }

    #[test]
    fn test_scope_runs_without_a_runtime() {
        let scopes = scopes();
        let (inner, parent) = tokio_test::block_on(scopes.scope(async {
            let inner = TaskAdapter::current();
            (inner, scopes.with_store(|store| store.tree().get(inner).and_then(|n| n.parent())))
        }));

        assert_eq!(parent.unwrap(), Some(ScopeId::ROOT));
        assert!(!scopes.with_store(|store| store.tree().contains(inner)).unwrap());
    }

    #[test]
    fn test_dropped_scope_future_completes_after_lock_released() {
        let scopes = scopes();
        let pending = scopes.scope(std::future::pending::<()>());
        let mut pending = Box::pin(pending);
        assert!(tokio_test::task::spawn(pending.as_mut()).poll().is_pending());

        let live = scopes.with_store(|store| store.size().live_count).unwrap();
        assert_eq!(live, 2);

        drop(pending);
        let live = scopes.with_store(|store| store.size().live_count).unwrap();
        assert_eq!(live, 1);
    }

    #[tokio::test]
    async fn test_nested_scope_inherits() {
        let scopes = scopes();
        let inner = scopes.clone();

        let seen = scopes
            .scope(async move {
                inner.with_store(|store| store.set("user", "alice")).unwrap();
                inner
                    .scope(async {
                        inner
                            .with_store(|store| store.get::<String>("user"))
                            .unwrap()
                            .unwrap()
                    })
                    .await
            })
            .await;

        assert_eq!(seen.as_deref(), Some("alice"));
    }
}
