// ============================================================================
// Lifecycle Adapter Boundary
// ============================================================================
//
// The store never decides when a scope starts or ends. An adapter reports the
// calling scope, and the host forwards create/complete events to the store in
// the order the runtime produced them.
//
// ============================================================================

pub mod task;

pub use task::{TaskAdapter, TaskScopes};

use crate::core::ScopeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resolves the scope on whose behalf a public read or write runs.
pub trait LifecycleAdapter: Send + Sync + fmt::Debug {
    fn current_scope_id(&self) -> ScopeId;
}

/// A lifecycle notification, as produced by a runtime hook or read back from
/// a recorded event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Create {
        id: ScopeId,
        #[serde(default)]
        parent: Option<ScopeId>,
    },
    Complete {
        id: ScopeId,
    },
}

impl LifecycleEvent {
    pub fn id(&self) -> ScopeId {
        match self {
            LifecycleEvent::Create { id, .. } | LifecycleEvent::Complete { id } => *id,
        }
    }
}

/// Adapter whose current scope is set by hand. Clones share the same cursor.
#[derive(Debug, Clone, Default)]
pub struct ManualAdapter {
    current: Arc<AtomicU64>,
}

impl ManualAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(id: ScopeId) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(id.as_u64())),
        }
    }

    /// Make `id` the calling scope for subsequent operations.
    pub fn enter(&self, id: ScopeId) {
        self.current.store(id.as_u64(), Ordering::SeqCst);
    }
}

impl LifecycleAdapter for ManualAdapter {
    fn current_scope_id(&self) -> ScopeId {
        ScopeId(self.current.load(Ordering::SeqCst))
    }
}

impl<T: LifecycleAdapter + ?Sized> LifecycleAdapter for Arc<T> {
    fn current_scope_id(&self) -> ScopeId {
        (**self).current_scope_id()
    }
}
