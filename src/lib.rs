// ============================================================================
// scopetree Library
// ============================================================================
//
// Hierarchical per-execution-scope key/value storage. Every scope reads what
// its ancestors set, writes values its descendants will see, and is reclaimed
// when its work completes, when it goes stale, or when the live bound forces
// an eviction.
//
// ============================================================================

pub mod adapter;
pub mod clock;
pub mod config;
pub mod core;
pub mod facade;
pub mod lineage;
pub mod purge;
pub mod tree;

// Re-export main types for convenience
pub use adapter::{LifecycleAdapter, LifecycleEvent, ManualAdapter, TaskAdapter, TaskScopes};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ScopeConfig;
pub use core::{FromValue, Result, ScopeError, ScopeId, ScopeStats, SizeProfile, Value};
pub use facade::{ScopeStore, SharedScopeStore, lock_store};
pub use lineage::LineageResolver;
pub use purge::{PurgeReport, PurgeSweeper, PurgeWorker, spawn_purge_worker};
pub use tree::{DestroyOutcome, Eviction, InsertOutcome, NodeOrigin, ScopeNode, ScopeTree};
