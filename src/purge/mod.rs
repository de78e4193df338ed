// ============================================================================
// Purge Sweeper
// ============================================================================
//
// TTL expiry. A sweep snapshots the stale ids first and then retires each one
// through the normal destroy path, so a stale node that still has live
// children is only marked completed. Cascades triggered by one victim may
// remove later ids of the snapshot; those simply come back as `Unknown`.
//
// ============================================================================

pub mod worker;

pub use worker::{PurgeWorker, spawn_purge_worker};

use crate::config::ScopeConfig;
use crate::core::ScopeId;
use crate::tree::{DestroyOutcome, ScopeTree};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Live nodes when the sweep started.
    pub examined: usize,
    /// Nodes found past their TTL.
    pub stale: usize,
    /// Every node removed, including cascaded ancestors.
    pub removed: Vec<ScopeId>,
    /// Stale nodes kept because live children still reference them.
    pub completed: usize,
}

#[derive(Debug, Clone)]
pub struct PurgeSweeper {
    ttl_ms: i64,
    interval_ms: i64,
    last_sweep_ms: i64,
}

impl PurgeSweeper {
    pub fn new(ttl: Duration, interval: Duration, now_ms: i64) -> Self {
        Self {
            ttl_ms: duration_ms(ttl),
            interval_ms: duration_ms(interval),
            last_sweep_ms: now_ms,
        }
    }

    pub fn from_config(config: &ScopeConfig, now_ms: i64) -> Self {
        Self::new(config.ttl, config.purge_interval, now_ms)
    }

    /// A zero TTL turns purging off.
    pub fn is_enabled(&self) -> bool {
        self.ttl_ms > 0
    }

    pub fn last_sweep_ms(&self) -> i64 {
        self.last_sweep_ms
    }

    /// Sweep only once more than one interval has passed since the last sweep.
    pub fn maybe_sweep(&mut self, tree: &mut ScopeTree, now_ms: i64) -> Option<PurgeReport> {
        if !self.is_enabled() || now_ms - self.last_sweep_ms <= self.interval_ms {
            return None;
        }
        Some(self.sweep(tree, now_ms))
    }

    /// Retire every node whose last touch is older than the TTL.
    pub fn sweep(&mut self, tree: &mut ScopeTree, now_ms: i64) -> PurgeReport {
        self.last_sweep_ms = now_ms;

        let mut report = PurgeReport {
            examined: tree.len(),
            ..PurgeReport::default()
        };
        if !self.is_enabled() {
            return report;
        }

        let stale = tree.stale_ids(now_ms, self.ttl_ms);
        report.stale = stale.len();

        for id in stale {
            match tree.destroy(id) {
                DestroyOutcome::Removed(ids) => report.removed.extend(ids),
                DestroyOutcome::Completed => report.completed += 1,
                DestroyOutcome::Unknown | DestroyOutcome::Rejected => {}
            }
        }

        debug!(
            examined = report.examined,
            stale = report.stale,
            removed = report.removed.len(),
            completed = report.completed,
            "purge sweep finished"
        );
        report
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ScopeId {
        ScopeId(raw)
    }

    fn sweeper() -> PurgeSweeper {
        PurgeSweeper::new(Duration::from_millis(100), Duration::from_millis(50), 0)
    }

    #[test]
    fn test_sweep_removes_stale_leaves() {
        let mut tree = ScopeTree::new();
        tree.insert(id(1), None, 0);
        tree.insert(id(2), None, 150);

        let report = sweeper().sweep(&mut tree, 200);
        assert_eq!(report.examined, 2);
        assert_eq!(report.stale, 1);
        assert_eq!(report.removed, vec![id(1)]);
        assert!(tree.contains(id(2)));
    }

    #[test]
    fn test_stale_parent_with_fresh_child_is_only_completed() {
        let mut tree = ScopeTree::new();
        tree.insert(id(1), None, 0);
        tree.insert(id(2), Some(id(1)), 0);
        tree.insert(id(3), Some(id(1)), 500);

        let report = sweeper().sweep(&mut tree, 550);
        assert_eq!(report.removed, vec![id(2)]);
        assert_eq!(report.completed, 0);
        assert!(tree.contains(id(1)));
        assert!(!tree.get(id(1)).unwrap().is_completed());

        // 1 is older in the ring, so it is completed first and then reclaimed
        // by 3's cascade.
        let report = sweeper().sweep(&mut tree, 800);
        assert_eq!(report.completed, 1);
        assert_eq!(report.removed, vec![id(3), id(1)]);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_stale_chain_collapses_in_one_sweep() {
        let mut tree = ScopeTree::new();
        tree.insert(id(1), None, 0);
        tree.insert(id(2), Some(id(1)), 0);
        tree.insert(id(3), Some(id(2)), 0);

        let report = sweeper().sweep(&mut tree, 1_000);
        assert_eq!(report.stale, 3);
        assert_eq!(report.completed, 2);
        assert_eq!(report.removed, vec![id(3), id(2), id(1)]);
        assert!(tree.is_empty());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_maybe_sweep_respects_interval() {
        let mut tree = ScopeTree::new();
        tree.insert(id(1), None, 0);
        let mut sweeper = sweeper();

        assert!(sweeper.maybe_sweep(&mut tree, 40).is_none());
        assert!(sweeper.maybe_sweep(&mut tree, 50).is_none());
        let report = sweeper.maybe_sweep(&mut tree, 60).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(sweeper.last_sweep_ms(), 60);

        assert!(sweeper.maybe_sweep(&mut tree, 101).is_none());
        assert!(sweeper.maybe_sweep(&mut tree, 110).is_none());
        assert_eq!(sweeper.maybe_sweep(&mut tree, 111).unwrap().removed, vec![id(1)]);
    }

    #[test]
    fn test_zero_ttl_disables_purge() {
        let mut tree = ScopeTree::new();
        tree.insert(id(1), None, 0);
        let mut sweeper = PurgeSweeper::new(Duration::ZERO, Duration::from_millis(1), 0);

        assert!(!sweeper.is_enabled());
        assert!(sweeper.maybe_sweep(&mut tree, 1_000_000).is_none());
        assert!(sweeper.sweep(&mut tree, 1_000_000).removed.is_empty());
        assert_eq!(tree.len(), 1);
    }
}
