// ============================================================================
// Destroy, Cascade & Eviction
// ============================================================================
//
// Node states:
//
//   live ──destroy (no children)──────────────> removed
//     │
//     └──destroy (children remain)──> completed ──last child removed──> removed
//
// Eviction removes the ring victim regardless of state and promotes its
// children to roots.
//
// Every removal is planned first (read-only, may reject) and committed second
// (infallible), so a bookkeeping defect never leaves the tree half-updated.
//
// ============================================================================

use super::{NodeOrigin, ScopeNode, ScopeTree, SlotIdx};
use crate::core::{Result, ScopeError, ScopeId};
use tracing::{debug, warn};

/// Result of [`ScopeTree::destroy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Id not live; nothing changed.
    Unknown,
    /// Children remain; the node is now marked completed.
    Completed,
    /// The node and every reclaimed ancestor, in removal order.
    Removed(Vec<ScopeId>),
    /// The node's own links were inconsistent; left untouched.
    Rejected,
}

/// A capacity victim and the children promoted to roots by its removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub victim: ScopeId,
    pub orphaned: Vec<ScopeId>,
    /// Completed ancestors reclaimed because the victim was their last child.
    pub reclaimed: Vec<ScopeId>,
}

/// Slots to free, first the target then its ancestors.
#[derive(Debug)]
struct DestroyPlan {
    removals: Vec<SlotIdx>,
}

#[derive(Debug, Default)]
struct Committed {
    removed: Vec<ScopeId>,
    orphaned: Vec<ScopeId>,
}

impl ScopeTree {
    /// Retire a scope whose unit of work finished.
    ///
    /// A childless node is removed together with every completed ancestor that
    /// it leaves childless; a node with live children is only marked completed.
    pub fn destroy(&mut self, id: ScopeId) -> DestroyOutcome {
        let Some(&idx) = self.index.get(&id) else {
            return DestroyOutcome::Unknown;
        };

        let has_children = match self.slot_mut(idx) {
            Some(node) if !node.children.is_empty() => {
                node.completed = true;
                true
            }
            Some(_) => false,
            None => return DestroyOutcome::Unknown,
        };
        if has_children {
            debug!(scope = %id, "scope completed with live children");
            return DestroyOutcome::Completed;
        }

        let plan = match self.plan_destroy(idx) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(scope = %id, error = %err, "destroy skipped");
                return DestroyOutcome::Rejected;
            }
        };

        let committed = self.commit(plan);
        debug!(scope = %id, removed = committed.removed.len(), "scope destroyed");
        DestroyOutcome::Removed(committed.removed)
    }

    /// Remove the least recently created node, promoting its children to
    /// roots. Implicit placeholders that still hold children are passed over.
    /// Every non-empty tree has a leaf, so the head fallback only guards
    /// against corrupted links.
    pub fn evict_oldest(&mut self) -> Option<Eviction> {
        let victim_idx = self
            .ring
            .iter()
            .find(|idx| self.slot(*idx).is_some_and(|node| !is_placeholder(node)))
            .or_else(|| self.ring.head())?;

        let victim = self.slot(victim_idx)?;
        let victim_id = victim.id;
        if is_placeholder(victim) {
            warn!(scope = %victim_id, "only implicit placeholders left; evicting one");
        }

        let mut removals = vec![victim_idx];
        removals.extend(self.plan_cascade(victim_idx));
        let Committed { removed, orphaned } = self.commit(DestroyPlan { removals });
        let reclaimed: Vec<ScopeId> = removed.into_iter().skip(1).collect();
        debug!(
            scope = %victim_id,
            orphaned = orphaned.len(),
            reclaimed = reclaimed.len(),
            "scope evicted"
        );

        Some(Eviction {
            victim: victim_id,
            orphaned,
            reclaimed,
        })
    }

    /// Validate the target's own links, then collect the ancestors it reclaims.
    fn plan_destroy(&self, idx: SlotIdx) -> Result<DestroyPlan> {
        let node = self
            .slot(idx)
            .ok_or_else(|| ScopeError::Structural(format!("slot {} is empty", idx.0)))?;

        if let Some(parent_id) = node.parent {
            let parent = self.get(parent_id).ok_or_else(|| {
                ScopeError::Structural(format!("{} points at missing parent {}", node.id, parent_id))
            })?;
            if !parent.children.contains(&node.id) {
                return Err(ScopeError::Structural(format!(
                    "{} is not listed under its parent {}",
                    node.id, parent_id
                )));
            }
        }

        let mut removals = vec![idx];
        removals.extend(self.plan_cascade(idx));
        Ok(DestroyPlan { removals })
    }

    /// Completed ancestors left childless once the node at `idx` is gone,
    /// nearest first. Stops at the first live or still-branching ancestor, and
    /// at any link inconsistency.
    fn plan_cascade(&self, idx: SlotIdx) -> Vec<SlotIdx> {
        let mut out = Vec::new();
        let Some(start) = self.slot(idx) else {
            return out;
        };

        let mut child_id = start.id;
        let mut cursor = start.parent;
        while let Some(parent_id) = cursor {
            let Some(&parent_idx) = self.index.get(&parent_id) else {
                warn!(scope = %child_id, parent = %parent_id, "cascade stopped at missing parent");
                break;
            };
            let Some(parent) = self.slot(parent_idx) else {
                break;
            };
            if !parent.children.contains(&child_id) {
                warn!(scope = %child_id, parent = %parent_id, "cascade stopped at unlinked parent");
                break;
            }
            if !parent.completed || parent.children.len() != 1 {
                break;
            }
            if out.len() >= self.size {
                warn!(scope = %parent_id, "cascade stopped at parent cycle");
                break;
            }

            out.push(parent_idx);
            child_id = parent_id;
            cursor = parent.parent;
        }
        out
    }

    /// Apply a plan. Each removed node is detached from its parent and its
    /// remaining children are promoted to roots; none of these steps can fail.
    fn commit(&mut self, plan: DestroyPlan) -> Committed {
        let mut committed = Committed {
            removed: Vec::with_capacity(plan.removals.len()),
            orphaned: Vec::new(),
        };

        for idx in plan.removals {
            let Some(node) = self.release(idx) else {
                continue;
            };

            if let Some(parent_id) = node.parent {
                if let Some(parent) = self.get_mut(parent_id) {
                    parent.children.remove(&node.id);
                }
            }

            for child_id in &node.children {
                match self.get_mut(*child_id) {
                    Some(child) if child.parent == Some(node.id) => {
                        child.parent = None;
                        committed.orphaned.push(*child_id);
                    }
                    _ => warn!(scope = %node.id, child = %child_id, "child link already broken"),
                }
            }

            committed.removed.push(node.id);
        }

        committed
    }
}

/// An implicit node some live scope still hangs off.
fn is_placeholder(node: &ScopeNode) -> bool {
    node.origin == NodeOrigin::Implicit && !node.children.is_empty()
}
