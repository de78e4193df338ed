// ============================================================================
// Scope Tree
// ============================================================================
//
// Owns every tracked scope. Nodes live in a stable slot table; an id index
// maps adapter-assigned ids to slots, and the eviction ring orders slots by
// creation time.
//
// Mutations that remove nodes go through a two-phase path (see `cascade`):
// a read-only planning pass validates links and collects the slots to free,
// then a commit pass applies it with operations that cannot fail.
//
// ============================================================================

pub mod cascade;
pub mod node;
pub mod ring;

pub use cascade::{DestroyOutcome, Eviction};
pub use node::{NodeOrigin, ScopeNode};
pub use ring::{EvictionRing, SlotIdx};

use crate::core::{Result, ScopeError, ScopeId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of [`ScopeTree::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The id was already live; nothing changed.
    Existing,
    /// The node was created. `evicted` lists the capacity victims removed to
    /// make room, oldest first.
    Created { evicted: Vec<Eviction> },
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    slots: Vec<Option<ScopeNode>>,
    free: Vec<SlotIdx>,
    index: HashMap<ScopeId, SlotIdx>,
    ring: EvictionRing,
    size: usize,
    /// `0` disables eviction.
    capacity: usize,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.index.get(&id).and_then(|idx| self.slot(*idx))
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> Option<&mut ScopeNode> {
        let idx = *self.index.get(&id)?;
        self.slot_mut(idx)
    }

    /// Head of the eviction ring.
    pub fn oldest_id(&self) -> Option<ScopeId> {
        self.ring.head().and_then(|idx| self.slot(idx)).map(ScopeNode::id)
    }

    /// Live nodes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeNode> {
        self.ring.iter().filter_map(|idx| self.slot(idx))
    }

    pub fn eviction_order(&self) -> Vec<ScopeId> {
        self.iter().map(ScopeNode::id).collect()
    }

    /// Register a declared scope under `parent`.
    ///
    /// An id that is already live is left as is, except that a node first
    /// materialised implicitly becomes declared. An unknown parent is first
    /// materialised as an implicit root. Capacity
    /// is enforced before the new node is created, and the node is attached
    /// only to a parent that is still live afterwards; if the parent was the
    /// capacity victim the node starts out as a root.
    pub fn insert(&mut self, id: ScopeId, parent: Option<ScopeId>, now_ms: i64) -> InsertOutcome {
        if let Some(existing) = self.get_mut(id) {
            if existing.origin == NodeOrigin::Implicit {
                existing.origin = NodeOrigin::Declared;
                debug!(scope = %id, "implicit scope declared");
            }
            return InsertOutcome::Existing;
        }

        let parent = parent.filter(|p| *p != id);
        let mut evicted = Vec::new();

        if let Some(parent_id) = parent {
            if !self.contains(parent_id) {
                evicted.extend(self.make_room());
                self.create(parent_id, None, NodeOrigin::Implicit, now_ms);
            }
        }

        evicted.extend(self.make_room());

        let parent = parent.filter(|p| self.contains(*p));
        self.create(id, parent, NodeOrigin::Declared, now_ms);

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.get_mut(parent_id) {
                parent_node.children.insert(id);
                parent_node.touched_at_ms = now_ms;
            }
        }

        debug!(scope = %id, parent = ?parent, evicted = evicted.len(), "scope created");
        InsertOutcome::Created { evicted }
    }

    /// Materialise `id` as an implicit root if it is unknown, evicting first
    /// when the tree is full.
    pub fn ensure_root(&mut self, id: ScopeId, now_ms: i64) -> InsertOutcome {
        if self.contains(id) {
            return InsertOutcome::Existing;
        }
        let evicted = self.make_room().into_iter().collect();
        self.create(id, None, NodeOrigin::Implicit, now_ms);
        debug!(scope = %id, "implicit root created");
        InsertOutcome::Created { evicted }
    }

    /// Ids whose last touch is more than `ttl_ms` before `now_ms`, oldest first.
    pub fn stale_ids(&self, now_ms: i64, ttl_ms: i64) -> Vec<ScopeId> {
        self.iter()
            .filter(|node| now_ms - node.touched_at_ms > ttl_ms)
            .map(ScopeNode::id)
            .collect()
    }

    fn make_room(&mut self) -> Option<Eviction> {
        if self.capacity == 0 || self.size < self.capacity {
            return None;
        }
        self.evict_oldest()
    }

    fn create(&mut self, id: ScopeId, parent: Option<ScopeId>, origin: NodeOrigin, now_ms: i64) {
        let node = ScopeNode::new(id, parent, origin, now_ms);
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx.0] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                SlotIdx(self.slots.len() - 1)
            }
        };
        self.index.insert(id, idx);
        self.ring.push_back(idx);
        self.size += 1;
    }

    /// Free a slot and drop it from the index and the ring. Links to other
    /// nodes are left for the caller.
    fn release(&mut self, idx: SlotIdx) -> Option<ScopeNode> {
        let node = self.slots.get_mut(idx.0)?.take()?;
        self.index.remove(&node.id);
        self.ring.unlink(idx);
        self.free.push(idx);
        self.size -= 1;
        Some(node)
    }

    fn slot(&self, idx: SlotIdx) -> Option<&ScopeNode> {
        self.slots.get(idx.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, idx: SlotIdx) -> Option<&mut ScopeNode> {
        self.slots.get_mut(idx.0).and_then(Option::as_mut)
    }

    /// Verify the structural invariants: size accounting, parent/child
    /// symmetry, acyclic parent chains, a ring that visits every live node
    /// exactly once, completed nodes holding children, and the capacity bound.
    pub fn check_invariants(&self) -> Result<()> {
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.size || self.index.len() != self.size || self.ring.len() != self.size {
            return Err(ScopeError::Structural(format!(
                "size {} disagrees with slots {}, index {}, ring {}",
                self.size,
                occupied,
                self.index.len(),
                self.ring.len()
            )));
        }

        if self.capacity > 0 && self.size > self.capacity {
            return Err(ScopeError::Structural(format!(
                "size {} exceeds capacity {}",
                self.size, self.capacity
            )));
        }

        for (id, idx) in &self.index {
            let node = self
                .slot(*idx)
                .ok_or_else(|| ScopeError::Structural(format!("{} indexes an empty slot", id)))?;
            if node.id != *id {
                return Err(ScopeError::Structural(format!(
                    "slot for {} holds {}",
                    id, node.id
                )));
            }

            if let Some(parent_id) = node.parent {
                let parent = self.get(parent_id).ok_or_else(|| {
                    ScopeError::Structural(format!("{} points at missing parent {}", id, parent_id))
                })?;
                if !parent.children.contains(id) {
                    return Err(ScopeError::Structural(format!(
                        "{} is not listed as a child of {}",
                        id, parent_id
                    )));
                }
            }

            for child_id in &node.children {
                let child = self.get(*child_id).ok_or_else(|| {
                    ScopeError::Structural(format!("{} lists missing child {}", id, child_id))
                })?;
                if child.parent != Some(*id) {
                    return Err(ScopeError::Structural(format!(
                        "{} lists {} whose parent is {:?}",
                        id, child_id, child.parent
                    )));
                }
            }

            if node.completed && node.children.is_empty() {
                return Err(ScopeError::Structural(format!(
                    "{} is completed without children",
                    id
                )));
            }

            let mut cursor = node.parent;
            let mut steps = 0;
            while let Some(ancestor) = cursor {
                steps += 1;
                if steps > self.size {
                    return Err(ScopeError::Structural(format!("parent cycle through {}", id)));
                }
                cursor = self.get(ancestor).and_then(|n| n.parent);
            }
        }

        let mut seen = HashSet::with_capacity(self.size);
        for idx in self.ring.iter() {
            if self.slot(idx).is_none() || !seen.insert(idx) {
                return Err(ScopeError::Structural(format!(
                    "eviction ring visits slot {} twice or while empty",
                    idx.0
                )));
            }
        }
        if seen.len() != self.size {
            return Err(ScopeError::Structural(format!(
                "eviction ring covers {} of {} nodes",
                seen.len(),
                self.size
            )));
        }

        Ok(())
    }
}
