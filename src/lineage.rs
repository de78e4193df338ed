// ============================================================================
// Lineage Resolver
// ============================================================================
//
// Ancestor-walking reads and writes over a ScopeTree. All walks are iterative
// and bounded by the live node count.
//
// ============================================================================

use crate::core::{ScopeId, Value};
use crate::tree::ScopeTree;
use tracing::warn;

pub struct LineageResolver<'a> {
    tree: &'a mut ScopeTree,
    now_ms: i64,
}

impl<'a> LineageResolver<'a> {
    pub fn new(tree: &'a mut ScopeTree, now_ms: i64) -> Self {
        Self { tree, now_ms }
    }

    /// First value for `key` on the path from `scope` to its root.
    ///
    /// An unknown `scope` is materialised as a fresh implicit root, so the
    /// lookup then only sees that empty node.
    pub fn get(&mut self, key: &str, scope: ScopeId) -> Option<&Value> {
        self.tree.ensure_root(scope, self.now_ms);
        resolve(self.tree, key, scope)
    }

    /// Write into `scope`'s own mapping, never an ancestor's.
    pub fn set(&mut self, key: impl Into<String>, value: Value, scope: ScopeId) {
        self.tree.ensure_root(scope, self.now_ms);
        if let Some(node) = self.tree.get_mut(scope) {
            node.put(key.into(), value);
        }
    }

    /// Clear `key` at `scope` and at every ancestor. Returns how many nodes
    /// actually held the key.
    pub fn delete(&mut self, key: &str, scope: ScopeId) -> usize {
        let limit = self.tree.len();
        let mut cleared = 0;
        let mut steps = 0;
        let mut cursor = Some(scope);

        while let Some(id) = cursor {
            let Some(node) = self.tree.get_mut(id) else {
                break;
            };
            if node.clear(key) {
                cleared += 1;
            }
            cursor = node.parent();

            steps += 1;
            if steps > limit {
                warn!(scope = %scope, "delete walk exceeded live node count");
                break;
            }
        }
        cleared
    }

    pub fn lineage(&self, scope: ScopeId) -> Vec<ScopeId> {
        lineage(self.tree, scope)
    }
}

/// Read-only lookup; an unknown `scope` resolves to nothing.
pub fn resolve<'t>(tree: &'t ScopeTree, key: &str, scope: ScopeId) -> Option<&'t Value> {
    let limit = tree.len();
    let mut steps = 0;
    let mut cursor = Some(scope);

    while let Some(id) = cursor {
        let node = tree.get(id)?;
        if let Some(value) = node.own_value(key) {
            return Some(value);
        }
        cursor = node.parent();

        steps += 1;
        if steps > limit {
            warn!(scope = %scope, "lookup walk exceeded live node count");
            return None;
        }
    }
    None
}

/// `[scope, parent, grandparent, ..., root]`. Stops at a root or at the first
/// id the tree does not know, which is still included.
pub fn lineage(tree: &ScopeTree, scope: ScopeId) -> Vec<ScopeId> {
    let limit = tree.len();
    let mut chain = vec![scope];
    let mut cursor = tree.get(scope).and_then(|node| node.parent());

    while let Some(id) = cursor {
        if chain.len() > limit {
            warn!(scope = %scope, "lineage walk exceeded live node count");
            break;
        }
        chain.push(id);
        cursor = tree.get(id).and_then(|node| node.parent());
    }
    chain
}
