use crate::core::{ScopeId, Value};
use std::collections::{BTreeSet, HashMap};

/// How a node came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    /// Announced by the lifecycle adapter through `on_create`.
    Declared,
    /// Materialised on demand: an unknown parent reference, or a read/write
    /// issued from a scope the tree has never seen. A later create for the
    /// same id turns it into `Declared`.
    Implicit,
}

/// One tracked execution scope.
#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub(crate) id: ScopeId,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) touched_at_ms: i64,
    pub(crate) completed: bool,
    pub(crate) origin: NodeOrigin,
    /// Allocated on the first `set`.
    pub(crate) data: Option<HashMap<String, Value>>,
    pub(crate) children: BTreeSet<ScopeId>,
}

impl ScopeNode {
    pub(crate) fn new(id: ScopeId, parent: Option<ScopeId>, origin: NodeOrigin, now_ms: i64) -> Self {
        Self {
            id,
            parent,
            touched_at_ms: now_ms,
            completed: false,
            origin,
            data: None,
            children: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Last creation or child-attach time, in unix milliseconds.
    pub fn touched_at_ms(&self) -> i64 {
        self.touched_at_ms
    }

    /// The unit of work finished but live children keep the node around.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn origin(&self) -> NodeOrigin {
        self.origin
    }

    pub fn children(&self) -> impl Iterator<Item = ScopeId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Value stored directly on this node, ignoring ancestors.
    pub fn own_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    pub fn own_keys(&self) -> impl Iterator<Item = &str> {
        self.data.iter().flat_map(|data| data.keys().map(String::as_str))
    }

    pub(crate) fn put(&mut self, key: String, value: Value) {
        self.data.get_or_insert_with(HashMap::new).insert(key, value);
    }

    pub(crate) fn clear(&mut self, key: &str) -> bool {
        match self.data.as_mut() {
            Some(data) => data.remove(key).is_some(),
            None => false,
        }
    }
}
