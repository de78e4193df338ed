// ============================================================================
// Eviction Ring
// ============================================================================
//
// Creation-ordered doubly-linked list over slot indices of the node table.
// The links live in their own vector, parallel to the slot table, so removing
// a node never leaves another node holding a dangling id.
//
// ============================================================================

/// Index into the tree's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIdx(pub(crate) usize);

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<SlotIdx>,
    next: Option<SlotIdx>,
    linked: bool,
}

#[derive(Debug, Default)]
pub struct EvictionRing {
    links: Vec<Link>,
    head: Option<SlotIdx>,
    tail: Option<SlotIdx>,
    len: usize,
}

impl EvictionRing {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest entry.
    #[inline]
    pub fn head(&self) -> Option<SlotIdx> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<SlotIdx> {
        self.tail
    }

    pub fn contains(&self, idx: SlotIdx) -> bool {
        self.links.get(idx.0).is_some_and(|link| link.linked)
    }

    pub fn next(&self, idx: SlotIdx) -> Option<SlotIdx> {
        self.links.get(idx.0).and_then(|link| link.next)
    }

    pub fn prev(&self, idx: SlotIdx) -> Option<SlotIdx> {
        self.links.get(idx.0).and_then(|link| link.prev)
    }

    /// Append at the tail. Returns `false` if the slot is already linked.
    pub fn push_back(&mut self, idx: SlotIdx) -> bool {
        if idx.0 >= self.links.len() {
            self.links.resize(idx.0 + 1, Link::default());
        }
        if self.links[idx.0].linked {
            return false;
        }

        self.links[idx.0] = Link {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(old_tail) => self.links[old_tail.0].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        true
    }

    /// Splice a slot out, joining its neighbours. Returns `false` if the slot
    /// was not linked.
    pub fn unlink(&mut self, idx: SlotIdx) -> bool {
        if !self.contains(idx) {
            return false;
        }
        let Link { prev, next, .. } = self.links[idx.0];

        match prev {
            Some(p) => self.links[p.0].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n.0].prev = prev,
            None => self.tail = prev,
        }

        self.links[idx.0] = Link::default();
        self.len -= 1;
        true
    }

    /// Walk from oldest to newest.
    pub fn iter(&self) -> RingIter<'_> {
        RingIter {
            ring: self,
            cursor: self.head,
            remaining: self.len,
        }
    }
}

pub struct RingIter<'a> {
    ring: &'a EvictionRing,
    cursor: Option<SlotIdx>,
    // bounds the walk if the links were ever corrupted into a loop
    remaining: usize,
}

impl Iterator for RingIter<'_> {
    type Item = SlotIdx;

    fn next(&mut self) -> Option<SlotIdx> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.cursor?;
        self.cursor = self.ring.next(current);
        self.remaining -= 1;
        Some(current)
    }
}
