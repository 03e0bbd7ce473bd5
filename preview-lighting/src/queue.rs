//! [`WorkQueue`], the deduplicating FIFO of surfaces awaiting relighting.

use alloc::collections::VecDeque;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashSet as HbHashSet;

/// A first-in, first-out queue which contains each item at most once.
///
/// Re-inserting an item which is already queued keeps its original position.
pub(crate) struct WorkQueue<K> {
    order: VecDeque<K>,
    /// Exactly the elements of `order`.
    present: HbHashSet<K>,
}

impl<K: Copy + Eq + Hash> WorkQueue<K> {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            present: HbHashSet::new(),
        }
    }

    /// Appends `item` unless it is already queued. Returns whether it was added.
    pub fn push(&mut self, item: K) -> bool {
        let added = self.present.insert(item);
        if added {
            self.order.push_back(item);
        }
        added
    }

    pub fn pop(&mut self) -> Option<K> {
        let item = self.order.pop_front()?;
        let removed = self.present.remove(&item);
        debug_assert!(removed);
        Some(item)
    }

    #[inline]
    pub fn contains(&self, item: &K) -> bool {
        self.present.contains(item)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Appends every item of `additions` not already queued, then drops every queued
    /// item for which `keep` returns false. Surviving items keep their relative order.
    pub fn merge(&mut self, additions: impl IntoIterator<Item = K>, mut keep: impl FnMut(&K) -> bool) {
        for item in additions {
            self.push(item);
        }
        let present = &mut self.present;
        self.order.retain(|item| {
            let kept = keep(item);
            if !kept {
                present.remove(item);
            }
            kept
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.present.clear();
    }
}

impl<K: fmt::Debug> fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.order).finish()
    }
}
