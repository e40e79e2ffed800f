use std::sync::Arc;

use parking_lot::RwLock;

use super::types::TermId;

/// Dense, grow-only table of per-term slots indexed by [`TermId`].
///
/// Slots are handed out as `Arc`s so a reader can keep using one after
/// releasing the table lock; the writer only ever appends.
pub struct TermDirectory<T> {
    slots: RwLock<Vec<Arc<T>>>,
}

impl<T> TermDirectory<T> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn from_slots(slots: Vec<T>) -> Self {
        Self {
            slots: RwLock::new(slots.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn get(&self, term: TermId) -> Option<Arc<T>> {
        self.slots.read().get(*term as usize).cloned()
    }

    /// Returns the slot for `term`, creating it (and every missing slot below
    /// it) with `init`.
    pub fn get_or_create(&self, term: TermId, mut init: impl FnMut() -> T) -> Arc<T> {
        if let Some(slot) = self.get(term) {
            return slot;
        }
        let mut slots = self.slots.write();
        while slots.len() <= *term as usize {
            slots.push(Arc::new(init()));
        }
        slots[*term as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clones out the current slots, in term order.
    pub fn to_list(&self) -> Vec<Arc<T>> {
        self.slots.read().clone()
    }
}

impl<T> Default for TermDirectory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_fills_gaps() {
        let dir: TermDirectory<u32> = TermDirectory::new();
        assert!(dir.get(TermId(2)).is_none());
        let slot = dir.get_or_create(TermId(2), || 7);
        assert_eq!(*slot, 7);
        assert_eq!(dir.len(), 3);
        assert_eq!(*dir.get(TermId(0)).unwrap(), 7);
        assert!(Arc::ptr_eq(&slot, &dir.get_or_create(TermId(2), || 9)));
    }
}
