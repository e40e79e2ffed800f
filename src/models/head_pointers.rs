use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::{
    ordering::Orientation,
    term_directory::TermDirectory,
    types::{BlockPointer, TermId},
};

/// Per-term statistics and the entry point into its chain of sealed blocks.
pub struct HeadPointer {
    document_frequency: AtomicU32,
    collection_frequency: AtomicU64,
    /// First block in traversal order.
    entry: AtomicU32,
    /// Most recently sealed block; new blocks are linked against it.
    last: AtomicU32,
    block_count: AtomicU32,
}

/// Plain copy of a [`HeadPointer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadState {
    pub document_frequency: u32,
    pub collection_frequency: u64,
    pub entry: BlockPointer,
    pub last: BlockPointer,
    pub block_count: u32,
}

impl Default for HeadState {
    fn default() -> Self {
        Self {
            document_frequency: 0,
            collection_frequency: 0,
            entry: BlockPointer::UNDEFINED,
            last: BlockPointer::UNDEFINED,
            block_count: 0,
        }
    }
}

impl Default for HeadPointer {
    fn default() -> Self {
        Self::from_state(HeadState::default())
    }
}

impl HeadPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: HeadState) -> Self {
        Self {
            document_frequency: AtomicU32::new(state.document_frequency),
            collection_frequency: AtomicU64::new(state.collection_frequency),
            entry: AtomicU32::new(state.entry.raw()),
            last: AtomicU32::new(state.last.raw()),
            block_count: AtomicU32::new(state.block_count),
        }
    }

    pub fn state(&self) -> HeadState {
        HeadState {
            document_frequency: self.document_frequency.load(Ordering::SeqCst),
            collection_frequency: self.collection_frequency.load(Ordering::SeqCst),
            entry: BlockPointer::from_raw(self.entry.load(Ordering::SeqCst)),
            last: BlockPointer::from_raw(self.last.load(Ordering::SeqCst)),
            block_count: self.block_count.load(Ordering::SeqCst),
        }
    }

    pub fn document_frequency(&self) -> u32 {
        self.document_frequency.load(Ordering::SeqCst)
    }

    pub fn collection_frequency(&self) -> u64 {
        self.collection_frequency.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> BlockPointer {
        BlockPointer::from_raw(self.last.load(Ordering::SeqCst))
    }

    pub(crate) fn record_posting(&self, occurrences: u32) {
        self.document_frequency.fetch_add(1, Ordering::SeqCst);
        self.collection_frequency
            .fetch_add(occurrences as u64, Ordering::SeqCst);
    }

    /// Makes a freshly written block reachable. Forward lists keep their
    /// entry at the oldest block; reverse lists enter at the newest one.
    pub(crate) fn publish_block(&self, ptr: BlockPointer, orientation: Orientation) {
        if orientation.is_reverse() || self.block_count.load(Ordering::SeqCst) == 0 {
            self.entry.store(ptr.raw(), Ordering::SeqCst);
        }
        self.last.store(ptr.raw(), Ordering::SeqCst);
        self.block_count.fetch_add(1, Ordering::SeqCst);
    }
}

pub type HeadPointers = TermDirectory<HeadPointer>;

impl HeadPointers {
    /// Statistics for `term`, zeroed if the term has never been inserted.
    pub fn state_of(&self, term: TermId) -> HeadState {
        self.get(term).map(|head| head.state()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_entry_stays_at_oldest_block() {
        let head = HeadPointer::new();
        let first = BlockPointer::new(0, 0);
        let second = BlockPointer::new(0, 100);
        head.publish_block(first, Orientation::Forward);
        head.publish_block(second, Orientation::Forward);
        let state = head.state();
        assert_eq!(state.entry, first);
        assert_eq!(state.last, second);
        assert_eq!(state.block_count, 2);
    }

    #[test]
    fn test_reverse_entry_moves_to_newest_block() {
        let head = HeadPointer::new();
        let first = BlockPointer::new(0, 0);
        let second = BlockPointer::new(1, 0);
        head.publish_block(first, Orientation::Reverse);
        head.publish_block(second, Orientation::Reverse);
        assert_eq!(head.state().entry, second);
    }

    #[test]
    fn test_frequencies() {
        let heads = HeadPointers::new();
        heads.get_or_create(TermId(1), HeadPointer::new).record_posting(3);
        heads.get_or_create(TermId(1), HeadPointer::new).record_posting(1);
        let state = heads.state_of(TermId(1));
        assert_eq!(state.document_frequency, 2);
        assert_eq!(state.collection_frequency, 4);
        assert_eq!(heads.state_of(TermId(0)).document_frequency, 0);
        assert_eq!(heads.state_of(TermId(9)), HeadState::default());
    }
}
