use parking_lot::RwLock;

use super::{
    ordering::Orientation,
    term_directory::TermDirectory,
    types::{DocId, Score, BLOCK_SIZE},
};

/// Uncompressed tail of one term's postings list, in insertion (ascending
/// docID) order.
///
/// Capacity starts small and doubles up to [`BLOCK_SIZE`], so rare terms keep
/// a few words of storage and are never promoted to compressed blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingBuffer {
    doc_ids: Vec<DocId>,
    scores: Vec<Score>,
    last_doc_id: Option<DocId>,
}

impl PostingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        doc_ids: Vec<DocId>,
        scores: Vec<Score>,
        last_doc_id: Option<DocId>,
    ) -> Self {
        Self {
            doc_ids,
            scores,
            last_doc_id,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Largest docID ever inserted for this term, sealed or not.
    pub fn last_doc_id(&self) -> Option<DocId> {
        self.last_doc_id
    }

    pub fn capacity(&self) -> usize {
        self.doc_ids.capacity()
    }

    pub fn doc_ids(&self) -> &[DocId] {
        &self.doc_ids
    }

    pub fn scores(&self) -> &[Score] {
        &self.scores
    }

    /// Whether `doc_id` may follow the postings already recorded.
    pub fn accepts(&self, doc_id: DocId) -> bool {
        self.last_doc_id.map_or(true, |last| doc_id > last)
    }

    /// Appending one more posting fills the buffer.
    pub fn seals_on_push(&self) -> bool {
        self.doc_ids.len() + 1 >= BLOCK_SIZE
    }

    pub fn push(&mut self, doc_id: DocId, score: Score, initial_capacity: usize) {
        debug_assert!(self.accepts(doc_id));
        debug_assert!(self.doc_ids.len() < BLOCK_SIZE);
        if self.doc_ids.len() == self.doc_ids.capacity() {
            let target = (self.doc_ids.capacity() * 2).clamp(initial_capacity.max(1), BLOCK_SIZE);
            self.doc_ids.reserve_exact(target - self.doc_ids.len());
            self.scores.reserve_exact(target - self.scores.len());
        }
        self.doc_ids.push(doc_id);
        self.scores.push(score);
        self.last_doc_id = Some(doc_id);
    }

    /// The buffered postings plus `extra`, in traversal order.
    pub fn traversal_batch(
        &self,
        extra: Option<(DocId, Score)>,
        orientation: Orientation,
    ) -> (Vec<DocId>, Vec<Score>) {
        let mut doc_ids = Vec::with_capacity(self.len() + 1);
        let mut scores = Vec::with_capacity(self.len() + 1);
        doc_ids.extend_from_slice(&self.doc_ids);
        scores.extend_from_slice(&self.scores);
        if let Some((doc_id, score)) = extra {
            doc_ids.push(doc_id);
            scores.push(score);
        }
        if orientation.is_reverse() {
            doc_ids.reverse();
            scores.reverse();
        }
        (doc_ids, scores)
    }

    /// Empties the buffer after its contents were sealed into a block whose
    /// last docID is `sealed_up_to`. Capacity is kept: a term that filled one
    /// block is likely to fill the next.
    pub fn mark_sealed(&mut self, sealed_up_to: DocId) {
        self.doc_ids.clear();
        self.scores.clear();
        self.last_doc_id = Some(sealed_up_to);
    }
}

/// Per-term posting buffers, indexed by term id.
pub struct PostingBuffers {
    initial_capacity: usize,
    terms: TermDirectory<RwLock<PostingBuffer>>,
}

impl PostingBuffers {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            terms: TermDirectory::new(),
        }
    }

    pub(crate) fn from_buffers(initial_capacity: usize, buffers: Vec<PostingBuffer>) -> Self {
        Self {
            initial_capacity,
            terms: TermDirectory::from_slots(buffers.into_iter().map(RwLock::new).collect()),
        }
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn terms(&self) -> &TermDirectory<RwLock<PostingBuffer>> {
        &self.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_is_capped() {
        let mut buffer = PostingBuffer::new();
        let mut capacities = Vec::new();
        for doc in 0..(BLOCK_SIZE as u32 - 1) {
            buffer.push(doc, 1, 4);
            if capacities.last() != Some(&buffer.capacity()) {
                capacities.push(buffer.capacity());
            }
        }
        assert_eq!(capacities, vec![4, 8, 16, 32, 64, 128]);
        assert!(buffer.seals_on_push());
    }

    #[test]
    fn test_ordering_guard() {
        let mut buffer = PostingBuffer::new();
        assert!(buffer.accepts(0));
        buffer.push(5, 1, 4);
        assert!(!buffer.accepts(5));
        assert!(!buffer.accepts(3));
        assert!(buffer.accepts(6));

        buffer.mark_sealed(5);
        assert!(buffer.is_empty());
        assert!(!buffer.accepts(5));
    }

    #[test]
    fn test_traversal_batch_respects_orientation() {
        let mut buffer = PostingBuffer::new();
        buffer.push(1, 10, 4);
        buffer.push(2, 20, 4);
        let (docs, scores) = buffer.traversal_batch(Some((3, 30)), Orientation::Reverse);
        assert_eq!(docs, vec![3, 2, 1]);
        assert_eq!(scores, vec![30, 20, 10]);
        let (docs, _) = buffer.traversal_batch(None, Orientation::Forward);
        assert_eq!(docs, vec![1, 2]);
    }
}
