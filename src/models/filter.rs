use super::types::DocId;

/// Eligibility test over the docID domain, interleaved with intersection.
///
/// `find_first` and `find_next` walk the eligible ids in traversal order
/// (descending when `reverse` is set); `find_next` returns the first eligible
/// id strictly after `doc`. `None` ends the walk.
pub trait Filter: Send + Sync {
    fn find_first(&self, reverse: bool) -> Option<DocId>;
    fn find_next(&self, doc: DocId, reverse: bool) -> Option<DocId>;
    fn test(&self, doc: DocId) -> bool;
}

/// Dense bitset over `0..universe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitsetFilter {
    words: Vec<u64>,
    universe: u32,
}

impl BitsetFilter {
    pub fn new(universe: u32) -> Self {
        Self {
            words: vec![0; (universe as usize).div_ceil(64)],
            universe,
        }
    }

    pub fn from_ids(universe: u32, ids: impl IntoIterator<Item = DocId>) -> Self {
        let mut filter = Self::new(universe);
        for id in ids {
            filter.insert(id);
        }
        filter
    }

    /// Everything in `0..universe` except `ids`.
    pub fn excluding(universe: u32, ids: impl IntoIterator<Item = DocId>) -> Self {
        let mut filter = Self::from_ids(universe, 0..universe);
        for id in ids {
            filter.remove(id);
        }
        filter
    }

    /// Ids outside `0..universe` are ignored.
    pub fn insert(&mut self, doc: DocId) {
        if doc < self.universe {
            self.words[(doc >> 6) as usize] |= 1u64 << (doc & 63);
        }
    }

    pub fn remove(&mut self, doc: DocId) {
        if doc < self.universe {
            self.words[(doc >> 6) as usize] &= !(1u64 << (doc & 63));
        }
    }

    pub fn universe(&self) -> u32 {
        self.universe
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// First set bit at or above `from`.
    fn next_set_from(&self, from: u64) -> Option<DocId> {
        if from >= self.universe as u64 {
            return None;
        }
        let mut idx = (from >> 6) as usize;
        let mut word = self.words[idx] & (u64::MAX << (from & 63));
        loop {
            if word != 0 {
                return Some(((idx as u64) << 6 | word.trailing_zeros() as u64) as DocId);
            }
            idx += 1;
            word = *self.words.get(idx)?;
        }
    }

    /// Last set bit at or below `from`.
    fn prev_set_from(&self, from: i64) -> Option<DocId> {
        if from < 0 || self.universe == 0 {
            return None;
        }
        let from = (from as u64).min(self.universe as u64 - 1);
        let mut idx = (from >> 6) as usize;
        let mut word = self.words[idx] & (u64::MAX >> (63 - (from & 63)));
        loop {
            if word != 0 {
                return Some(((idx as u64) << 6 | (63 - word.leading_zeros()) as u64) as DocId);
            }
            idx = idx.checked_sub(1)?;
            word = self.words[idx];
        }
    }
}

impl Filter for BitsetFilter {
    fn find_first(&self, reverse: bool) -> Option<DocId> {
        if reverse {
            self.prev_set_from(self.universe as i64 - 1)
        } else {
            self.next_set_from(0)
        }
    }

    fn find_next(&self, doc: DocId, reverse: bool) -> Option<DocId> {
        if reverse {
            self.prev_set_from(doc as i64 - 1)
        } else {
            self.next_set_from(doc as u64 + 1)
        }
    }

    fn test(&self, doc: DocId) -> bool {
        doc < self.universe && self.words[(doc >> 6) as usize] & (1u64 << (doc & 63)) != 0
    }
}

/// Closure-backed filter over `0..universe`; seeking is a linear scan.
pub struct PredicateFilter<F> {
    universe: u32,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: Fn(DocId) -> bool + Send + Sync,
{
    pub fn new(universe: u32, predicate: F) -> Self {
        Self {
            universe,
            predicate,
        }
    }
}

impl<F> Filter for PredicateFilter<F>
where
    F: Fn(DocId) -> bool + Send + Sync,
{
    fn find_first(&self, reverse: bool) -> Option<DocId> {
        if reverse {
            (0..self.universe).rev().find(|&doc| (self.predicate)(doc))
        } else {
            (0..self.universe).find(|&doc| (self.predicate)(doc))
        }
    }

    fn find_next(&self, doc: DocId, reverse: bool) -> Option<DocId> {
        if reverse {
            (0..doc.min(self.universe))
                .rev()
                .find(|&doc| (self.predicate)(doc))
        } else {
            (doc.checked_add(1)?..self.universe).find(|&doc| (self.predicate)(doc))
        }
    }

    fn test(&self, doc: DocId) -> bool {
        doc < self.universe && (self.predicate)(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(filter: &dyn Filter, reverse: bool) -> Vec<DocId> {
        let mut out = Vec::new();
        let mut next = filter.find_first(reverse);
        while let Some(doc) = next {
            out.push(doc);
            next = filter.find_next(doc, reverse);
        }
        out
    }

    #[test]
    fn test_bitset_walks_both_directions() {
        let ids = [0, 5, 63, 64, 65, 130, 199];
        let filter = BitsetFilter::from_ids(200, ids);
        assert_eq!(walk(&filter, false), ids.to_vec());
        let mut reversed = ids.to_vec();
        reversed.reverse();
        assert_eq!(walk(&filter, true), reversed);
        assert!(filter.test(64));
        assert!(!filter.test(66));
        assert!(!filter.test(500));
        assert_eq!(filter.count(), ids.len());
    }

    #[test]
    fn test_bitset_excluding() {
        let filter = BitsetFilter::excluding(4, [2]);
        assert_eq!(walk(&filter, false), vec![0, 1, 3]);
    }

    #[test]
    fn test_empty_bitset() {
        let filter = BitsetFilter::new(0);
        assert_eq!(filter.find_first(false), None);
        assert_eq!(filter.find_first(true), None);
        assert_eq!(filter.find_next(0, true), None);
    }

    #[test]
    fn test_predicate_matches_bitset() {
        let predicate = PredicateFilter::new(300, |doc| doc % 7 == 3);
        let bitset = BitsetFilter::from_ids(300, (0..300).filter(|doc| doc % 7 == 3));
        assert_eq!(walk(&predicate, false), walk(&bitset, false));
        assert_eq!(walk(&predicate, true), walk(&bitset, true));
    }
}
