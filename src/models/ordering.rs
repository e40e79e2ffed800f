use std::cmp::Ordering;

use super::types::DocId;

/// Traversal order of every postings list in an index.
///
/// Implemented by the zero-sized [`Forward`] and [`Reverse`] strategies so the
/// intersection code is monomorphized once per orientation instead of
/// branching on a flag for every comparison.
pub trait DocOrder: Copy + Send + Sync + 'static {
    const REVERSE: bool;

    /// `a` is visited strictly before `b`.
    fn before(a: DocId, b: DocId) -> bool;

    /// Comparison in traversal order.
    fn cmp(a: DocId, b: DocId) -> Ordering;

    /// Last docID of a slice sorted in traversal order.
    fn extreme(list: &[DocId]) -> Option<DocId> {
        list.last().copied()
    }

    /// The docID that would be visited next after `doc`, if any.
    fn successor(doc: DocId) -> Option<DocId>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Forward;

#[derive(Debug, Clone, Copy, Default)]
pub struct Reverse;

impl DocOrder for Forward {
    const REVERSE: bool = false;

    #[inline]
    fn before(a: DocId, b: DocId) -> bool {
        a < b
    }

    #[inline]
    fn cmp(a: DocId, b: DocId) -> Ordering {
        a.cmp(&b)
    }

    #[inline]
    fn successor(doc: DocId) -> Option<DocId> {
        doc.checked_add(1)
    }
}

impl DocOrder for Reverse {
    const REVERSE: bool = true;

    #[inline]
    fn before(a: DocId, b: DocId) -> bool {
        a > b
    }

    #[inline]
    fn cmp(a: DocId, b: DocId) -> Ordering {
        b.cmp(&a)
    }

    #[inline]
    fn successor(doc: DocId) -> Option<DocId> {
        doc.checked_sub(1)
    }
}

/// Construction-time choice of [`DocOrder`], fixed for the life of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Forward,
    Reverse,
}

impl Orientation {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Self::Reverse
        } else {
            Self::Forward
        }
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }

    pub fn before(self, a: DocId, b: DocId) -> bool {
        match self {
            Self::Forward => Forward::before(a, b),
            Self::Reverse => Reverse::before(a, b),
        }
    }

    pub fn extreme(self, list: &[DocId]) -> Option<DocId> {
        match self {
            Self::Forward => Forward::extreme(list),
            Self::Reverse => Reverse::extreme(list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_agree_with_orientation() {
        assert!(Forward::before(1, 2));
        assert!(!Forward::before(2, 2));
        assert!(Reverse::before(2, 1));
        assert!(Orientation::Reverse.before(9, 3));
        assert_eq!(Orientation::Forward.extreme(&[1, 4, 9]), Some(9));
        assert_eq!(Orientation::Reverse.extreme(&[9, 4, 1]), Some(1));
        assert_eq!(Reverse::successor(0), None);
        assert_eq!(Forward::cmp(3, 5), Ordering::Less);
        assert_eq!(Reverse::cmp(3, 5), Ordering::Greater);
    }
}
