use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Number of postings sealed together into one compressed block.
pub const BLOCK_SIZE: usize = 128;

pub type DocId = u32;
pub type Score = u32;
pub type Weight = u32;

/// Dense term identifier handed out by the dictionary, never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

impl From<u32> for TermId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Deref for TermId {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bits of a block pointer reserved for the word offset inside a pool.
pub const POOL_OFFSET_BITS: u32 = 24;
/// Largest pool a block pointer can address, in 32-bit words.
pub const MAX_POOL_WORDS: u32 = 1 << POOL_OFFSET_BITS;
/// Largest number of pools a block pointer can address (pool 255 is reserved
/// so that `u32::MAX` is never a valid location).
pub const MAX_POOLS: u32 = (1 << (32 - POOL_OFFSET_BITS)) - 1;

/// Location of a sealed block inside the segment pool.
///
/// Packs the pool index and the word offset inside that pool into a single
/// word so that it can be stored inline in other block records.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockPointer(u32);

impl BlockPointer {
    pub const UNDEFINED: Self = Self(u32::MAX);

    pub(crate) fn new(pool: u32, offset: u32) -> Self {
        debug_assert!(pool < MAX_POOLS);
        debug_assert!(offset < MAX_POOL_WORDS);
        Self((pool << POOL_OFFSET_BITS) | offset)
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn pool(self) -> u32 {
        self.0 >> POOL_OFFSET_BITS
    }

    pub(crate) fn offset(self) -> u32 {
        self.0 & (MAX_POOL_WORDS - 1)
    }

    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }

    /// `None` for the undefined pointer.
    pub fn defined(self) -> Option<Self> {
        (!self.is_undefined()).then_some(self)
    }
}

impl Default for BlockPointer {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Debug for BlockPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("BlockPointer(UNDEFINED)")
        } else {
            f.debug_struct("BlockPointer")
                .field("pool", &self.pool())
                .field("offset", &self.offset())
                .finish()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub score: Score,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_pointer_packing() {
        let ptr = BlockPointer::new(3, 12345);
        assert_eq!(ptr.pool(), 3);
        assert_eq!(ptr.offset(), 12345);
        assert!(!ptr.is_undefined());
        assert_eq!(BlockPointer::from_raw(ptr.raw()), ptr);

        let last = BlockPointer::new(MAX_POOLS - 1, MAX_POOL_WORDS - 1);
        assert_ne!(last, BlockPointer::UNDEFINED);
        assert_eq!(BlockPointer::UNDEFINED.defined(), None);
    }
}
