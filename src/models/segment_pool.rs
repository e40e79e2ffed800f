use std::sync::{
    atomic::{AtomicU32, Ordering},
    OnceLock,
};

use parking_lot::Mutex;

use super::{
    codec::{self, max_encoded_words},
    common::{corrupt, IndexError},
    ordering::Orientation,
    types::{BlockPointer, DocId, Score, BLOCK_SIZE, MAX_POOLS, MAX_POOL_WORDS},
};

/// `[req_space, link, extreme_doc_id, count, doc_len]`
const HEADER_WORDS: u32 = 5;
/// `score_len` sits between the two payloads.
pub(crate) const RECORD_OVERHEAD: u32 = HEADER_WORDS + 1;

const REQ_SPACE_IDX: u32 = 0;
const LINK_IDX: u32 = 1;
const EXTREME_IDX: u32 = 2;
const COUNT_IDX: u32 = 3;
const DOC_LEN_IDX: u32 = 4;

/// Smallest pool that can hold a worst-case full block record.
pub fn min_pool_size() -> u32 {
    RECORD_OVERHEAD + 2 * max_encoded_words(BLOCK_SIZE) as u32
}

/// A block that has been compressed but not yet written into a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    pub extreme_doc_id: DocId,
    pub count: u32,
    pub doc_words: Vec<u32>,
    pub score_words: Vec<u32>,
}

impl SealedBlock {
    /// `doc_ids` must be in traversal order for `orientation`.
    pub fn encode(doc_ids: &[DocId], scores: &[Score], orientation: Orientation) -> Self {
        debug_assert_eq!(doc_ids.len(), scores.len());
        debug_assert!(!doc_ids.is_empty() && doc_ids.len() <= BLOCK_SIZE);
        Self {
            extreme_doc_id: orientation.extreme(doc_ids).unwrap_or_default(),
            count: doc_ids.len() as u32,
            doc_words: codec::encode_doc_ids(doc_ids, orientation.is_reverse()),
            score_words: codec::encode_scores(scores),
        }
    }

    /// Words the record occupies inside a pool.
    pub fn required_words(&self) -> u32 {
        RECORD_OVERHEAD + self.doc_words.len() as u32 + self.score_words.len() as u32
    }
}

/// Validated view of a block record header.
#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    link: BlockPointer,
    extreme_doc_id: DocId,
    count: usize,
    doc_start: usize,
    doc_len: usize,
    score_start: usize,
    score_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolCursor {
    /// Index of the pool currently being filled.
    pub segment: u32,
    /// First free word in that pool.
    pub offset: u32,
}

/// Append-only store of compressed blocks spread over a fixed number of
/// equally sized arenas.
///
/// Arenas are materialized lazily, only when the current one cannot hold the
/// next record. Once written, a record is never modified except for its link
/// word, which is written at most once. Payload words are stored relaxed; a
/// record becomes visible to readers through a `SeqCst` store of either its
/// predecessor's link word (forward lists) or the term's head pointer
/// (reverse lists), and readers load both with `SeqCst`.
pub struct SegmentPool {
    max_pool_size: u32,
    number_of_pools: u32,
    orientation: Orientation,
    pools: Box<[OnceLock<Box<[AtomicU32]>>]>,
    cursor: Mutex<PoolCursor>,
}

fn new_arena(words: u32) -> Box<[AtomicU32]> {
    (0..words).map(|_| AtomicU32::new(0)).collect()
}

impl SegmentPool {
    pub fn new(
        max_pool_size: u32,
        number_of_pools: u32,
        orientation: Orientation,
    ) -> Result<Self, IndexError> {
        Self::validate_geometry(max_pool_size, number_of_pools)?;
        let pools: Box<[OnceLock<Box<[AtomicU32]>>]> =
            (0..number_of_pools).map(|_| OnceLock::new()).collect();
        let _ = pools[0].set(new_arena(max_pool_size));

        Ok(Self {
            max_pool_size,
            number_of_pools,
            orientation,
            pools,
            cursor: Mutex::new(PoolCursor {
                segment: 0,
                offset: 0,
            }),
        })
    }

    pub(crate) fn validate_geometry(
        max_pool_size: u32,
        number_of_pools: u32,
    ) -> Result<(), IndexError> {
        if !(min_pool_size()..=MAX_POOL_WORDS).contains(&max_pool_size) {
            return Err(IndexError::InvalidConfig(format!(
                "max_pool_size must be within {}..={} words, got {}",
                min_pool_size(),
                MAX_POOL_WORDS,
                max_pool_size
            )));
        }
        if !(1..=MAX_POOLS).contains(&number_of_pools) {
            return Err(IndexError::InvalidConfig(format!(
                "number_of_pools must be within 1..={}, got {}",
                MAX_POOLS, number_of_pools
            )));
        }
        Ok(())
    }

    /// Rebuilds a pool from persisted arenas. `arenas` holds every arena up to
    /// and including the one being filled; the last one is only valid up to
    /// `tail_offset`.
    pub(crate) fn from_parts(
        max_pool_size: u32,
        number_of_pools: u32,
        orientation: Orientation,
        arenas: Vec<Vec<u32>>,
        tail_offset: u32,
    ) -> Result<Self, IndexError> {
        Self::validate_geometry(max_pool_size, number_of_pools)
            .map_err(|err| corrupt(err.to_string()))?;
        if arenas.is_empty() || arenas.len() > number_of_pools as usize {
            return Err(corrupt(format!(
                "segment pool holds {} arenas, capacity is {}",
                arenas.len(),
                number_of_pools
            )));
        }
        if tail_offset > max_pool_size {
            return Err(corrupt(format!(
                "tail offset {} beyond pool size {}",
                tail_offset, max_pool_size
            )));
        }

        let pools: Box<[OnceLock<Box<[AtomicU32]>>]> =
            (0..number_of_pools).map(|_| OnceLock::new()).collect();
        let segment = arenas.len() as u32 - 1;
        for (pool, words) in pools.iter().zip(arenas) {
            let arena = new_arena(max_pool_size);
            for (slot, word) in arena.iter().zip(words) {
                slot.store(word, Ordering::Relaxed);
            }
            let _ = pool.set(arena);
        }

        Ok(Self {
            max_pool_size,
            number_of_pools,
            orientation,
            pools,
            cursor: Mutex::new(PoolCursor {
                segment,
                offset: tail_offset,
            }),
        })
    }

    pub fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    pub fn number_of_pools(&self) -> u32 {
        self.number_of_pools
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub(crate) fn cursor(&self) -> PoolCursor {
        *self.cursor.lock()
    }

    /// Arenas materialized so far.
    pub fn pools_in_use(&self) -> u32 {
        self.cursor().segment + 1
    }

    pub fn used_words(&self) -> u64 {
        let cursor = self.cursor();
        cursor.segment as u64 * self.max_pool_size as u64 + cursor.offset as u64
    }

    /// Copies the first `words` words of an arena out of the pool.
    pub(crate) fn arena_words(&self, pool: u32, words: u32) -> Result<Vec<u32>, IndexError> {
        let arena = self.arena(pool)?;
        Ok(arena[..words as usize]
            .iter()
            .map(|word| word.load(Ordering::Relaxed))
            .collect())
    }

    fn arena(&self, pool: u32) -> Result<&[AtomicU32], IndexError> {
        self.pools
            .get(pool as usize)
            .and_then(OnceLock::get)
            .map(|arena| &arena[..])
            .ok_or_else(|| corrupt(format!("pool {} is not allocated", pool)))
    }

    /// Finds room for `words` words, moving to a fresh arena if the current
    /// one is too full.
    fn allocate(&self, cursor: &mut PoolCursor, words: u32) -> Result<(u32, u32), IndexError> {
        debug_assert!(words <= self.max_pool_size);
        if cursor.offset + words <= self.max_pool_size {
            let at = (cursor.segment, cursor.offset);
            cursor.offset += words;
            return Ok(at);
        }
        let next = cursor.segment + 1;
        if next >= self.number_of_pools {
            log::warn!(
                "segment pool exhausted: {} pools of {} words",
                self.number_of_pools,
                self.max_pool_size
            );
            return Err(IndexError::OutOfCapacity {
                pools: self.number_of_pools,
                pool_size: self.max_pool_size,
            });
        }
        self.pools[next as usize].get_or_init(|| {
            log::info!(
                "allocating segment pool arena {} of {} ({} words)",
                next + 1,
                self.number_of_pools,
                self.max_pool_size
            );
            new_arena(self.max_pool_size)
        });
        cursor.segment = next;
        cursor.offset = words;
        Ok((next, 0))
    }

    /// Whether records of the given sizes, appended in order, would all fit.
    pub fn fits(&self, sizes: &[u32]) -> bool {
        let mut cursor = self.cursor();
        sizes.iter().all(|&words| {
            if cursor.offset + words <= self.max_pool_size {
                cursor.offset += words;
                true
            } else if cursor.segment + 1 < self.number_of_pools {
                cursor.segment += 1;
                cursor.offset = words;
                true
            } else {
                false
            }
        })
    }

    /// Seals one batch of postings (in traversal order) into a block chained
    /// after `tail`.
    pub fn compress_and_append(
        &self,
        doc_ids: &[DocId],
        scores: &[Score],
        tail: BlockPointer,
    ) -> Result<BlockPointer, IndexError> {
        let block = SealedBlock::encode(doc_ids, scores, self.orientation);
        self.append_block(&block, tail)
    }

    /// Writes an encoded block and links it to `tail`, the most recently
    /// sealed block of the same list.
    ///
    /// Forward lists link old -> new, so `tail`'s link word is set to the new
    /// block. Reverse lists link new -> old, so the new record carries `tail`
    /// in its own link word.
    pub fn append_block(
        &self,
        block: &SealedBlock,
        tail: BlockPointer,
    ) -> Result<BlockPointer, IndexError> {
        let words = block.required_words();
        let mut cursor = self.cursor.lock();
        let (pool, offset) = self.allocate(&mut cursor, words)?;
        let arena = self.arena(pool)?;

        let link = if self.orientation.is_reverse() {
            tail
        } else {
            BlockPointer::UNDEFINED
        };
        let header = [
            words,
            link.raw(),
            block.extreme_doc_id,
            block.count,
            block.doc_words.len() as u32,
        ];
        let score_len = block.score_words.len() as u32;
        let record = header
            .iter()
            .chain(&block.doc_words)
            .chain(std::iter::once(&score_len))
            .chain(&block.score_words);
        for (slot, &word) in arena[offset as usize..].iter().zip(record) {
            slot.store(word, Ordering::Relaxed);
        }

        let ptr = BlockPointer::new(pool, offset);
        if !self.orientation.is_reverse() {
            if let Some(tail) = tail.defined() {
                let tail_arena = self.arena(tail.pool())?;
                tail_arena[(tail.offset() + LINK_IDX) as usize]
                    .store(ptr.raw(), Ordering::SeqCst);
            }
        }
        drop(cursor);

        log::debug!(
            "sealed block of {} postings at {:?} ({} words)",
            block.count,
            ptr,
            words
        );
        Ok(ptr)
    }

    fn header(&self, ptr: BlockPointer) -> Result<BlockHeader, IndexError> {
        let arena = self.arena(ptr.pool())?;
        let start = ptr.offset() as usize;
        if start + RECORD_OVERHEAD as usize > arena.len() {
            return Err(corrupt(format!("block pointer {:?} out of bounds", ptr)));
        }
        let word = |idx: u32| arena[start + idx as usize].load(Ordering::Relaxed);

        let req_space = word(REQ_SPACE_IDX) as usize;
        let count = word(COUNT_IDX) as usize;
        let doc_len = word(DOC_LEN_IDX) as usize;
        if req_space < RECORD_OVERHEAD as usize || start + req_space > arena.len() {
            return Err(corrupt(format!(
                "block at {:?} claims {} words",
                ptr, req_space
            )));
        }
        if count == 0 || count > BLOCK_SIZE {
            return Err(corrupt(format!(
                "block at {:?} holds {} postings",
                ptr, count
            )));
        }
        let doc_start = start + HEADER_WORDS as usize;
        let score_len_idx = doc_start + doc_len;
        if score_len_idx >= start + req_space {
            return Err(corrupt(format!(
                "block at {:?} has docID payload of {} words",
                ptr, doc_len
            )));
        }
        let score_len = arena[score_len_idx].load(Ordering::Relaxed) as usize;
        if RECORD_OVERHEAD as usize + doc_len + score_len != req_space {
            return Err(corrupt(format!(
                "block at {:?} payload lengths do not add up",
                ptr
            )));
        }

        Ok(BlockHeader {
            link: BlockPointer::from_raw(arena[start + LINK_IDX as usize].load(Ordering::SeqCst)),
            extreme_doc_id: word(EXTREME_IDX),
            count,
            doc_start,
            doc_len,
            score_start: score_len_idx + 1,
            score_len,
        })
    }

    fn copy_words(&self, pool: u32, start: usize, len: usize) -> Result<Vec<u32>, IndexError> {
        let arena = self.arena(pool)?;
        Ok(arena[start..start + len]
            .iter()
            .map(|word| word.load(Ordering::Relaxed))
            .collect())
    }

    /// The adjacent block in traversal order, or `UNDEFINED`.
    pub fn next_pointer(&self, ptr: BlockPointer) -> Result<BlockPointer, IndexError> {
        match ptr.defined() {
            Some(ptr) => Ok(self.header(ptr)?.link),
            None => Ok(BlockPointer::UNDEFINED),
        }
    }

    /// Last docID of the block in traversal order.
    pub fn extreme_doc_id(&self, ptr: BlockPointer) -> Result<Option<DocId>, IndexError> {
        match ptr.defined() {
            Some(ptr) => Ok(Some(self.header(ptr)?.extreme_doc_id)),
            None => Ok(None),
        }
    }

    /// Follows links from `ptr` while the current block ends before `pivot`,
    /// visiting at most `limit` blocks. Returns the first block that may
    /// contain `pivot` (or `UNDEFINED`) and how many blocks were skipped.
    pub fn next_pointer_past(
        &self,
        mut ptr: BlockPointer,
        pivot: DocId,
        limit: u32,
    ) -> Result<(BlockPointer, u32), IndexError> {
        let mut skipped = 0;
        while skipped < limit {
            let Some(current) = ptr.defined() else {
                break;
            };
            let header = self.header(current)?;
            if !self.orientation.before(header.extreme_doc_id, pivot) {
                break;
            }
            ptr = header.link;
            skipped += 1;
        }
        if skipped == limit {
            ptr = BlockPointer::UNDEFINED;
        }
        Ok((ptr, skipped))
    }

    /// Decodes the block's docIDs (in traversal order) into `out` and returns
    /// the posting count. The undefined pointer yields 0.
    pub fn decompress_docid_block(
        &self,
        out: &mut Vec<DocId>,
        ptr: BlockPointer,
    ) -> Result<usize, IndexError> {
        let Some(ptr) = ptr.defined() else {
            out.clear();
            return Ok(0);
        };
        let header = self.header(ptr)?;
        let words = self.copy_words(ptr.pool(), header.doc_start, header.doc_len)?;
        codec::decode_doc_ids(&words, header.count, self.orientation.is_reverse(), out)?;
        if self.orientation.extreme(out) != Some(header.extreme_doc_id) {
            return Err(corrupt(format!(
                "block at {:?} does not end at its recorded docID",
                ptr
            )));
        }
        Ok(header.count)
    }

    pub fn decompress_score_block(
        &self,
        out: &mut Vec<Score>,
        ptr: BlockPointer,
    ) -> Result<usize, IndexError> {
        let Some(ptr) = ptr.defined() else {
            out.clear();
            return Ok(0);
        };
        let header = self.header(ptr)?;
        let words = self.copy_words(ptr.pool(), header.score_start, header.score_len)?;
        codec::decode_scores(&words, header.count, out)?;
        Ok(header.count)
    }

    /// Checks that `ptr` names a record inside the written part of the pool.
    pub(crate) fn validate_pointer(&self, ptr: BlockPointer) -> Result<(), IndexError> {
        let Some(ptr) = ptr.defined() else {
            return Ok(());
        };
        let cursor = self.cursor();
        let written = match ptr.pool().cmp(&cursor.segment) {
            std::cmp::Ordering::Less => self.max_pool_size,
            std::cmp::Ordering::Equal => cursor.offset,
            std::cmp::Ordering::Greater => 0,
        };
        let header = self.header(ptr)?;
        let end = header.score_start + header.score_len;
        if end > written as usize {
            return Err(corrupt(format!(
                "block pointer {:?} reaches past written data",
                ptr
            )));
        }
        Ok(())
    }
}
