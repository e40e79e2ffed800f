//! Set-vs-Set intersection over postings lists.
//!
//! Lists are read through [`PostingCursor`], which walks a term's buffered
//! postings and its sealed blocks in traversal order, decompressing one block
//! at a time and skipping whole blocks whose last docID is still before the
//! seek target.

use std::mem;

use serde::Serialize;

use super::{
    common::{corrupt, IndexError},
    filter::Filter,
    ordering::DocOrder,
    segment_pool::SegmentPool,
    types::{BlockPointer, DocId, Score, TermId, Weight},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// First `hits` matches in traversal order.
    SvS,
    /// The `hits` matches with the highest summed score.
    SvSRanked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrieveResult {
    pub doc_ids: Vec<DocId>,
    pub scores: Vec<u64>,
}

impl RetrieveResult {
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    fn push(&mut self, doc_id: DocId, score: u64) {
        self.doc_ids.push(doc_id);
        self.scores.push(score);
    }

    fn truncate(&mut self, len: usize) {
        self.doc_ids.truncate(len);
        self.scores.truncate(len);
    }
}

/// Point-in-time view of one term's postings list.
///
/// Taken while holding the term's buffer lock, so the buffered postings and
/// the block chain (`entry` followed for `block_count` blocks) never overlap
/// or leave a gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub term: TermId,
    pub document_frequency: u32,
    /// Buffered postings in traversal order.
    pub buffer_doc_ids: Vec<DocId>,
    pub buffer_scores: Vec<Score>,
    pub entry: BlockPointer,
    pub block_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Buffer,
    Block(BlockPointer),
    Exhausted,
}

/// Reads one list in traversal order. Forward lists yield their blocks
/// first and the buffer last; reverse lists start with the buffer.
pub struct PostingCursor<'a, O: DocOrder> {
    pool: &'a SegmentPool,
    source: Source,
    doc_ids: Vec<DocId>,
    scores: Vec<Score>,
    scores_loaded: bool,
    pos: usize,
    pending_buffer: Option<(Vec<DocId>, Vec<Score>)>,
    next_block: BlockPointer,
    blocks_left: u32,
    order: std::marker::PhantomData<O>,
}

impl<'a, O: DocOrder> PostingCursor<'a, O> {
    pub fn new(pool: &'a SegmentPool, snapshot: ListSnapshot) -> Result<Self, IndexError> {
        let mut cursor = Self {
            pool,
            source: Source::Exhausted,
            doc_ids: Vec::new(),
            scores: Vec::new(),
            scores_loaded: false,
            pos: 0,
            pending_buffer: Some((snapshot.buffer_doc_ids, snapshot.buffer_scores)),
            next_block: snapshot.entry,
            blocks_left: snapshot.block_count,
            order: std::marker::PhantomData,
        };
        cursor.load_next(None)?;
        Ok(cursor)
    }

    /// Current docID, `None` once the list is exhausted.
    pub fn doc(&self) -> Option<DocId> {
        match self.source {
            Source::Exhausted => None,
            _ => self.doc_ids.get(self.pos).copied(),
        }
    }

    pub fn is_reading_buffer(&self) -> bool {
        self.source == Source::Buffer
    }

    /// Score of the current posting. Block scores are only decompressed the
    /// first time one of them is needed.
    pub fn score(&mut self) -> Result<Score, IndexError> {
        if !self.scores_loaded {
            let Source::Block(ptr) = self.source else {
                return Err(corrupt("score requested from an exhausted cursor"));
            };
            self.pool.decompress_score_block(&mut self.scores, ptr)?;
            self.scores_loaded = true;
        }
        self.scores
            .get(self.pos)
            .copied()
            .ok_or_else(|| corrupt("score requested past the end of a block"))
    }

    /// Steps to the next posting.
    pub fn next(&mut self) -> Result<bool, IndexError> {
        if self.source == Source::Exhausted {
            return Ok(false);
        }
        self.pos += 1;
        if self.pos < self.doc_ids.len() {
            return Ok(true);
        }
        self.load_next(None)
    }

    /// Moves to the first posting that is not before `pivot`. Returns false
    /// when the list runs out first.
    pub fn advance(&mut self, pivot: DocId) -> Result<bool, IndexError> {
        loop {
            if self.source == Source::Exhausted {
                return Ok(false);
            }
            if let Some(&last) = self.doc_ids.last() {
                if !O::before(last, pivot) {
                    self.pos = gallop::<O>(&self.doc_ids, self.pos, pivot);
                    return Ok(true);
                }
            }
            if !self.load_next(Some(pivot))? {
                return Ok(false);
            }
        }
    }

    /// Loads the next non-empty chunk, skipping blocks that end before
    /// `pivot`.
    fn load_next(&mut self, pivot: Option<DocId>) -> Result<bool, IndexError> {
        loop {
            let buffer_turn = O::REVERSE || self.blocks_left == 0;
            if buffer_turn {
                if let Some((doc_ids, scores)) = self.pending_buffer.take() {
                    if doc_ids.is_empty() {
                        continue;
                    }
                    self.doc_ids = doc_ids;
                    self.scores = scores;
                    self.scores_loaded = true;
                    self.pos = 0;
                    self.source = Source::Buffer;
                    return Ok(true);
                }
            }
            if self.blocks_left == 0 {
                self.source = Source::Exhausted;
                self.doc_ids.clear();
                return Ok(false);
            }

            let mut ptr = self.next_block;
            if let Some(pivot) = pivot {
                let (found, skipped) = self.pool.next_pointer_past(ptr, pivot, self.blocks_left)?;
                self.blocks_left -= skipped;
                if self.blocks_left == 0 {
                    continue;
                }
                ptr = found;
            }
            if ptr.is_undefined() {
                return Err(corrupt("block chain ends before its recorded length"));
            }

            self.pool
                .decompress_docid_block(&mut self.doc_ids, ptr)?;
            self.scores_loaded = false;
            self.pos = 0;
            self.source = Source::Block(ptr);
            self.blocks_left -= 1;
            self.next_block = if self.blocks_left > 0 {
                self.pool.next_pointer(ptr)?
            } else {
                BlockPointer::UNDEFINED
            };
            return Ok(true);
        }
    }
}

/// First index at or after `from` whose docID is not before `pivot`.
///
/// Probes `from + 1, + 2, + 4, ...` until it passes `pivot`, then binary
/// searches the bracketed range.
pub fn gallop<O: DocOrder>(doc_ids: &[DocId], from: usize, pivot: DocId) -> usize {
    let len = doc_ids.len();
    if from >= len || !O::before(doc_ids[from], pivot) {
        return from.min(len);
    }
    let mut lo = from;
    let mut step = 1;
    loop {
        let hi = lo + step;
        if hi >= len || !O::before(doc_ids[hi], pivot) {
            let hi = hi.min(len);
            return lo + 1 + doc_ids[lo + 1..hi].partition_point(|&doc| O::before(doc, pivot));
        }
        lo = hi;
        step <<= 1;
    }
}

/// First eligible docID at or after `pivot`.
fn seek_filter<O: DocOrder>(filter: &dyn Filter, pivot: DocId) -> Option<DocId> {
    if filter.test(pivot) {
        Some(pivot)
    } else {
        filter.find_next(pivot, O::REVERSE)
    }
}

#[inline]
fn weighted(weight: Weight, score: Score) -> u64 {
    weight as u64 * score as u64
}

/// Scans a single list, gated by `filter` when one is given.
pub fn scan_single<O: DocOrder>(
    cursor: &mut PostingCursor<'_, O>,
    weight: Weight,
    filter: Option<&dyn Filter>,
    limit: usize,
    out: &mut RetrieveResult,
) -> Result<(), IndexError> {
    let Some(filter) = filter else {
        while out.len() < limit {
            let Some(doc) = cursor.doc() else {
                break;
            };
            let score = cursor.score()?;
            out.push(doc, weighted(weight, score));
            if !cursor.next()? {
                break;
            }
        }
        return Ok(());
    };

    let Some(mut pivot) = filter.find_first(O::REVERSE) else {
        return Ok(());
    };
    while out.len() < limit {
        if !cursor.advance(pivot)? {
            break;
        }
        let Some(doc) = cursor.doc() else {
            break;
        };
        if doc == pivot {
            let score = cursor.score()?;
            out.push(doc, weighted(weight, score));
            match filter.find_next(doc, O::REVERSE) {
                Some(next) => pivot = next,
                None => break,
            }
        } else {
            match seek_filter::<O>(filter, doc) {
                Some(next) => pivot = next,
                None => break,
            }
        }
    }
    Ok(())
}

/// Merge-intersects two lists, leapfrogging the lagging side (and the
/// filter, if any) forward to the leading docID.
pub fn intersect_pair<O: DocOrder>(
    first: &mut PostingCursor<'_, O>,
    first_weight: Weight,
    second: &mut PostingCursor<'_, O>,
    second_weight: Weight,
    filter: Option<&dyn Filter>,
    limit: usize,
    out: &mut RetrieveResult,
) -> Result<(), IndexError> {
    let Some(mut pivot) = first.doc() else {
        return Ok(());
    };
    while out.len() < limit {
        if let Some(filter) = filter {
            match seek_filter::<O>(filter, pivot) {
                Some(next) => pivot = next,
                None => break,
            }
        }
        if !first.advance(pivot)? {
            break;
        }
        let Some(doc) = first.doc() else {
            break;
        };
        if doc != pivot {
            pivot = doc;
            continue;
        }
        if !second.advance(pivot)? {
            break;
        }
        let Some(doc) = second.doc() else {
            break;
        };
        if doc != pivot {
            pivot = doc;
            continue;
        }

        let score = weighted(first_weight, first.score()?)
            .saturating_add(weighted(second_weight, second.score()?));
        out.push(pivot, score);
        match O::successor(pivot) {
            Some(next) => pivot = next,
            None => break,
        }
    }
    Ok(())
}

/// Intersects the accumulated candidates with one more list, in place:
/// survivors are compacted to the front and the rest is dropped.
pub fn intersect_accumulated<O: DocOrder>(
    acc: &mut RetrieveResult,
    cursor: &mut PostingCursor<'_, O>,
    weight: Weight,
    limit: usize,
) -> Result<(), IndexError> {
    let mut kept = 0;
    let mut i = 0;
    while i < acc.doc_ids.len() && kept < limit {
        let doc = acc.doc_ids[i];
        if !cursor.advance(doc)? {
            break;
        }
        let Some(current) = cursor.doc() else {
            break;
        };
        if current == doc {
            let score = acc.scores[i].saturating_add(weighted(weight, cursor.score()?));
            acc.doc_ids[kept] = doc;
            acc.scores[kept] = score;
            kept += 1;
            i += 1;
        } else {
            i = gallop::<O>(&acc.doc_ids, i + 1, current);
        }
    }
    acc.truncate(kept);
    Ok(())
}

/// Keeps the `hits` best-scoring candidates, best first; ties keep traversal
/// order.
fn select_top(result: RetrieveResult, hits: usize) -> RetrieveResult {
    let mut ranked: Vec<(usize, DocId, u64)> = result
        .doc_ids
        .into_iter()
        .zip(result.scores)
        .enumerate()
        .map(|(pos, (doc, score))| (pos, doc, score))
        .collect();
    let by_score = |a: &(usize, DocId, u64), b: &(usize, DocId, u64)| {
        b.2.cmp(&a.2).then(a.0.cmp(&b.0))
    };
    if ranked.len() > hits {
        ranked.select_nth_unstable_by(hits, by_score);
        ranked.truncate(hits);
    }
    ranked.sort_unstable_by(by_score);

    let mut top = RetrieveResult::default();
    for (_, doc, score) in ranked {
        top.push(doc, score);
    }
    top
}

/// Set-vs-Set driver.
///
/// Lists are processed in ascending document frequency so the rarest term
/// drives the merge; ties fall back to term id to keep iteration order
/// deterministic. The result does not depend on the order of `lists`.
pub fn intersect_svs<O: DocOrder>(
    pool: &SegmentPool,
    mut lists: Vec<(ListSnapshot, Weight)>,
    filter: Option<&dyn Filter>,
    algorithm: Algorithm,
    hits: usize,
) -> Result<RetrieveResult, IndexError> {
    let mut result = RetrieveResult::default();
    if lists.is_empty() || hits == 0 {
        return Ok(result);
    }
    lists.sort_by_key(|(snapshot, _)| (snapshot.document_frequency, snapshot.term));

    let limit = match algorithm {
        Algorithm::SvS => hits,
        Algorithm::SvSRanked => usize::MAX,
    };
    let last_step = lists.len() - 1;
    let mut lists = lists.into_iter();

    let Some((first, first_weight)) = lists.next() else {
        return Ok(result);
    };
    let first_df = first.document_frequency as usize;
    let mut first = PostingCursor::<O>::new(pool, first)?;

    match lists.next() {
        None => {
            scan_single(&mut first, first_weight, filter, limit.min(first_df), &mut result)?;
        }
        Some((second, second_weight)) => {
            let mut second = PostingCursor::<O>::new(pool, second)?;
            let pair_limit = if last_step == 1 { limit } else { usize::MAX };
            intersect_pair(
                &mut first,
                first_weight,
                &mut second,
                second_weight,
                filter,
                pair_limit,
                &mut result,
            )?;
            for (step, (snapshot, weight)) in lists.enumerate() {
                if result.is_empty() {
                    break;
                }
                let step_limit = if step + 2 == last_step { limit } else { usize::MAX };
                let mut cursor = PostingCursor::<O>::new(pool, snapshot)?;
                intersect_accumulated(&mut result, &mut cursor, weight, step_limit)?;
            }
        }
    }

    Ok(match algorithm {
        Algorithm::SvS => {
            result.truncate(hits);
            result
        }
        Algorithm::SvSRanked => select_top(mem::take(&mut result), hits),
    })
}
