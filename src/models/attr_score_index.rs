use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config_loader::IndexConfig;

use super::{
    common::IndexError,
    dictionary::{Dictionary, TermDictionary},
    filter::Filter,
    head_pointers::{HeadPointer, HeadPointers},
    intersection::{intersect_svs, Algorithm, ListSnapshot, PostingCursor, RetrieveResult},
    ordering::{DocOrder, Forward, Orientation, Reverse},
    posting_buffer::{PostingBuffer, PostingBuffers},
    segment_pool::{SealedBlock, SegmentPool},
    types::{DocId, Posting, Score, TermId, Weight},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub num_docs: u64,
    pub max_doc_id: Option<DocId>,
}

pub(crate) struct IndexInner {
    pub config: IndexConfig,
    pub orientation: Orientation,
    pub pool: SegmentPool,
    pub buffers: PostingBuffers,
    pub heads: HeadPointers,
    pub dictionary: RwLock<TermDictionary>,
    pub counters: Mutex<Counters>,
    /// Held by the writer for each mutation and by `save`, so a persisted
    /// image never captures half an insertion.
    pub write_lock: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub reverse: bool,
    pub terms: usize,
    pub num_docs: u64,
    pub max_doc_id: Option<DocId>,
    pub pools_in_use: u32,
    pub number_of_pools: u32,
    pub max_pool_size: u32,
    pub used_words: u64,
}

/// Compressed inverted index whose postings carry a per-document score.
///
/// The index owns its storage. Mutation goes through the single
/// [`IndexWriter`] handed out by [`writer`](Self::writer); queries go through
/// any number of [`IndexReader`]s, which may run while the writer is
/// inserting.
pub struct AttrScoreInvertedIndex {
    inner: Arc<IndexInner>,
    writer_taken: AtomicBool,
}

impl AttrScoreInvertedIndex {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let orientation = Orientation::from_reverse(config.reverse);
        let pool = SegmentPool::new(config.max_pool_size, config.number_of_pools, orientation)?;
        let buffers = PostingBuffers::new(config.initial_buffer_capacity);
        let dictionary = TermDictionary::new(config.max_terms);
        log::info!(
            "created {} index with {} pools of {} words",
            if orientation.is_reverse() { "reverse" } else { "forward" },
            config.number_of_pools,
            config.max_pool_size
        );

        Ok(Self::from_inner(IndexInner {
            config,
            orientation,
            pool,
            buffers,
            heads: HeadPointers::new(),
            dictionary: RwLock::new(dictionary),
            counters: Mutex::new(Counters::default()),
            write_lock: Mutex::new(()),
        }))
    }

    pub(crate) fn from_inner(inner: IndexInner) -> Self {
        Self {
            inner: Arc::new(inner),
            writer_taken: AtomicBool::new(false),
        }
    }

    pub(crate) fn inner(&self) -> &IndexInner {
        &self.inner
    }

    /// The index's only writer. Fails with [`IndexError::WriterTaken`] on
    /// every call after the first.
    pub fn writer(&self) -> Result<IndexWriter, IndexError> {
        if self.writer_taken.swap(true, Ordering::SeqCst) {
            return Err(IndexError::WriterTaken);
        }
        Ok(IndexWriter {
            inner: self.inner.clone(),
        })
    }

    pub fn reader(&self) -> IndexReader {
        IndexReader {
            inner: self.inner.clone(),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.inner.orientation
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.stats()
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = std::io::BufWriter::new(file);
        self.save(&mut writer)?;
        std::io::Write::flush(&mut writer)?;
        log::info!("saved index to {}", path.as_ref().display());
        Ok(())
    }

    /// Loads an index written by [`save_to_path`](Self::save_to_path).
    ///
    /// Orientation and pool geometry come from the file; `config` supplies the
    /// runtime knobs (buffer growth, flush threshold, dictionary limit).
    pub fn load_from_path(
        path: impl AsRef<Path>,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut reader = std::io::BufReader::new(file);
        let index = Self::load(&mut reader, config)?;
        log::info!("loaded index from {}", path.as_ref().display());
        Ok(index)
    }
}

impl IndexInner {
    fn stats(&self) -> IndexStats {
        let counters = *self.counters.lock();
        IndexStats {
            reverse: self.orientation.is_reverse(),
            terms: self.dictionary.read().size(),
            num_docs: counters.num_docs,
            max_doc_id: counters.max_doc_id,
            pools_in_use: self.pool.pools_in_use(),
            number_of_pools: self.pool.number_of_pools(),
            max_pool_size: self.pool.max_pool_size(),
            used_words: self.pool.used_words(),
        }
    }

    /// Consistent view of one term's list, or `None` if it has no postings.
    pub(crate) fn snapshot(&self, term: TermId) -> Option<ListSnapshot> {
        let buffer = self.buffers.terms().get(term)?;
        let guard = buffer.read();
        let head = self.heads.state_of(term);
        if head.document_frequency == 0 {
            return None;
        }
        let (buffer_doc_ids, buffer_scores) = guard.traversal_batch(None, self.orientation);
        Some(ListSnapshot {
            term,
            document_frequency: head.document_frequency,
            buffer_doc_ids,
            buffer_scores,
            entry: head.entry,
            block_count: head.block_count,
        })
    }

    fn slots(&self, term: TermId) -> (Arc<RwLock<PostingBuffer>>, Arc<HeadPointer>) {
        let buffer = self
            .buffers
            .terms()
            .get_or_create(term, || RwLock::new(PostingBuffer::new()));
        let head = self.heads.get_or_create(term, HeadPointer::new);
        (buffer, head)
    }

    /// Inserts the postings of one document, all or nothing.
    ///
    /// Postings are `(term, score, occurrences)` with distinct terms.
    fn insert_postings(
        &self,
        doc_id: DocId,
        postings: &[(TermId, Score, u32)],
    ) -> Result<(), IndexError> {
        let initial_capacity = self.buffers.initial_capacity();
        let mut staged = Vec::with_capacity(postings.len());
        let mut sealed_sizes = Vec::new();

        for &(term, score, occurrences) in postings {
            let (buffer, head) = self.slots(term);
            let block = {
                let guard = buffer.read();
                if !guard.accepts(doc_id) {
                    return Err(IndexError::OutOfOrder {
                        term,
                        last: guard.last_doc_id().unwrap_or_default(),
                        doc: doc_id,
                    });
                }
                if guard.seals_on_push() {
                    let (doc_ids, scores) =
                        guard.traversal_batch(Some((doc_id, score)), self.orientation);
                    let block = SealedBlock::encode(&doc_ids, &scores, self.orientation);
                    sealed_sizes.push(block.required_words());
                    Some(block)
                } else {
                    None
                }
            };
            staged.push((buffer, head, score, occurrences, block));
        }

        if !self.pool.fits(&sealed_sizes) {
            log::warn!(
                "rejecting document {}: {} blocks do not fit in the segment pool",
                doc_id,
                sealed_sizes.len()
            );
            return Err(IndexError::OutOfCapacity {
                pools: self.pool.number_of_pools(),
                pool_size: self.pool.max_pool_size(),
            });
        }

        for (buffer, head, score, occurrences, block) in staged {
            let mut guard = buffer.write();
            match block {
                Some(block) => {
                    let ptr = self.pool.append_block(&block, head.last())?;
                    head.publish_block(ptr, self.orientation);
                    guard.mark_sealed(doc_id);
                }
                None => guard.push(doc_id, score, initial_capacity),
            }
            head.record_posting(occurrences);
        }

        let mut counters = self.counters.lock();
        counters.max_doc_id = counters.max_doc_id.max(Some(doc_id));
        Ok(())
    }

    /// Seals every buffer holding at least `min_postings` postings.
    fn flush(&self, min_postings: usize) -> Result<usize, IndexError> {
        let min_postings = min_postings.max(1);
        let mut sealed = 0;
        for (id, buffer) in self.buffers.terms().to_list().into_iter().enumerate() {
            let mut guard = buffer.write();
            if guard.len() < min_postings {
                continue;
            }
            let Some(last_doc_id) = guard.last_doc_id() else {
                continue;
            };
            let term = TermId(id as u32);
            let head = self.heads.get_or_create(term, HeadPointer::new);
            let (doc_ids, scores) = guard.traversal_batch(None, self.orientation);
            let ptr = self.pool.compress_and_append(&doc_ids, &scores, head.last())?;
            head.publish_block(ptr, self.orientation);
            guard.mark_sealed(last_doc_id);
            sealed += 1;
        }
        if sealed > 0 {
            log::debug!("flush sealed {} buffers", sealed);
        }
        Ok(sealed)
    }

    fn retrieve_ids<O: DocOrder>(
        &self,
        algorithm: Algorithm,
        terms: &[(TermId, Weight)],
        filter: Option<&dyn Filter>,
        hits: usize,
    ) -> Result<RetrieveResult, IndexError> {
        if terms.is_empty() || hits == 0 {
            return Ok(RetrieveResult::default());
        }
        let mut merged: Vec<(TermId, Weight)> = terms.to_vec();
        merged.sort_unstable_by_key(|&(term, _)| term);
        merged.dedup_by(|next, kept| {
            if next.0 == kept.0 {
                kept.1 = kept.1.saturating_add(next.1);
                true
            } else {
                false
            }
        });

        let mut lists = Vec::with_capacity(merged.len());
        for (term, weight) in merged {
            match self.snapshot(term) {
                Some(snapshot) => lists.push((snapshot, weight)),
                None => return Ok(RetrieveResult::default()),
            }
        }
        intersect_svs::<O>(&self.pool, lists, filter, algorithm, hits)
    }

    pub(crate) fn postings<O: DocOrder>(&self, term: TermId) -> Result<Vec<Posting>, IndexError> {
        let Some(snapshot) = self.snapshot(term) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(snapshot.document_frequency as usize);
        let mut cursor = PostingCursor::<O>::new(&self.pool, snapshot)?;
        while let Some(doc_id) = cursor.doc() {
            out.push(Posting {
                doc_id,
                score: cursor.score()?,
            });
            cursor.next()?;
        }
        Ok(out)
    }
}

/// Exclusive mutation handle of an [`AttrScoreInvertedIndex`].
pub struct IndexWriter {
    inner: Arc<IndexInner>,
}

impl IndexWriter {
    /// Adds document `doc_id` with its `(term, score)` pairs.
    ///
    /// DocIDs must increase from one document to the next within every term
    /// they share. A term repeated inside one document becomes a single
    /// posting whose score is the sum of the repeats. On error no posting of
    /// the document is stored, although new term strings may already have
    /// been registered in the dictionary.
    pub fn insert_doc(&mut self, doc_id: DocId, terms: &[(&str, Score)]) -> Result<(), IndexError> {
        let _guard = self.inner.write_lock.lock();

        let mut folded: FxHashMap<TermId, (Score, u32)> = FxHashMap::default();
        {
            let mut dictionary = self.inner.dictionary.write();
            for &(text, score) in terms {
                let term = dictionary
                    .insert_term(text)
                    .ok_or(IndexError::DictionaryFull)?;
                let entry = folded.entry(term).or_insert((0, 0));
                entry.0 = entry.0.saturating_add(score);
                entry.1 += 1;
            }
        }
        let mut postings: Vec<(TermId, Score, u32)> = folded
            .into_iter()
            .map(|(term, (score, occurrences))| (term, score, occurrences))
            .collect();
        postings.sort_unstable_by_key(|&(term, _, _)| term);

        self.inner.insert_postings(doc_id, &postings)?;
        self.inner.counters.lock().num_docs += 1;
        Ok(())
    }

    /// Appends a single posting to `term`, bypassing the dictionary.
    pub fn insert_posting(
        &mut self,
        term: TermId,
        doc_id: DocId,
        score: Score,
    ) -> Result<(), IndexError> {
        let _guard = self.inner.write_lock.lock();
        self.inner.insert_postings(doc_id, &[(term, score, 1)])
    }

    /// Seals buffers holding at least `flush_min_postings` postings and
    /// returns how many were sealed.
    pub fn flush(&mut self) -> Result<usize, IndexError> {
        let _guard = self.inner.write_lock.lock();
        self.inner.flush(self.inner.config.flush_min_postings)
    }

    pub fn reader(&self) -> IndexReader {
        IndexReader {
            inner: self.inner.clone(),
        }
    }
}

/// Shared query handle. Cheap to clone and safe to use from many threads.
#[derive(Clone)]
pub struct IndexReader {
    inner: Arc<IndexInner>,
}

impl IndexReader {
    /// Resolves `terms` through the dictionary and intersects their lists.
    /// A term the dictionary has never seen makes the result empty.
    pub fn retrieve(
        &self,
        algorithm: Algorithm,
        terms: &[(&str, Weight)],
        filter: Option<&dyn Filter>,
        hits: usize,
    ) -> Result<RetrieveResult, IndexError> {
        let mut ids = Vec::with_capacity(terms.len());
        {
            let dictionary = self.inner.dictionary.read();
            for &(text, weight) in terms {
                match dictionary.get_term_id(text) {
                    Some(term) => ids.push((term, weight)),
                    None => return Ok(RetrieveResult::default()),
                }
            }
        }
        self.retrieve_ids(algorithm, &ids, filter, hits)
    }

    pub fn retrieve_ids(
        &self,
        algorithm: Algorithm,
        terms: &[(TermId, Weight)],
        filter: Option<&dyn Filter>,
        hits: usize,
    ) -> Result<RetrieveResult, IndexError> {
        match self.inner.orientation {
            Orientation::Forward => {
                self.inner
                    .retrieve_ids::<Forward>(algorithm, terms, filter, hits)
            }
            Orientation::Reverse => {
                self.inner
                    .retrieve_ids::<Reverse>(algorithm, terms, filter, hits)
            }
        }
    }

    /// Runs independent queries in parallel.
    pub fn retrieve_batch(
        &self,
        algorithm: Algorithm,
        queries: &[Vec<(&str, Weight)>],
        filter: Option<&dyn Filter>,
        hits: usize,
    ) -> Result<Vec<RetrieveResult>, IndexError> {
        queries
            .par_iter()
            .map(|terms| self.retrieve(algorithm, terms, filter, hits))
            .collect()
    }

    pub fn term_id(&self, text: &str) -> Option<TermId> {
        self.inner.dictionary.read().get_term_id(text)
    }

    pub fn document_frequency(&self, term: TermId) -> u32 {
        self.inner.heads.state_of(term).document_frequency
    }

    pub fn collection_frequency(&self, term: TermId) -> u64 {
        self.inner.heads.state_of(term).collection_frequency
    }

    /// Every posting of `term` in traversal order.
    pub fn postings(&self, term: TermId) -> Result<Vec<Posting>, IndexError> {
        match self.inner.orientation {
            Orientation::Forward => self.inner.postings::<Forward>(term),
            Orientation::Reverse => self.inner.postings::<Reverse>(term),
        }
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.stats()
    }
}
