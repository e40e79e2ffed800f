//! Corpus and query generators shared by the benchmarks and the profiling
//! binary.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    attr_score_index::AttrScoreInvertedIndex,
    common::IndexError,
    types::{DocId, Score, Weight},
};
use crate::config_loader::IndexConfig;

pub fn term_name(rank: usize) -> String {
    format!("t{}", rank)
}

/// Random documents over a skewed vocabulary. Ranks are drawn from the cube
/// of a uniform sample, so low ranks fill many blocks while the tail stays in
/// posting buffers.
pub fn generate_random_documents(
    num_docs: usize,
    vocabulary: usize,
    terms_per_doc: usize,
    seed: u64,
) -> Vec<(DocId, Vec<(String, Score)>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_docs)
        .map(|doc| {
            let terms = (0..terms_per_doc)
                .map(|_| {
                    let rank = (vocabulary as f64 * rng.gen::<f64>().powi(3)) as usize;
                    (term_name(rank.min(vocabulary - 1)), rng.gen_range(1..1000))
                })
                .collect();
            (doc as DocId, terms)
        })
        .collect()
}

pub fn build_index(
    config: IndexConfig,
    documents: &[(DocId, Vec<(String, Score)>)],
) -> Result<AttrScoreInvertedIndex, IndexError> {
    let index = AttrScoreInvertedIndex::new(config)?;
    let mut writer = index.writer()?;
    for (doc_id, terms) in documents {
        let terms: Vec<(&str, Score)> = terms
            .iter()
            .map(|(term, score)| (term.as_str(), *score))
            .collect();
        writer.insert_doc(*doc_id, &terms)?;
    }
    Ok(index)
}

/// Queries of `len` distinct terms drawn from the `head` most frequent ones.
pub fn generate_random_queries(
    count: usize,
    len: usize,
    head: usize,
    seed: u64,
) -> Vec<Vec<(String, Weight)>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut ranks: Vec<usize> = Vec::with_capacity(len);
            while ranks.len() < len.min(head) {
                let rank = rng.gen_range(0..head);
                if !ranks.contains(&rank) {
                    ranks.push(rank);
                }
            }
            ranks
                .into_iter()
                .map(|rank| (term_name(rank), rng.gen_range(1..10)))
                .collect()
        })
        .collect()
}
