use attrscore::{
    config_loader::IndexConfig, models::bench_common, Algorithm, IndexError, IndexReader, Weight,
};
use rayon::prelude::*;

/// Runs every query in parallel and returns the total number of matches.
/// The first failing query aborts the count.
fn matched_documents(
    reader: &IndexReader,
    queries: &[Vec<(String, Weight)>],
    hits: usize,
) -> Result<usize, IndexError> {
    queries
        .par_iter()
        .map(|query| {
            let query: Vec<(&str, Weight)> =
                query.iter().map(|(t, w)| (t.as_str(), *w)).collect();
            reader
                .retrieve(Algorithm::SvSRanked, &query, None, hits)
                .map(|result| result.len())
        })
        .sum()
}

// Builds a synthetic index and hammers it with parallel queries; meant to be
// run under a profiler.
fn main() {
    let num_docs = 500_000;
    let vocabulary = 20_000;

    let documents = bench_common::generate_random_documents(num_docs, vocabulary, 25, 2024);
    let config = IndexConfig {
        max_pool_size: 1 << 22,
        ..Default::default()
    };
    let index = match bench_common::build_index(config, &documents) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("failed to build index: {}", err);
            return;
        }
    };
    drop(documents);

    let queries = bench_common::generate_random_queries(10_000, 3, 200, 7);
    match matched_documents(&index.reader(), &queries, 100) {
        Ok(matched) => println!("{} queries matched {} documents", queries.len(), matched),
        Err(err) => eprintln!("query load failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_documents_sums_every_query() {
        let documents = bench_common::generate_random_documents(2000, 50, 5, 1);
        let index = bench_common::build_index(IndexConfig::default(), &documents).unwrap();
        let reader = index.reader();
        let queries = bench_common::generate_random_queries(20, 2, 5, 3);

        let expected: usize = queries
            .iter()
            .map(|query| {
                let query: Vec<(&str, Weight)> =
                    query.iter().map(|(t, w)| (t.as_str(), *w)).collect();
                reader
                    .retrieve(Algorithm::SvSRanked, &query, None, 10)
                    .unwrap()
                    .len()
            })
            .sum();
        assert!(expected > 0);
        assert_eq!(matched_documents(&reader, &queries, 10).unwrap(), expected);
    }
}
