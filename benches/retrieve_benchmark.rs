use attrscore::{
    config_loader::IndexConfig, models::bench_common, Algorithm, BitsetFilter, Weight,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const NUM_OF_DOCS: usize = 200_000;
const VOCABULARY: usize = 10_000;
const TERMS_PER_DOC: usize = 30;
const NUM_OF_QUERIES: usize = 100;

fn retrieve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Retrieve Benchmark");
    group
        .sample_size(10)
        .measurement_time(std::time::Duration::new(20, 0));
    println!("Creating index over {} documents..", NUM_OF_DOCS);

    let documents =
        bench_common::generate_random_documents(NUM_OF_DOCS, VOCABULARY, TERMS_PER_DOC, 2024);
    let index = bench_common::build_index(IndexConfig::default(), &documents).unwrap();
    let reader = index.reader();
    let filter = BitsetFilter::from_ids(
        NUM_OF_DOCS as u32,
        (0..NUM_OF_DOCS as u32).filter(|doc| doc % 3 != 0),
    );

    for len in [1, 2, 4] {
        let queries = bench_common::generate_random_queries(NUM_OF_QUERIES, len, 50, 7);
        let queries: Vec<Vec<(&str, Weight)>> = queries
            .iter()
            .map(|query| query.iter().map(|(t, w)| (t.as_str(), *w)).collect())
            .collect();

        for (name, algorithm) in [("svs", Algorithm::SvS), ("svs_ranked", Algorithm::SvSRanked)] {
            group.bench_function(BenchmarkId::new(name, format!("{} terms", len)), |b| {
                b.iter(|| {
                    for query in &queries {
                        reader.retrieve(algorithm, query, None, 10).unwrap();
                    }
                });
            });
        }
        group.bench_function(BenchmarkId::new("svs_filtered", format!("{} terms", len)), |b| {
            b.iter(|| {
                for query in &queries {
                    reader
                        .retrieve(Algorithm::SvS, query, Some(&filter), 10)
                        .unwrap();
                }
            });
        });
        group.bench_function(BenchmarkId::new("svs_batch", format!("{} terms", len)), |b| {
            b.iter(|| {
                reader
                    .retrieve_batch(Algorithm::SvSRanked, &queries, None, 10)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, retrieve_benchmark);
criterion_main!(benches);
