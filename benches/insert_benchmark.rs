use attrscore::{config_loader::IndexConfig, models::bench_common};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const NUM_OF_DOCS: usize = 50_000;
const VOCABULARY: usize = 5_000;
const TERMS_PER_DOC: usize = 20;

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insert Benchmark");
    group.sample_size(10);
    println!("Generating {} documents..", NUM_OF_DOCS);
    let documents =
        bench_common::generate_random_documents(NUM_OF_DOCS, VOCABULARY, TERMS_PER_DOC, 2024);
    group.throughput(Throughput::Elements(NUM_OF_DOCS as u64));

    for reverse in [false, true] {
        group.bench_function(
            BenchmarkId::new("insert_doc", if reverse { "reverse" } else { "forward" }),
            |b| {
                b.iter(|| {
                    let config = IndexConfig {
                        reverse,
                        ..Default::default()
                    };
                    bench_common::build_index(config, &documents).unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, insert_benchmark);
criterion_main!(benches);
