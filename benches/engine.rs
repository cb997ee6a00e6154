use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use punsmith::{PhraseIndex, wordplay};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn bench_prefix_queries(c: &mut Criterion) {
    let index = PhraseIndex::embedded();
    const PREFIXES: &[&str] = &["cat", "con", "sun", "light"];
    for &prefix in PREFIXES {
        c.bench_with_input(
            BenchmarkId::new("phrases_starting_with", prefix),
            &prefix,
            |b, &prefix| {
                let mut rng = SmallRng::seed_from_u64(17);
                b.iter(|| {
                    let results = index.phrases_starting_with(prefix, &mut rng);
                    black_box(results.len());
                });
            },
        );
    }
}

fn bench_constituent_extraction(c: &mut Criterion) {
    let index = PhraseIndex::embedded();
    const PHRASES: &[&str] = &["category", "nightmare", "thunderstorm", "cupcake"];
    for &phrase in PHRASES {
        c.bench_with_input(
            BenchmarkId::new("extract_constituents", phrase),
            &phrase,
            |b, &phrase| {
                b.iter(|| {
                    let constituents = wordplay::extract_constituents(phrase, &index);
                    black_box(constituents.len());
                });
            },
        );
    }
}

fn bench_substitution(c: &mut Criterion) {
    c.bench_function("build_substitution", |b| {
        b.iter(|| {
            let substitution = wordplay::build_substitution(
                black_box("category"),
                black_box("cat"),
                black_box("mat"),
            );
            black_box(substitution);
        });
    });
}

criterion_group!(
    benches,
    bench_prefix_queries,
    bench_constituent_extraction,
    bench_substitution
);
criterion_main!(benches);
