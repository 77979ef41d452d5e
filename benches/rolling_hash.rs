use ahash::AHashSet;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;

use kestrel::kmer::{Kmer, RollingHash, RollingHashIter};

/// Generate one random DNA sequence for benchmarking.
fn generate_sequence(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bases = ['A', 'C', 'G', 'T'];
    (0..len).map(|_| bases[rng.gen_range(0..4)]).collect()
}

/// Rolling hash against recomputing every window from scratch.
fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");

    let sequence = generate_sequence(10_000);
    let bytes = sequence.as_bytes();
    let k = 31;
    Kmer::set_length(k);

    group.throughput(Throughput::Bytes(sequence.len() as u64));

    group.bench_function("nthash_rolling", |b| {
        b.iter(|| {
            let count: usize = RollingHashIter::new(bytes, 1, k).count();
            black_box(count)
        });
    });

    group.bench_function("naive_recompute", |b| {
        b.iter(|| {
            let mut count = 0usize;
            for i in 0..=bytes.len() - k {
                if RollingHash::new(&bytes[i..i + k], 1, k).is_some() {
                    count += 1;
                }
            }
            black_box(count)
        });
    });

    group.finish();
}

/// Canonical k-mer insertion into a hash set, the inner loop of loading.
fn bench_canonical_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_insert");

    let sequence = generate_sequence(10_000);
    let bytes = sequence.as_bytes();
    let k = 31;
    Kmer::set_length(k);

    group.throughput(Throughput::Bytes(sequence.len() as u64));
    group.bench_function("canonicalized", |b| {
        b.iter(|| {
            let mut set = AHashSet::new();
            for i in 0..=bytes.len() - k {
                if let Ok(kmer) = Kmer::from_bytes(&bytes[i..i + k]) {
                    set.insert(kmer.canonicalize());
                }
            }
            black_box(set.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hashing, bench_canonical_insert);
criterion_main!(benches);
