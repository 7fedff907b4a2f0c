use chd_mph::Builder;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;

fn gen_unique_keys(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(n);
    while seen.len() < n {
        seen.insert(rng.next_u64());
    }
    seen.into_iter().collect()
}

fn bench_build(c: &mut Criterion) {
    let keys = gen_unique_keys(50_000, 1);
    c.bench_function("build_50k", |bencher| {
        bencher.iter(|| {
            let mut b = Builder::new();
            for &k in &keys {
                b.add(k, k);
            }
            black_box(b.build().unwrap())
        });
    });
}

fn bench_lookup(c: &mut Criterion) {
    let keys = gen_unique_keys(50_000, 1);
    let mut b = Builder::new();
    for &k in &keys {
        b.add(k, k);
    }
    let table = b.build().unwrap();

    c.bench_function("lookup_50k", |bencher| {
        bencher.iter(|| {
            let mut acc = 0u64;
            for &k in &keys {
                acc ^= table.get(k).unwrap();
            }
            black_box(acc)
        });
    });
}

criterion_group!(benches, bench_build, bench_lookup);
criterion_main!(benches);
