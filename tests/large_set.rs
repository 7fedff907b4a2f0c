//! The "large set" boundary scenario from the spec: on the order of 100K
//! distinct keys, full round-trip, full positive-lookup coverage. Marked
//! `#[ignore]` since it's slow relative to the rest of the suite; run with
//! `cargo test -- --ignored` or via the `chd_bench` Criterion benchmark.

use chd_mph::{Builder, Table};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;

#[test]
#[ignore]
fn hundred_thousand_keys_round_trip() {
    const N: usize = 100_000;

    let mut rng = StdRng::seed_from_u64(2026);
    let mut keys = HashSet::with_capacity(N);
    while keys.len() < N {
        keys.insert(rng.next_u64());
    }

    let mut b = Builder::new();
    for &k in &keys {
        b.add(k, k);
    }
    let t = b.build().expect("100K keys should build within the default retry budget");
    assert_eq!(t.len(), N);

    for &k in &keys {
        assert_eq!(t.get(k), Some(k));
    }

    let mut buf = Vec::new();
    t.write(&mut buf).unwrap();
    let parsed = Table::mmap(&buf).unwrap();
    for &k in &keys {
        assert_eq!(parsed.get(k), Some(k));
    }
}
