//! Build and look up a million-key table, timing each phase. Adapted from
//! the teacher crate's own `examples/million_build.rs` demo; run with
//! `cargo run --release --bin million_build` once wired up as a `[[bin]]`,
//! or just read it as a worked usage example of `Builder`/`Table`.

use chd_mph::{BuildConfig, Builder, Table};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;
use std::time::Instant;

const N_KEYS: usize = 1_000_000;
const GEN_SEED: u64 = 42;

fn main() {
    tracing_subscriber::fmt::init();

    println!("--- chd_mph million-key demo ---");
    println!("n = {N_KEYS}");

    let t0 = Instant::now();
    let keys = gen_unique_keys(N_KEYS, GEN_SEED);
    let gen_s = t0.elapsed().as_secs_f64();
    println!("gen:    {:>8.3} s   ({:.1} M keys/s)", gen_s, N_KEYS as f64 / gen_s / 1e6);

    let cfg = BuildConfig {
        bucket_load_factor: 1.0,
        max_build_retries: 32,
        ..Default::default()
    };

    let t1 = Instant::now();
    let mut builder = Builder::new();
    for &k in &keys {
        builder.add(k, k);
    }
    let table = builder.build_with_config(&cfg).expect("build should succeed within the retry budget");
    let build_s = t1.elapsed().as_secs_f64();
    println!("build:  {:>8.3} s   ({:.1} M keys/s)", build_s, N_KEYS as f64 / build_s / 1e6);

    let t2 = Instant::now();
    let mut acc: u64 = 0;
    for chunk in keys.chunks(32_768) {
        for &k in chunk {
            acc ^= table.get(k).expect("every input key must be found");
        }
    }
    let lookup_s = t2.elapsed().as_secs_f64();
    println!(
        "lookup: {:>8.3} s   ({:.1} M lookups/s)   (acc={acc})",
        lookup_s,
        N_KEYS as f64 / lookup_s / 1e6
    );

    let t3 = Instant::now();
    let mut buf = Vec::new();
    table.write(&mut buf).expect("writing to a Vec never fails");
    let write_s = t3.elapsed().as_secs_f64();
    println!("write:  {:>8.3} s   ({} bytes)", write_s, buf.len());

    let t4 = Instant::now();
    let mapped = Table::mmap(&buf).expect("freshly-written bytes always parse");
    let mmap_s = t4.elapsed().as_secs_f64();
    println!("mmap:   {:>8.3} s   (len={})", mmap_s, mapped.len());

    println!("----------------------------------------------");
    println!(
        "Total: {:.3} s",
        gen_s + build_s + lookup_s + write_s + mmap_s
    );
}

fn gen_unique_keys(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(n * 2);
    let mut keys = Vec::with_capacity(n);
    while keys.len() < n {
        let k = rng.next_u64();
        if seen.insert(k) {
            keys.push(k);
        }
    }
    keys
}
