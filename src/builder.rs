//! The CHD (compress, hash, displace) search.
//!
//! [`Builder`] collects `(key, value)` pairs and, on [`Builder::build`],
//! searches for a family of per-bucket secondary salts that places every key
//! in a distinct final slot. The search buckets keys by a primary salt,
//! resolves the largest buckets first (they are the hardest to place), and
//! for each bucket sweeps increasing displacement salts until one lands all
//! of the bucket's keys on currently-free slots.

use std::borrow::Cow;
use std::cmp::Reverse;

use ahash::AHashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::hash::mix;
use crate::table::{Table, SENTINEL};
use crate::util::BitSet;

/// `indices` is a `u16` per bucket, so at most this many distinct buckets
/// (and hence at most this many resolved secondary salts) can be addressed.
const MAX_BUCKETS: usize = (1 << 16) - 1;

/// Parameters controlling the CHD search.
///
/// Mirrors the reference constants: the default `bucket_load_factor` of
/// `1.0` reproduces the reference's "one bucket per key" sizing exactly, so
/// out-of-the-box builds are byte-identical to the reference implementation
/// given the same input order and `initial_salt`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Salt fed into round 0 of the search; later rounds derive their own
    /// salt deterministically from this value and the round number.
    pub initial_salt: u64,
    /// Ratio λ = N / bucket_count. Lower values mean more buckets (easier
    /// per-bucket placement, more wasted `indices` space); `1.0` matches the
    /// reference's `M = N`.
    pub bucket_load_factor: f64,
    /// Per-bucket displacement trials before the whole build attempt is
    /// abandoned and retried with a new salt.
    pub max_bucket_trials: u64,
    /// Whole-build retries (new primary salt each time) before giving up.
    pub max_build_retries: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            initial_salt: 0xC0FF_EE00_D15E_A5E,
            bucket_load_factor: 1.0,
            max_bucket_trials: 1_000_000,
            max_build_retries: 10,
        }
    }
}

/// Errors produced while building a [`Table`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate key {key} submitted to the builder")]
    DuplicateKey { key: u64 },
    #[error("bucket load factor would require more than {MAX_BUCKETS} buckets for this input size")]
    TooManyBuckets,
    #[error("CHD search failed to place all buckets after {rounds_tried} round(s)")]
    BuildFailed { rounds_tried: u32 },
}

/// Accumulates `(key, value)` pairs for a future [`Table`].
///
/// `Builder` is not thread-safe and carries no invariants of its own beyond
/// "the two input sequences stay the same length," which `add` maintains by
/// construction. `build`/`build_with_config` consume the builder.
#[derive(Debug, Default)]
pub struct Builder {
    keys: Vec<u64>,
    values: Vec<u64>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `(key, value)` pair. O(1). Duplicate keys are accepted here
    /// and rejected at `build` time instead, so a caller that wants to fail
    /// fast on the first duplicate should dedupe upstream.
    pub fn add(&mut self, key: u64, value: u64) {
        self.keys.push(key);
        self.values.push(value);
    }

    /// Run the CHD search with [`BuildConfig::default`].
    pub fn build(self) -> Result<Table<'static>, BuildError> {
        let cfg = BuildConfig::default();
        self.build_with_config(&cfg)
    }

    /// Run the CHD search with caller-supplied parameters.
    pub fn build_with_config(self, cfg: &BuildConfig) -> Result<Table<'static>, BuildError> {
        let n = self.keys.len();
        if n == 0 {
            return Ok(Table::empty());
        }

        let mut seen = AHashSet::with_capacity(n);
        for &k in &self.keys {
            if !seen.insert(k) {
                return Err(BuildError::DuplicateKey { key: k });
            }
        }
        drop(seen);

        let bucket_count = resolve_bucket_count(n, cfg.bucket_load_factor)?;

        for round in 0..=cfg.max_build_retries {
            let r0 = mix_salt(cfg.initial_salt, round);
            match try_build_once(&self.keys, &self.values, n, bucket_count, r0, cfg.max_bucket_trials) {
                Ok(table) => return Ok(table),
                Err(BuildError::BuildFailed { .. }) => {
                    warn!(round, "chd round failed to place all buckets, retrying with a new salt");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(BuildError::BuildFailed { rounds_tried: cfg.max_build_retries + 1 })
    }
}

fn resolve_bucket_count(n: usize, lambda: f64) -> Result<usize, BuildError> {
    let raw = (n as f64 / lambda).ceil();
    if !raw.is_finite() || raw > MAX_BUCKETS as f64 {
        return Err(BuildError::TooManyBuckets);
    }
    Ok((raw as usize).max(1))
}

/// One full attempt at the CHD search for a fixed primary salt `r0`.
fn try_build_once(
    keys: &[u64],
    values: &[u64],
    n: usize,
    bucket_count: usize,
    r0: u64,
    max_bucket_trials: u64,
) -> Result<Table<'static>, BuildError> {
    let n_u64 = n as u64;

    // 1) Bucket every key by h = mix(key, r0) mod bucket_count.
    let mut hashes = Vec::with_capacity(n);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); bucket_count];
    for (idx, &k) in keys.iter().enumerate() {
        let h = mix(k, r0);
        hashes.push(h);
        let b = (h % bucket_count as u64) as usize;
        buckets[b].push(idx);
    }

    // 2) Resolve buckets largest-first; ties broken by ascending bucket
    //    index, which `sort_by_key` already gives us since `order` starts
    //    enumerated in ascending order and the sort is stable.
    let mut order: Vec<usize> = (0..bucket_count).collect();
    order.sort_by_key(|&b| Reverse(buckets[b].len()));

    // 3) Assign slots.
    let mut occupied = BitSet::new(n);
    let mut indices = vec![SENTINEL; bucket_count];
    let mut r: Vec<u64> = vec![r0];
    let mut out_keys = vec![0u64; n];
    let mut out_values = vec![0u64; n];

    for &b in &order {
        let items = &buckets[b];
        if items.is_empty() {
            continue;
        }

        let mut placed = false;
        let mut positions = Vec::with_capacity(items.len());
        let mut r_try = 0u64;
        while r_try < max_bucket_trials {
            positions.clear();
            let mut ok = true;
            for &idx in items {
                let ti = ((hashes[idx] ^ r_try) % n_u64) as usize;
                if occupied.test(ti) {
                    ok = false;
                    break;
                }
                positions.push(ti);
            }
            if ok {
                positions.sort_unstable();
                ok = !positions.windows(2).any(|w| w[0] == w[1]);
            }
            if ok {
                for (&idx, &ti) in items.iter().zip(positions.iter()) {
                    occupied.set(ti);
                    out_keys[ti] = keys[idx];
                    out_values[ti] = values[idx];
                }
                r.push(r_try);
                let slot = r.len() - 1;
                if slot > u16::MAX as usize {
                    // Every bucket resolved and then some: only reachable at
                    // the very top of the MAX_BUCKETS range. Surface it as
                    // the same error a caller would get from an oversized
                    // bucket count up front.
                    return Err(BuildError::TooManyBuckets);
                }
                indices[b] = slot as u16;
                placed = true;
                break;
            }
            r_try += 1;
        }

        if !placed {
            debug!(bucket = b, size = items.len(), trials = max_bucket_trials, "bucket exhausted trial budget");
            return Err(BuildError::BuildFailed { rounds_tried: 0 });
        }
    }

    Ok(Table {
        r: Cow::Owned(r),
        indices: Cow::Owned(indices),
        keys: Cow::Owned(out_keys),
        values: Cow::Owned(out_values),
    })
}

/// Deterministically derive the primary salt for a retry round from the
/// configured base salt.
fn mix_salt(base: u64, round: u32) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET ^ base;
    h ^= round as u64;
    h = h.wrapping_mul(FNV_PRIME);
    h ^ (h >> 33)
}
