//! `chd_mph` — a static minimal perfect hash table over `u64` keys, built
//! with CHD (compress, hash, displace).
//!
//! Given a finite, known-in-advance set of distinct `u64` keys paired with
//! `u64` values, [`Builder`] searches for a family of secondary hash salts
//! that places every key in its own slot in `[0, N)`, and hands back an
//! immutable [`Table`]. Lookups are O(1) (a couple of array reads, no
//! allocation), absent keys are reported reliably rather than probabilistically,
//! and the table serializes to a fixed little-endian byte layout suitable
//! for zero-copy memory-mapped access ([`Table::mmap`]).
//!
//! Keys must already be `u64`. Callers keying on bytes or strings are
//! expected to hash into a `u64` themselves before calling in — this crate
//! does not hash byte strings, it only mixes salts into already-numeric
//! keys (see [`hash`] internally).
//!
//! ```
//! use chd_mph::Builder;
//!
//! let mut builder = Builder::new();
//! builder.add(1, 10);
//! builder.add(2, 20);
//! builder.add(3, 30);
//! let table = builder.build().expect("small sets build in one round");
//!
//! assert_eq!(table.get(2), Some(20));
//! assert_eq!(table.get(999), None);
//! ```

mod builder;
mod hash;
mod io;
#[cfg(feature = "mmap-file")]
mod mapped;
mod table;
mod util;

pub use builder::{BuildConfig, BuildError, Builder};
pub use io::ReadError;
#[cfg(feature = "mmap-file")]
pub use mapped::MappedTable;
pub use table::{Iter, Table};
