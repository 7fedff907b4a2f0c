//! File-backed mmap convenience layer.
//!
//! This is the "surrounding functionality" the core spec treats as an
//! external collaborator: the core only knows about `mmap(bytes: &[u8])`.
//! `MappedTable` just owns the OS-level memory map and hands out a
//! [`Table`] borrowing from it on demand, so callers don't have to juggle
//! `memmap2::Mmap` lifetimes themselves.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::io::{self, ReadError};
use crate::table::Table;

/// An open memory-mapped table file.
///
/// Re-parsing on every [`MappedTable::table`] call is O(1) plus whatever
/// per-array copies alignment forces (see [`crate::io::mmap`]) — there is no
/// hidden re-scan of the whole file.
pub struct MappedTable {
    mmap: Mmap,
}

impl MappedTable {
    /// Memory-map `path` and validate that it parses as a well-formed
    /// serialized table (lengths in bounds; does not yet verify the
    /// minimal-perfect property, which corrupted-but-structurally-valid
    /// bytes can't be distinguished from by layout alone).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        // SAFETY: the file is not expected to be mutated concurrently while
        // mapped; the caller is responsible for that invariant, as with any
        // mmap-based reader.
        let mmap = unsafe { Mmap::map(&file)? };
        let mapped = Self { mmap };
        // Parse once up front so `open` fails fast on malformed input rather
        // than deferring the error to the first `table()` call.
        mapped.table()?;
        Ok(mapped)
    }

    /// Borrow a [`Table`] aliasing this mapping's bytes.
    pub fn table(&self) -> Result<Table<'_>, ReadError> {
        io::mmap(&self.mmap)
    }
}
