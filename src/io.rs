//! The fixed, little-endian serialized layout and zero-copy aliasing.
//!
//! ```text
//! offset 0       u32  rl          length of `r`
//! offset 4       rl * u64         `r`, packed little-endian
//! offset ..      u32  il          length of `indices`
//! offset ..      il * u16         `indices`, packed little-endian
//! offset ..      u32  el          length of `keys` (== length of `values`)
//! offset ..      el * u64         `keys`, packed little-endian (absent if el == 0)
//! offset ..      el * u64         `values`, packed little-endian (absent if el == 0)
//! ```
//!
//! There is no magic number, version byte, or checksum: the layout is
//! consumed exactly as the reference CHD implementation emits it, byte for
//! byte, on both little- and big-endian hosts.

use std::borrow::Cow;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use zerocopy::Ref;

use crate::table::Table;

/// Sanity cap on the declared `indices` length, matching the `u16` index
/// space the serialized format actually allows to be addressed.
const MAX_INDICES_LEN: u32 = 1 << 16;

/// Errors produced while parsing a serialized [`Table`].
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("byte source ended before a declared array length was satisfied")]
    Truncated,
    #[error("declared indices length exceeds 2^16")]
    TooManyBuckets,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub(crate) fn write_table(table: &Table<'_>, sink: &mut impl Write) -> io::Result<()> {
    sink.write_u32::<LittleEndian>(table.r.len() as u32)?;
    for &v in table.r.iter() {
        sink.write_u64::<LittleEndian>(v)?;
    }

    sink.write_u32::<LittleEndian>(table.indices.len() as u32)?;
    for &v in table.indices.iter() {
        sink.write_u16::<LittleEndian>(v)?;
    }

    sink.write_u32::<LittleEndian>(table.keys.len() as u32)?;
    if !table.keys.is_empty() {
        for &v in table.keys.iter() {
            sink.write_u64::<LittleEndian>(v)?;
        }
        for &v in table.values.iter() {
            sink.write_u64::<LittleEndian>(v)?;
        }
    }

    Ok(())
}

/// Parse a serialized table from a streaming source, copying every array
/// into owned storage. Always returns a `Table<'static>` since a `Read`
/// relinquishes the bytes as it goes — there is nothing left to borrow from
/// once this function returns.
pub fn read_table(mut source: impl Read) -> Result<Table<'static>, ReadError> {
    let rl = source.read_u32::<LittleEndian>().map_err(map_eof)?;
    let mut r = Vec::with_capacity(rl as usize);
    for _ in 0..rl {
        r.push(source.read_u64::<LittleEndian>().map_err(map_eof)?);
    }

    let il = source.read_u32::<LittleEndian>().map_err(map_eof)?;
    if il > MAX_INDICES_LEN {
        return Err(ReadError::TooManyBuckets);
    }
    let mut indices = Vec::with_capacity(il as usize);
    for _ in 0..il {
        indices.push(source.read_u16::<LittleEndian>().map_err(map_eof)?);
    }

    let el = source.read_u32::<LittleEndian>().map_err(map_eof)?;
    let (keys, values) = if el == 0 {
        (Vec::new(), Vec::new())
    } else {
        let mut keys = Vec::with_capacity(el as usize);
        for _ in 0..el {
            keys.push(source.read_u64::<LittleEndian>().map_err(map_eof)?);
        }
        let mut values = Vec::with_capacity(el as usize);
        for _ in 0..el {
            values.push(source.read_u64::<LittleEndian>().map_err(map_eof)?);
        }
        (keys, values)
    };

    Ok(Table {
        r: Cow::Owned(r),
        indices: Cow::Owned(indices),
        keys: Cow::Owned(keys),
        values: Cow::Owned(values),
    })
}

/// Alias a serialized table directly over `bytes`, without copying, where
/// the platform and the region's alignment allow it.
///
/// On a little-endian host, each array is cast in place via [`zerocopy`]
/// when `bytes` happens to be aligned for that array's element type;
/// otherwise that one array alone is copied into owned storage. On a
/// big-endian host every array is always copied (a native-order cast would
/// silently read the wrong values), so `mmap` degrades to `read`'s behavior
/// there while still accepting the same little-endian bytes.
pub fn mmap(bytes: &[u8]) -> Result<Table<'_>, ReadError> {
    let mut offset = 0usize;

    let rl = read_u32_at(bytes, &mut offset)? as usize;
    let r_region = take(bytes, &mut offset, checked_len(rl, 8)?)?;
    let r = alias_u64(r_region);

    let il = read_u32_at(bytes, &mut offset)? as usize;
    if il > MAX_INDICES_LEN as usize {
        return Err(ReadError::TooManyBuckets);
    }
    let i_region = take(bytes, &mut offset, checked_len(il, 2)?)?;
    let indices = alias_u16(i_region);

    let el = read_u32_at(bytes, &mut offset)? as usize;
    let (keys, values) = if el == 0 {
        (Cow::Owned(Vec::new()), Cow::Owned(Vec::new()))
    } else {
        let k_region = take(bytes, &mut offset, checked_len(el, 8)?)?;
        let v_region = take(bytes, &mut offset, checked_len(el, 8)?)?;
        (alias_u64(k_region), alias_u64(v_region))
    };

    Ok(Table { r, indices, keys, values })
}

/// A short read while reading one of the declared arrays means the source
/// ended before its own length prefix was satisfied; any other I/O error
/// is a genuine I/O failure and is propagated as such.
fn map_eof(e: io::Error) -> ReadError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::Truncated
    } else {
        ReadError::Io(e)
    }
}

fn checked_len(count: usize, elem_size: usize) -> Result<usize, ReadError> {
    count.checked_mul(elem_size).ok_or(ReadError::Truncated)
}

fn read_u32_at(bytes: &[u8], offset: &mut usize) -> Result<u32, ReadError> {
    let region = take(bytes, offset, 4)?;
    Ok(u32::from_le_bytes(region.try_into().unwrap()))
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], ReadError> {
    let end = offset.checked_add(len).ok_or(ReadError::Truncated)?;
    let region = bytes.get(*offset..end).ok_or(ReadError::Truncated)?;
    *offset = end;
    Ok(region)
}

fn alias_u64(region: &[u8]) -> Cow<'_, [u64]> {
    if cfg!(target_endian = "little") {
        if let Some(view) = Ref::<_, [u64]>::new_slice(region) {
            return Cow::Borrowed(Ref::into_ref(view));
        }
    }
    Cow::Owned(decode_u64(region))
}

fn alias_u16(region: &[u8]) -> Cow<'_, [u16]> {
    if cfg!(target_endian = "little") {
        if let Some(view) = Ref::<_, [u16]>::new_slice(region) {
            return Cow::Borrowed(Ref::into_ref(view));
        }
    }
    Cow::Owned(decode_u16(region))
}

fn decode_u64(region: &[u8]) -> Vec<u64> {
    region.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect()
}

fn decode_u16(region: &[u8]) -> Vec<u16> {
    region.chunks_exact(2).map(|c| u16::from_le_bytes(c.try_into().unwrap())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    #[test]
    fn empty_table_serializes_to_twelve_zero_bytes() {
        let t = Builder::new().build().unwrap();
        let mut buf = Vec::new();
        t.write(&mut buf).unwrap();
        assert_eq!(buf, vec![0u8; 12]);
    }

    #[test]
    fn write_then_mmap_round_trips() {
        let mut b = Builder::new();
        for (k, v) in [(1, 2), (3, 4), (5, 6), (7, 8), (9, 10), (11, 12), (13, 14)] {
            b.add(k, v);
        }
        let t = b.build().unwrap();
        let mut buf = Vec::new();
        t.write(&mut buf).unwrap();

        let parsed = mmap(&buf).unwrap();
        assert_eq!(parsed.r, t.r);
        assert_eq!(parsed.indices, t.indices);
        assert_eq!(parsed.keys, t.keys);
        assert_eq!(parsed.values, t.values);
        for k in [1u64, 3, 5, 7, 9, 11, 13] {
            assert_eq!(parsed.get(k), t.get(k));
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut b = Builder::new();
        b.add(123, 456);
        let t = b.build().unwrap();
        let mut buf = Vec::new();
        t.write(&mut buf).unwrap();

        let parsed = read_table(&buf[..]).unwrap();
        assert_eq!(parsed.r, t.r);
        assert_eq!(parsed.indices, t.indices);
        assert_eq!(parsed.keys, t.keys);
        assert_eq!(parsed.values, t.values);
    }

    #[test]
    fn empty_round_trip() {
        let t = Builder::new().build().unwrap();
        let mut buf = Vec::new();
        t.write(&mut buf).unwrap();
        let parsed = mmap(&buf).unwrap();
        assert_eq!(parsed.len(), 0);
        let parsed = read_table(&buf[..]).unwrap();
        assert_eq!(parsed.len(), 0);
    }

    #[test]
    fn truncated_length_prefix_is_rejected() {
        let mut b = Builder::new();
        for (k, v) in [(1, 2), (3, 4), (5, 6), (7, 8), (9, 10)] {
            b.add(k, v);
        }
        let t = b.build().unwrap();
        let mut buf = Vec::new();
        t.write(&mut buf).unwrap();

        // Inflate the `rl` prefix far past what the buffer actually holds.
        buf[0] = 0xFF;
        buf[1] = 0xFF;
        buf[2] = 0xFF;
        buf[3] = 0x7F;

        assert!(matches!(mmap(&buf), Err(ReadError::Truncated)));
        assert!(matches!(read_table(&buf[..]), Err(ReadError::Truncated)));
    }

    #[test]
    fn oversized_indices_length_is_rejected() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&(MAX_INDICES_LEN + 1).to_le_bytes());
        assert!(matches!(mmap(&buf), Err(ReadError::TooManyBuckets)));
        assert!(matches!(read_table(&buf[..]), Err(ReadError::TooManyBuckets)));
    }
}
