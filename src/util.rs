//! Byte-level helpers shared by the Mach-O parser and the binary view.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

// =============================================================================
// Unaligned Reads
// =============================================================================

/// Reads a little-endian u64 from an unaligned byte slice.
///
/// # Panics
///
/// Panics if `data.len() < 8`.
#[inline(always)]
pub fn read_u64_le(data: &[u8]) -> u64 {
    LittleEndian::read_u64(data)
}

/// Reads a little-endian u32 from an unaligned byte slice.
///
/// # Panics
///
/// Panics if `data.len() < 4`.
#[inline(always)]
pub fn read_u32_le(data: &[u8]) -> u32 {
    LittleEndian::read_u32(data)
}

/// Reads a big-endian u32 (fat headers are stored big-endian).
///
/// # Panics
///
/// Panics if `data.len() < 4`.
#[inline(always)]
pub fn read_u32_be(data: &[u8]) -> u32 {
    BigEndian::read_u32(data)
}

// =============================================================================
// Byte Search
// =============================================================================

/// Finds the position of the first null byte in a slice, or its length.
#[inline(always)]
pub fn memchr_null(data: &[u8]) -> usize {
    memchr::memchr(0, data).unwrap_or(data.len())
}

/// Splits a C-string literal section into `(offset, bytes)` pairs.
///
/// Empty strings (runs of padding NULs) are skipped. A trailing string with
/// no terminator is still returned.
pub fn cstrings(data: &[u8]) -> impl Iterator<Item = (usize, &[u8])> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        while offset < data.len() {
            let start = offset;
            let len = memchr_null(&data[start..]);
            offset = start + len + 1;
            if len > 0 {
                return Some((start, &data[start..start + len]));
            }
        }
        None
    })
}
