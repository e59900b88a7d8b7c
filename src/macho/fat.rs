//! Universal (fat) binary slicing.

use tracing::debug;

use super::constants::*;
use super::structs::arch_name;
use crate::error::{Error, Result};
use crate::util::read_u32_be;

/// One architecture entry of a fat header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArch {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u64,
    /// Size of the slice
    pub size: u64,
}

impl FatArch {
    /// Returns the architecture as a string.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

/// Returns true if `data` starts with a fat header.
pub fn is_fat(data: &[u8]) -> bool {
    data.len() >= 8 && matches!(read_u32_be(data), FAT_MAGIC | FAT_MAGIC_64)
}

/// Parses the architecture table of a fat binary.
pub fn parse_fat_arches(data: &[u8]) -> Result<Vec<FatArch>> {
    if data.len() < 8 {
        return Err(Error::buffer_too_small(8, data.len()));
    }

    let magic = read_u32_be(data);
    let wide = match magic {
        FAT_MAGIC => false,
        FAT_MAGIC_64 => true,
        other => return Err(Error::InvalidMachoMagic(other)),
    };

    let count = read_u32_be(&data[4..]) as usize;
    let entry_size = if wide { 32 } else { 20 };
    let needed = 8 + count * entry_size;
    if needed > data.len() {
        return Err(Error::buffer_too_small(needed, data.len()));
    }

    let arches = (0..count)
        .map(|i| {
            let e = &data[8 + i * entry_size..];
            let (offset, size) = if wide {
                (
                    (read_u32_be(&e[8..]) as u64) << 32 | read_u32_be(&e[12..]) as u64,
                    (read_u32_be(&e[16..]) as u64) << 32 | read_u32_be(&e[20..]) as u64,
                )
            } else {
                (read_u32_be(&e[8..]) as u64, read_u32_be(&e[12..]) as u64)
            };
            FatArch {
                cputype: read_u32_be(e),
                cpusubtype: read_u32_be(&e[4..]),
                offset,
                size,
            }
        })
        .collect();

    Ok(arches)
}

/// Returns the arm64 image inside `data`.
///
/// Thin files are returned unchanged. For fat files the first arm64 slice
/// whose architecture name contains `arch` (when given) is selected; with no
/// filter, plain `arm64` is preferred over `arm64e`.
pub fn select_arm64_slice<'a>(data: &'a [u8], arch: Option<&str>) -> Result<&'a [u8]> {
    if !is_fat(data) {
        return Ok(data);
    }

    let arches = parse_fat_arches(data)?;
    let mut candidates: Vec<_> = arches
        .iter()
        .filter(|a| a.cputype == CPU_TYPE_ARM64)
        .filter(|a| arch.map_or(true, |f| a.arch_name().contains(f)))
        .collect();
    candidates.sort_by_key(|a| a.arch_name() != "arm64");

    let chosen = candidates.first().ok_or_else(|| Error::NoMatchingSlice {
        arch: arch.unwrap_or("arm64").to_string(),
    })?;

    debug!(
        "Selected {} slice at {:#x} ({:#x} bytes)",
        chosen.arch_name(),
        chosen.offset,
        chosen.size
    );

    let start = chosen.offset as usize;
    let end = start.saturating_add(chosen.size as usize);
    if end > data.len() {
        return Err(Error::buffer_too_small(end, data.len()));
    }
    Ok(&data[start..end])
}
