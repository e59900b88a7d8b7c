//! The loaded-binary interface the scanner works against.
//!
//! A [`BinaryView`] exposes raw reads plus the section, string, symbol and
//! code-reference tables of an already-analyzed image. The scanner never
//! holds onto anything but addresses and names from it.

mod macho;

pub use macho::MachOView;

use crate::error::Result;

/// A labelled, half-open address range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    /// Identifying label (a section name)
    pub label: String,
    /// First address in the region
    pub start: u64,
    /// One past the last address
    pub end: u64,
}

impl Region {
    /// Creates a region. `end` is clamped so that `start <= end` holds.
    pub fn new(label: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            label: label.into(),
            start,
            end: end.max(start),
        }
    }

    /// Returns true if `start <= addr < end`.
    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Returns the region size in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the region covers no addresses.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An entry of the image's string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRef {
    /// Address of the first byte
    pub address: u64,
    /// Length in bytes, without the terminator
    pub length: usize,
}

/// A named address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol address
    pub address: u64,
    /// Symbol name
    pub name: String,
}

/// Read access to an analyzed binary image.
pub trait BinaryView {
    /// Reads up to `len` bytes at `addr`.
    ///
    /// The returned slice may be shorter than `len` when the backing data
    /// ends; unmapped addresses are an error.
    fn read(&self, addr: u64, len: usize) -> Result<&[u8]>;

    /// Returns every section of the image.
    fn sections(&self) -> &[Region];

    /// Returns the string table of the whole image.
    fn strings(&self) -> &[StringRef];

    /// Returns the symbol defined exactly at `addr`.
    fn symbol_at(&self, addr: u64) -> Option<&Symbol>;

    /// Returns the code locations that reference `addr`.
    fn code_refs_to(&self, addr: u64) -> &[u64];
}

/// Finds the first section whose name contains `marker`, ignoring case.
pub fn find_region<'a>(sections: &'a [Region], marker: &str) -> Option<&'a Region> {
    let marker = marker.to_lowercase();
    sections
        .iter()
        .find(|r| r.label.to_lowercase().contains(&marker))
}
