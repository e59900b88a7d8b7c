//! In-memory [`BinaryView`] for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::view::{BinaryView, Region, StringRef, Symbol};

/// ADRP X16; LDR X16, [X16]; ADRP X17; LDR X17, [X17]; BR X17
pub const TRAMPOLINE: [u32; 5] = [
    0x9000_0010,
    0xF940_0210,
    0x9000_0011,
    0xF940_0231,
    0xD61F_0220,
];

#[derive(Debug, Default)]
pub struct FakeView {
    base: u64,
    bytes: Vec<u8>,
    sections: Vec<Region>,
    strings: Vec<StringRef>,
    symbols: HashMap<u64, Symbol>,
    refs: HashMap<u64, Vec<u64>>,
    reads: RefCell<Vec<u64>>,
}

impl FakeView {
    /// Zero-filled memory covering `[base, base + size)`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: vec![0; size],
            ..Default::default()
        }
    }

    pub fn with_code(base: u64, words: &[u32]) -> Self {
        let mut view = Self::new(base, words.len() * 4);
        view.put_words(base, words);
        view
    }

    pub fn put_words(&mut self, addr: u64, words: &[u32]) {
        let mut off = (addr - self.base) as usize;
        for w in words {
            self.bytes[off..off + 4].copy_from_slice(&w.to_le_bytes());
            off += 4;
        }
    }

    pub fn put_trampoline(&mut self, addr: u64) {
        self.put_words(addr, &TRAMPOLINE);
    }

    /// Drops every byte at or past `end`.
    pub fn truncate(&mut self, end: u64) {
        self.bytes.truncate((end - self.base) as usize);
    }

    pub fn add_section(&mut self, label: &str, start: u64, end: u64) {
        self.sections.push(Region::new(label, start, end));
    }

    pub fn add_string(&mut self, address: u64, length: usize) {
        self.strings.push(StringRef { address, length });
    }

    pub fn add_symbol(&mut self, address: u64, name: &str) {
        self.symbols.insert(
            address,
            Symbol {
                address,
                name: name.to_string(),
            },
        );
    }

    /// Adds a string plus a symbol named `name` at the same address.
    pub fn add_selector(&mut self, address: u64, name: &str) {
        self.add_string(address, name.len());
        self.add_symbol(address, name);
    }

    pub fn add_ref(&mut self, target: u64, site: u64) {
        self.refs.entry(target).or_default().push(site);
    }

    /// Addresses passed to `read`, in call order.
    pub fn reads(&self) -> Vec<u64> {
        self.reads.borrow().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.borrow_mut().clear();
    }
}

impl BinaryView for FakeView {
    fn read(&self, addr: u64, len: usize) -> Result<&[u8]> {
        self.reads.borrow_mut().push(addr);
        let end = self.base + self.bytes.len() as u64;
        if addr < self.base || addr >= end {
            return Err(Error::address_not_found(addr));
        }
        let start = (addr - self.base) as usize;
        let stop = (start + len).min(self.bytes.len());
        Ok(&self.bytes[start..stop])
    }

    fn sections(&self) -> &[Region] {
        &self.sections
    }

    fn strings(&self) -> &[StringRef] {
        &self.strings
    }

    fn symbol_at(&self, addr: u64) -> Option<&Symbol> {
        self.symbols.get(&addr)
    }

    fn code_refs_to(&self, addr: u64) -> &[u64] {
        self.refs.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }
}
