//! [`BinaryView`] over a parsed arm64 Mach-O image.
//!
//! All tables are built once in [`MachOView::new`]:
//!
//! - strings come from every `S_CSTRING_LITERALS` section;
//! - every string in `__objc_methname` gets a `sel_<text>` symbol, suffixed
//!   with `[0x<addr>]` when the text was already named;
//! - code references are found by pairing each ADRP in an instruction
//!   section with the ADD/LDR that consumes it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::{BinaryView, Region, StringRef, Symbol};
use crate::arm64::{self, PairKind};
use crate::error::{Error, Result};
use crate::macho::{MachOContext, SectionInfo};
use crate::trampoline::SELECTOR_PREFIX;
use crate::util::{cstrings, read_u32_le, read_u64_le};

/// Section holding selector name strings.
pub const OBJC_METHNAME_SECTION: &str = "__objc_methname";

/// Target bits of a chained-fixup rebase pointer.
const CHAINED_TARGET_MASK: u64 = 0x0000_000F_FFFF_FFFF;

/// Low 32 bits: image offset form of a chained-fixup pointer.
const CHAINED_OFFSET_MASK: u64 = 0x0000_0000_FFFF_FFFF;

/// Analysis tables for a Mach-O image.
#[derive(Debug)]
pub struct MachOView<'a> {
    macho: MachOContext<'a>,
    sections: Vec<Region>,
    code_regions: Vec<Region>,
    strings: Vec<StringRef>,
    symbols: HashMap<u64, Symbol>,
    code_refs: HashMap<u64, Vec<u64>>,
}

impl<'a> MachOView<'a> {
    /// Parses `data` as a Mach-O image and builds the analysis tables.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::from_context(MachOContext::new(data)?)
    }

    /// Builds the analysis tables for an already parsed image.
    pub fn from_context(macho: MachOContext<'a>) -> Result<Self> {
        if !macho.is_arm64() {
            return Err(Error::UnsupportedArchitecture {
                cputype: macho.header.cputype,
            });
        }

        let sections = macho
            .sections()
            .map(|s| Region::new(s.name(), s.addr_range().start, s.addr_range().end))
            .collect();
        let code_regions = macho
            .sections()
            .filter(|s| s.section.has_instructions())
            .map(|s| Region::new(s.name(), s.addr_range().start, s.addr_range().end))
            .collect();

        let mut view = Self {
            macho,
            sections,
            code_regions,
            strings: Vec::new(),
            symbols: HashMap::new(),
            code_refs: HashMap::new(),
        };

        view.collect_strings_and_selectors()?;
        view.index_code_refs();

        debug!(
            "Mach-O view: {} sections, {} strings, {} symbols, {} referenced addresses",
            view.sections.len(),
            view.strings.len(),
            view.symbols.len(),
            view.code_refs.len()
        );

        Ok(view)
    }

    /// Returns the parsed Mach-O.
    pub fn macho(&self) -> &MachOContext<'a> {
        &self.macho
    }

    /// Returns the regions of sections that contain instructions.
    pub fn code_regions(&self) -> &[Region] {
        &self.code_regions
    }

    fn collect_strings_and_selectors(&mut self) -> Result<()> {
        for sym in self.macho.defined_symbols()? {
            self.symbols.insert(
                sym.address,
                Symbol {
                    address: sym.address,
                    name: sym.name,
                },
            );
        }

        let mut named: HashSet<&[u8]> = HashSet::new();
        let string_sections: Vec<&SectionInfo> = self
            .macho
            .sections()
            .filter(|s| s.section.is_cstring_literals())
            .collect();

        for sect in string_sections {
            let is_methname = sect.name() == OBJC_METHNAME_SECTION;
            let data = self.macho.section_data(sect);

            for (offset, bytes) in cstrings(data) {
                let address = sect.section.addr + offset as u64;
                self.strings.push(StringRef {
                    address,
                    length: bytes.len(),
                });

                if !is_methname {
                    continue;
                }

                let text = String::from_utf8_lossy(bytes);
                let name = if named.insert(bytes) {
                    format!("{SELECTOR_PREFIX}{text}")
                } else {
                    format!("{SELECTOR_PREFIX}{text}[{address:#x}]")
                };
                self.symbols.insert(address, Symbol { address, name });
            }
        }

        self.strings.sort_by_key(|s| s.address);
        Ok(())
    }

    fn index_code_refs(&mut self) {
        let mut refs: HashMap<u64, Vec<u64>> = HashMap::new();

        for sect in self.macho.sections().filter(|s| s.section.has_instructions()) {
            let data = self.macho.section_data(sect);
            let words = data.len() / 4;

            for i in 0..words.saturating_sub(1) {
                let pc = sect.section.addr + (i * 4) as u64;
                let instr0 = read_u32_le(&data[i * 4..]);
                if !arm64::is_adrp(instr0) {
                    continue;
                }
                let instr1 = read_u32_le(&data[i * 4 + 4..]);

                let Some((target, kind)) = arm64::follow_adrp_pair(pc, instr0, instr1) else {
                    continue;
                };
                refs.entry(target).or_default().push(pc);

                if kind == PairKind::Load {
                    if let Some(pointee) = self.load_pointer(target) {
                        trace!("{pc:#x}: load via {target:#x} -> {pointee:#x}");
                        if pointee != target {
                            refs.entry(pointee).or_default().push(pc);
                        }
                    }
                }
            }
        }

        for sites in refs.values_mut() {
            sites.sort_unstable();
            sites.dedup();
        }
        self.code_refs = refs;
    }

    /// Reads the pointer stored at `addr` and resolves it to an address in
    /// the image.
    fn load_pointer(&self, addr: u64) -> Option<u64> {
        let bytes = self.macho.read_addr(addr, 8).ok()?;
        if bytes.len() < 8 {
            return None;
        }
        self.resolve_pointer(read_u64_le(bytes))
    }

    /// Accepts a plain pointer, a chained-fixup vmaddr target, or a
    /// chained-fixup image offset, in that order.
    fn resolve_pointer(&self, raw: u64) -> Option<u64> {
        if raw == 0 {
            return None;
        }
        let base = self.macho.base_address();
        [
            raw,
            raw & CHAINED_TARGET_MASK,
            base.wrapping_add(raw & CHAINED_OFFSET_MASK),
        ]
        .into_iter()
        .find(|&candidate| self.macho.contains_addr(candidate))
    }
}

impl BinaryView for MachOView<'_> {
    fn read(&self, addr: u64, len: usize) -> Result<&[u8]> {
        self.macho.read_addr(addr, len)
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
        self.code_refs.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }
}
