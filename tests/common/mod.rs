//! Synthetic arm64 Mach-O images for integration tests.
//!
//! Layout (file offset = vmaddr - BASE):
//!
//! ```text
//! __TEXT  0x1_0000_0000  header, __text, __objc_stubs, __objc_methname
//! __DATA  0x1_0000_2000  __objc_selrefs, __got
//! symtab  file 0x3000    one external symbol: _main
//! ```
//!
//! Each stub is 32 bytes: the five-word trampoline, then the ADRP+LDR pair
//! that loads its selector reference, then a BRK.

#![allow(dead_code)]

use std::io::Write;

use stubnamer::arm64::{encode_adrp, encode_br, encode_brk, encode_ldr_unsigned};
use stubnamer::macho::{
    MachHeader64, Nlist64, Section64, SectionAttributes, SegmentCommand64, SymtabCommand,
    N_EXT, N_SECT, S_CSTRING_LITERALS, S_LITERAL_POINTERS, S_REGULAR,
};
use tempfile::NamedTempFile;
use zerocopy::IntoBytes;

pub const BASE: u64 = 0x1_0000_0000;
pub const TEXT_ADDR: u64 = BASE + 0x1000;
pub const STUBS_ADDR: u64 = BASE + 0x1100;
pub const METHNAME_ADDR: u64 = BASE + 0x1200;
pub const SELREFS_ADDR: u64 = BASE + 0x2000;
pub const GOT_ADDR: u64 = BASE + 0x2100;
pub const STUB_SIZE: u64 = 32;

const SYMTAB_OFFSET: usize = 0x3000;
const RET: u32 = 0xD65F_03C0;

/// What to put in the image.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Selector names, stored in order in `__objc_methname`
    pub selectors: Vec<&'static str>,
    /// Selector index used by each stub
    pub stubs: Vec<usize>,
    /// Selector indices loaded from `__text`
    pub text_refs: Vec<usize>,
    /// Name of the stub section
    pub stub_section: &'static str,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            selectors: vec!["initWithFrame:", "dealloc", "count"],
            stubs: vec![0, 2],
            text_refs: vec![0, 1],
            stub_section: "__objc_stubs",
        }
    }
}

impl Fixture {
    /// Returns the address of each selector string.
    pub fn selector_addrs(&self) -> Vec<u64> {
        let mut addr = METHNAME_ADDR;
        self.selectors
            .iter()
            .map(|s| {
                let at = addr;
                addr += s.len() as u64 + 1;
                at
            })
            .collect()
    }

    /// Returns the start address of stub `i`.
    pub fn stub_addr(i: usize) -> u64 {
        STUBS_ADDR + i as u64 * STUB_SIZE
    }

    /// Builds the image bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; SYMTAB_OFFSET + 0x20];

        let methname_size = self.selectors.iter().map(|s| s.len() + 1).sum::<usize>() as u64;
        let selrefs_size = self.selectors.len() as u64 * 8;
        let stubs_size = self.stubs.len() as u64 * STUB_SIZE;
        let text_size = (self.text_refs.len() as u64 * 8 + 4).max(4);

        let text_sections = [
            section("__text", "__TEXT", TEXT_ADDR, text_size, code_flags()),
            section(self.stub_section, "__TEXT", STUBS_ADDR, stubs_size, code_flags()),
            section("__objc_methname", "__TEXT", METHNAME_ADDR, methname_size, S_CSTRING_LITERALS),
        ];
        let data_sections = [
            section("__objc_selrefs", "__DATA", SELREFS_ADDR, selrefs_size, S_LITERAL_POINTERS),
            section("__got", "__DATA", GOT_ADDR, 8, S_REGULAR),
        ];

        let text_seg = segment("__TEXT", BASE, 0x2000, &text_sections);
        let data_seg = segment("__DATA", BASE + 0x2000, 0x1000, &data_sections);
        let symtab = SymtabCommand {
            symoff: SYMTAB_OFFSET as u32,
            nsyms: 1,
            stroff: (SYMTAB_OFFSET + Nlist64::SIZE) as u32,
            strsize: 8,
            ..Default::default()
        };

        let mut cmds = Vec::new();
        push_segment(&mut cmds, &text_seg, &text_sections);
        push_segment(&mut cmds, &data_seg, &data_sections);
        cmds.extend_from_slice(symtab.as_bytes());

        let header = MachHeader64 {
            ncmds: 3,
            sizeofcmds: cmds.len() as u32,
            ..Default::default()
        };
        data[..MachHeader64::SIZE].copy_from_slice(header.as_bytes());
        data[MachHeader64::SIZE..MachHeader64::SIZE + cmds.len()].copy_from_slice(&cmds);

        // __objc_methname
        let mut off = file_offset(METHNAME_ADDR);
        for s in &self.selectors {
            data[off..off + s.len()].copy_from_slice(s.as_bytes());
            off += s.len() + 1;
        }

        // __objc_selrefs: plain pointers to the names
        for (i, addr) in self.selector_addrs().into_iter().enumerate() {
            let off = file_offset(selref_addr(i));
            data[off..off + 8].copy_from_slice(&addr.to_le_bytes());
        }

        // __text: one selector load per text reference
        let mut pc = TEXT_ADDR;
        for &sel in &self.text_refs {
            put_words(&mut data, pc, &selector_load(pc, sel));
            pc += 8;
        }
        put_words(&mut data, pc, &[RET]);

        // __objc_stubs
        for (i, &sel) in self.stubs.iter().enumerate() {
            let t = Self::stub_addr(i);
            let mut words = trampoline(t).to_vec();
            words.extend_from_slice(&selector_load(t + 20, sel));
            words.push(encode_brk(1));
            put_words(&mut data, t, &words);
        }

        // Symbol table
        let nlist = Nlist64 {
            n_strx: 1,
            n_type: N_SECT | N_EXT,
            n_sect: 1,
            n_desc: 0,
            n_value: TEXT_ADDR,
        };
        data[SYMTAB_OFFSET..SYMTAB_OFFSET + Nlist64::SIZE].copy_from_slice(nlist.as_bytes());
        let strtab = SYMTAB_OFFSET + Nlist64::SIZE;
        data[strtab..strtab + 7].copy_from_slice(b"\0_main\0");

        data
    }

    /// Writes the image to a temporary file.
    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(&self.build()).expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }
}

pub fn selref_addr(i: usize) -> u64 {
    SELREFS_ADDR + i as u64 * 8
}

fn file_offset(addr: u64) -> usize {
    (addr - BASE) as usize
}

fn code_flags() -> u32 {
    (SectionAttributes::PURE_INSTRUCTIONS | SectionAttributes::SOME_INSTRUCTIONS).bits()
}

/// ADRP X16; LDR X16, [X16, got]; ADRP X17; LDR X17, [X17, got]; BR X17
fn trampoline(pc: u64) -> [u32; 5] {
    [
        encode_adrp(16, pc, GOT_ADDR),
        encode_ldr_unsigned(16, 16, GOT_ADDR & 0xFFF),
        encode_adrp(17, pc + 8, GOT_ADDR),
        encode_ldr_unsigned(17, 17, GOT_ADDR & 0xFFF),
        encode_br(17),
    ]
}

/// ADRP X1; LDR X1, [X1, selref]
fn selector_load(pc: u64, sel: usize) -> [u32; 2] {
    let target = selref_addr(sel);
    [
        encode_adrp(1, pc, target),
        encode_ldr_unsigned(1, 1, target & 0xFFF),
    ]
}

fn put_words(data: &mut [u8], addr: u64, words: &[u32]) {
    let mut off = file_offset(addr);
    for w in words {
        data[off..off + 4].copy_from_slice(&w.to_le_bytes());
        off += 4;
    }
}

fn section(name: &str, segname: &str, addr: u64, size: u64, flags: u32) -> Section64 {
    let mut sect = Section64 {
        addr,
        size,
        offset: file_offset(addr) as u32,
        flags,
        ..Default::default()
    };
    sect.set_name(name);
    sect.set_segment_name(segname);
    sect
}

fn segment(name: &str, vmaddr: u64, size: u64, sections: &[Section64]) -> SegmentCommand64 {
    let mut seg = SegmentCommand64 {
        cmdsize: (SegmentCommand64::SIZE + sections.len() * Section64::SIZE) as u32,
        vmaddr,
        vmsize: size,
        fileoff: file_offset(vmaddr) as u64,
        filesize: size,
        maxprot: 5,
        initprot: 5,
        nsects: sections.len() as u32,
        ..Default::default()
    };
    seg.set_name(name);
    seg
}

fn push_segment(cmds: &mut Vec<u8>, seg: &SegmentCommand64, sections: &[Section64]) {
    cmds.extend_from_slice(seg.as_bytes());
    for sect in sections {
        cmds.extend_from_slice(sect.as_bytes());
    }
}
