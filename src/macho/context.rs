//! Mach-O context for reading a loaded Mach-O image.

use std::collections::HashMap;

use zerocopy::FromBytes;

use super::constants::*;
use super::structs::*;
use crate::error::{Error, Result};

// =============================================================================
// Segment Info
// =============================================================================

/// Parsed segment information.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// The segment command
    pub command: SegmentCommand64,
    /// Offset of the segment command in the file
    pub command_offset: usize,
    /// Sections in this segment
    pub sections: Vec<SectionInfo>,
}

impl SegmentInfo {
    /// Returns the segment name.
    pub fn name(&self) -> &str {
        self.command.name()
    }

    /// Returns a section by name.
    pub fn section(&self, name: &str) -> Option<&SectionInfo> {
        self.sections.iter().find(|s| s.section.name() == name)
    }
}

/// Parsed section information.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    /// The section structure
    pub section: Section64,
    /// Offset of the section structure in the file
    pub struct_offset: usize,
}

impl SectionInfo {
    /// Returns the section name.
    pub fn name(&self) -> &str {
        self.section.name()
    }

    /// Returns the full name (segment,section).
    pub fn full_name(&self) -> String {
        format!("{},{}", self.section.segment_name(), self.section.name())
    }

    /// Returns the section's virtual address range.
    pub fn addr_range(&self) -> std::ops::Range<u64> {
        self.section.addr..self.section.addr.saturating_add(self.section.size)
    }
}

// =============================================================================
// Load Command Info
// =============================================================================

/// Parsed load command information.
///
/// Only the commands trampoline discovery reads are decoded; the rest are
/// kept as `Unknown`.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum LoadCommandInfo {
    Segment(SegmentInfo),
    Symtab {
        command: SymtabCommand,
        offset: usize,
    },
    Unknown {
        cmd: u32,
        cmdsize: u32,
        offset: usize,
    },
}

impl LoadCommandInfo {
    /// Returns the load command offset.
    pub fn offset(&self) -> usize {
        match self {
            LoadCommandInfo::Segment(s) => s.command_offset,
            LoadCommandInfo::Symtab { offset, .. } => *offset,
            LoadCommandInfo::Unknown { offset, .. } => *offset,
        }
    }
}

// =============================================================================
// Mach-O Context
// =============================================================================

/// A defined symbol read from the `nlist_64` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NlistSymbol {
    /// Symbol value (address)
    pub address: u64,
    /// Symbol name
    pub name: String,
    /// Whether the symbol is external
    pub external: bool,
}

/// Read-only view over a 64-bit Mach-O image.
///
/// `data` is the image itself (a thin file or one slice of a universal
/// binary); all file offsets are relative to its start.
#[derive(Debug)]
pub struct MachOContext<'a> {
    /// The Mach-O header
    pub header: MachHeader64,
    /// Raw image bytes
    pub data: &'a [u8],
    /// Parsed load commands
    pub load_commands: Vec<LoadCommandInfo>,
    /// Segment lookup by name
    segment_indices: HashMap<String, usize>,
}

impl<'a> MachOContext<'a> {
    /// Parses a Mach-O image.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < MachHeader64::SIZE {
            return Err(Error::buffer_too_small(MachHeader64::SIZE, data.len()));
        }

        let header = MachHeader64::read_from_prefix(data)
            .map_err(|_| Error::InvalidMachoMagic(0))?
            .0;

        if !header.is_valid() {
            return Err(Error::InvalidMachoMagic(header.magic));
        }

        let mut ctx = Self {
            header,
            data,
            load_commands: Vec::new(),
            segment_indices: HashMap::new(),
        };

        ctx.parse_load_commands()?;

        Ok(ctx)
    }

    /// Parses all load commands.
    fn parse_load_commands(&mut self) -> Result<()> {
        let mut offset = MachHeader64::SIZE;
        let end_offset = MachHeader64::SIZE + self.header.sizeofcmds as usize;

        for _ in 0..self.header.ncmds {
            if offset + LoadCommand::SIZE > end_offset
                || offset + LoadCommand::SIZE > self.data.len()
            {
                return Err(Error::LoadCommandOverflow { offset });
            }

            let lc = LoadCommand::read_from_prefix(&self.data[offset..])
                .map_err(|_| Error::parse(offset, "failed to parse load command"))?
                .0;

            let cmdsize = lc.cmdsize as usize;
            if cmdsize < LoadCommand::SIZE || offset + cmdsize > self.data.len() {
                return Err(Error::LoadCommandOverflow { offset });
            }

            let cmd_info = self.parse_load_command(lc.cmd, lc.cmdsize, offset)?;

            if let LoadCommandInfo::Segment(ref seg) = cmd_info {
                self.segment_indices
                    .insert(seg.name().to_string(), self.load_commands.len());
            }

            self.load_commands.push(cmd_info);
            offset += cmdsize;
        }

        Ok(())
    }

    /// Parses a single load command.
    fn parse_load_command(&self, cmd: u32, cmdsize: u32, offset: usize) -> Result<LoadCommandInfo> {
        let data = &self.data[offset..offset + cmdsize as usize];

        match cmd {
            LC_SEGMENT_64 => {
                let seg = SegmentCommand64::read_from_prefix(data)
                    .map_err(|_| Error::parse(offset, "failed to parse segment command"))?
                    .0;

                let sects_end = SegmentCommand64::SIZE + seg.nsects as usize * Section64::SIZE;
                if sects_end > data.len() {
                    return Err(Error::LoadCommandOverflow { offset });
                }

                let sections = (0..seg.nsects as usize)
                    .map(|i| {
                        let rel = SegmentCommand64::SIZE + i * Section64::SIZE;
                        Section64::read_from_prefix(&data[rel..])
                            .map(|(section, _)| SectionInfo {
                                section,
                                struct_offset: offset + rel,
                            })
                            .map_err(|_| Error::parse(offset + rel, "failed to parse section"))
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(LoadCommandInfo::Segment(SegmentInfo {
                    command: seg,
                    command_offset: offset,
                    sections,
                }))
            }

            LC_SYMTAB => {
                let symtab = SymtabCommand::read_from_prefix(data)
                    .map_err(|_| Error::parse(offset, "failed to parse symtab command"))?
                    .0;

                Ok(LoadCommandInfo::Symtab {
                    command: symtab,
                    offset,
                })
            }

            _ => Ok(LoadCommandInfo::Unknown {
                cmd,
                cmdsize,
                offset,
            }),
        }
    }

    /// Returns a reference to a segment by name.
    pub fn segment(&self, name: &str) -> Option<&SegmentInfo> {
        self.segment_indices.get(name).and_then(|&idx| {
            if let LoadCommandInfo::Segment(ref seg) = self.load_commands[idx] {
                Some(seg)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over all segments.
    pub fn segments(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.load_commands.iter().filter_map(|lc| {
            if let LoadCommandInfo::Segment(seg) = lc {
                Some(seg)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over every section of every segment.
    pub fn sections(&self) -> impl Iterator<Item = &SectionInfo> {
        self.segments().flat_map(|seg| seg.sections.iter())
    }

    /// Returns a section by segment and section name.
    pub fn section(&self, segment: &str, section: &str) -> Option<&SectionInfo> {
        self.segment(segment)?.section(section)
    }

    /// Returns the symbol table command.
    pub fn symtab(&self) -> Option<&SymtabCommand> {
        self.load_commands.iter().find_map(|lc| {
            if let LoadCommandInfo::Symtab { command, .. } = lc {
                Some(command)
            } else {
                None
            }
        })
    }

    /// Returns true if this is an ARM64 binary.
    pub fn is_arm64(&self) -> bool {
        self.header.is_arm64()
    }

    /// Returns the address the image expects to be loaded at (the `__TEXT`
    /// segment's vmaddr, or the lowest file-backed segment).
    pub fn base_address(&self) -> u64 {
        self.segment("__TEXT")
            .map(|s| s.command.vmaddr)
            .or_else(|| {
                self.segments()
                    .filter(|s| s.command.filesize > 0)
                    .map(|s| s.command.vmaddr)
                    .min()
            })
            .unwrap_or(0)
    }

    /// Returns the bytes of a section, or an empty slice for zerofill or
    /// truncated sections.
    pub fn section_data(&self, section: &SectionInfo) -> &'a [u8] {
        let start = section.section.offset as usize;
        let end = start.saturating_add(section.section.size as usize);
        if section.section.offset == 0 || end > self.data.len() {
            return &[];
        }
        &self.data[start..end]
    }

    /// Reads data at the specified file offset.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.data.len()))?;
        if end > self.data.len() {
            return Err(Error::buffer_too_small(end, self.data.len()));
        }
        Ok(&self.data[offset..end])
    }

    /// Returns up to `len` bytes starting at a virtual address.
    ///
    /// The slice is cut short at the end of the segment's file-backed range.
    pub fn read_addr(&self, addr: u64, len: usize) -> Result<&'a [u8]> {
        let seg = self
            .segments()
            .find(|seg| seg.command.maps_addr(addr))
            .ok_or_else(|| Error::address_not_found(addr))?;

        let rel = addr - seg.command.vmaddr;
        let remaining = seg.command.filesize.min(seg.command.vmsize) - rel;
        let start = (seg.command.fileoff + rel) as usize;
        let take = (len as u64).min(remaining) as usize;
        let end = start.saturating_add(take).min(self.data.len());

        if start >= self.data.len() {
            return Err(Error::address_not_found(addr));
        }
        Ok(&self.data[start..end])
    }

    /// Converts a virtual address to a file offset within this Mach-O.
    pub fn addr_to_offset(&self, addr: u64) -> Option<usize> {
        self.segments()
            .find(|seg| seg.command.maps_addr(addr))
            .map(|seg| (seg.command.fileoff + (addr - seg.command.vmaddr)) as usize)
    }

    /// Returns true if the address is within any segment of this Mach-O.
    pub fn contains_addr(&self, addr: u64) -> bool {
        self.segments().any(|seg| {
            addr >= seg.command.vmaddr && addr - seg.command.vmaddr < seg.command.vmsize
        })
    }

    /// Reads the defined, non-debug symbols of the `nlist_64` table.
    pub fn defined_symbols(&self) -> Result<Vec<NlistSymbol>> {
        let Some(symtab) = self.symtab() else {
            return Ok(Vec::new());
        };

        let table = self.read_at(symtab.symoff as usize, symtab.nsyms as usize * Nlist64::SIZE)?;
        let strings = self.read_at(symtab.stroff as usize, symtab.strsize as usize)?;

        let mut symbols = Vec::new();
        for chunk in table.chunks_exact(Nlist64::SIZE) {
            let entry = Nlist64::read_from_bytes(chunk)
                .map_err(|_| Error::parse(symtab.symoff as usize, "failed to parse nlist"))?;

            if entry.is_debug() || !entry.is_defined() {
                continue;
            }

            let strx = entry.n_strx as usize;
            if strx >= strings.len() {
                return Err(Error::StringTableOverflow {
                    offset: entry.n_strx,
                    size: symtab.strsize,
                });
            }
            let raw = &strings[strx..];
            let name = &raw[..crate::util::memchr_null(raw)];
            if name.is_empty() {
                continue;
            }

            symbols.push(NlistSymbol {
                address: entry.n_value,
                name: String::from_utf8_lossy(name).into_owned(),
                external: entry.is_external(),
            });
        }

        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes;

    use super::*;

    fn create_minimal_macho() -> Vec<u8> {
        let mut data = vec![0u8; 0x2000];
        let cmds_size = SegmentCommand64::SIZE + Section64::SIZE + SymtabCommand::SIZE;

        let header = MachHeader64 {
            ncmds: 2,
            sizeofcmds: cmds_size as u32,
            ..Default::default()
        };
        data[..MachHeader64::SIZE].copy_from_slice(header.as_bytes());

        let mut seg = SegmentCommand64::default();
        seg.set_name("__TEXT");
        seg.cmdsize = (SegmentCommand64::SIZE + Section64::SIZE) as u32;
        seg.vmaddr = 0x1_0000_0000;
        seg.vmsize = 0x2000;
        seg.filesize = 0x1800;
        seg.nsects = 1;

        let mut sect = Section64::default();
        sect.set_name("__cstring");
        sect.set_segment_name("__TEXT");
        sect.addr = 0x1_0000_1000;
        sect.size = 0x10;
        sect.offset = 0x1000;
        sect.flags = S_CSTRING_LITERALS;

        let symtab = SymtabCommand {
            symoff: 0x1100,
            nsyms: 2,
            stroff: 0x1200,
            strsize: 0x20,
            ..Default::default()
        };

        let mut off = MachHeader64::SIZE;
        data[off..off + SegmentCommand64::SIZE].copy_from_slice(seg.as_bytes());
        off += SegmentCommand64::SIZE;
        data[off..off + Section64::SIZE].copy_from_slice(sect.as_bytes());
        off += Section64::SIZE;
        data[off..off + SymtabCommand::SIZE].copy_from_slice(symtab.as_bytes());

        data[0x1000..0x1005].copy_from_slice(b"hello");

        let main = Nlist64 {
            n_strx: 1,
            n_type: N_SECT | N_EXT,
            n_sect: 1,
            n_value: 0x1_0000_1000,
            ..Default::default()
        };
        let undef = Nlist64 {
            n_strx: 7,
            n_type: N_UNDF | N_EXT,
            ..Default::default()
        };
        data[0x1100..0x1110].copy_from_slice(main.as_bytes());
        data[0x1110..0x1120].copy_from_slice(undef.as_bytes());
        data[0x1200..0x1212].copy_from_slice(b"\0_main\0_objc_msgS\0");

        data
    }

    #[test]
    fn test_parse_minimal_macho() {
        let data = create_minimal_macho();
        let ctx = MachOContext::new(&data).unwrap();

        assert!(ctx.header.is_valid());
        assert!(ctx.is_arm64());
        assert_eq!(ctx.base_address(), 0x1_0000_0000);
        let sect = ctx.section("__TEXT", "__cstring").unwrap();
        assert_eq!(sect.full_name(), "__TEXT,__cstring");
        let bytes = ctx.section_data(sect);
        assert_eq!(bytes.len(), 0x10);
        assert!(bytes.starts_with(b"hello\0"));
    }

    #[test]
    fn test_read_addr_is_cut_at_segment_end() {
        let data = create_minimal_macho();
        let ctx = MachOContext::new(&data).unwrap();

        assert_eq!(ctx.read_addr(0x1_0000_1000, 5).unwrap(), b"hello");
        assert_eq!(ctx.read_addr(0x1_0000_17FE, 4).unwrap().len(), 2);
        // vm-only tail and unmapped space
        assert!(ctx.read_addr(0x1_0000_1900, 4).is_err());
        assert!(ctx.read_addr(0x2000, 4).is_err());
        assert!(ctx.contains_addr(0x1_0000_1900));
        assert_eq!(ctx.addr_to_offset(0x1_0000_1004), Some(0x1004));
    }

    #[test]
    fn test_defined_symbols() {
        let data = create_minimal_macho();
        let ctx = MachOContext::new(&data).unwrap();

        let syms = ctx.defined_symbols().unwrap();
        assert_eq!(
            syms,
            vec![NlistSymbol {
                address: 0x1_0000_1000,
                name: "_main".into(),
                external: true,
            }]
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            MachOContext::new(&[0u8; 8]),
            Err(Error::BufferTooSmall { .. })
        ));
        assert!(matches!(
            MachOContext::new(&[0u8; 64]),
            Err(Error::InvalidMachoMagic(0))
        ));

        let mut data = create_minimal_macho();
        // Claim more commands than fit in sizeofcmds
        data[16..20].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(
            MachOContext::new(&data),
            Err(Error::LoadCommandOverflow { .. })
        ));
    }
}
