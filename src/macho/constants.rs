//! Mach-O constants and flags.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 64-bit Mach-O magic (little-endian)
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;

/// 32-bit Mach-O magic (little-endian)
pub const MH_MAGIC: u32 = 0xFEEDFACE;

/// FAT binary magic (stored big-endian)
pub const FAT_MAGIC: u32 = 0xCAFEBABE;

/// 64-bit FAT binary magic (stored big-endian)
pub const FAT_MAGIC_64: u32 = 0xCAFEBABF;

// =============================================================================
// File Types
// =============================================================================

/// Executable
pub const MH_EXECUTE: u32 = 0x2;
/// Dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;
/// Bundle
pub const MH_BUNDLE: u32 = 0x8;

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;

/// ARM CPU type
pub const CPU_TYPE_ARM: u32 = 12;
/// ARM64 CPU type
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;

/// x86 CPU type
pub const CPU_TYPE_X86: u32 = 7;
/// x86_64 CPU type
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;

/// ARM64 all
pub const CPU_SUBTYPE_ARM64_ALL: u32 = 0;
/// ARM64e (pointer authentication)
pub const CPU_SUBTYPE_ARM64E: u32 = 2;

// =============================================================================
// Load Commands
// =============================================================================

/// Link-edit symbol table info
pub const LC_SYMTAB: u32 = 0x2;
/// 64-bit segment
pub const LC_SEGMENT_64: u32 = 0x19;

// =============================================================================
// Section Types
// =============================================================================

/// Section types mask
pub const SECTION_TYPE: u32 = 0x0000_00FF;

/// Regular section
pub const S_REGULAR: u32 = 0x0;
/// Section with literal C strings
pub const S_CSTRING_LITERALS: u32 = 0x2;
/// Section with pointers to literals
pub const S_LITERAL_POINTERS: u32 = 0x5;

bitflags! {
    /// Section attribute bits (the upper 24 bits of `Section64::flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionAttributes: u32 {
        /// Section contains only true machine instructions
        const PURE_INSTRUCTIONS = 0x8000_0000;
        /// Section contains coalesced symbols that are not to be in a ranlib table of contents
        const NO_TOC = 0x4000_0000;
        /// OK to strip static symbols in this section
        const STRIP_STATIC_SYMS = 0x2000_0000;
        /// No dead stripping
        const NO_DEAD_STRIP = 0x1000_0000;
        /// Blocks are live if they reference live blocks
        const LIVE_SUPPORT = 0x0800_0000;
        /// Used with i386 code stubs written on by dyld
        const SELF_MODIFYING_CODE = 0x0400_0000;
        /// A debug section
        const DEBUG = 0x0200_0000;
        /// Section contains some machine instructions
        const SOME_INSTRUCTIONS = 0x0000_0400;
        /// Section has external relocation entries
        const EXT_RELOC = 0x0000_0200;
        /// Section has local relocation entries
        const LOC_RELOC = 0x0000_0100;
    }
}

// =============================================================================
// Symbol Types
// =============================================================================

/// If any of these bits set, a symbolic debugging entry
pub const N_STAB: u8 = 0xE0;
/// Mask for the type bits
pub const N_TYPE: u8 = 0x0E;
/// External symbol bit
pub const N_EXT: u8 = 0x01;

/// Undefined symbol
pub const N_UNDF: u8 = 0x0;
/// Defined in section number n_sect
pub const N_SECT: u8 = 0xE;
