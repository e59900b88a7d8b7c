//! ARM64 instruction classification and the few decoders reference
//! discovery needs.
//!
//! Only the fields required to tell instruction classes apart (and to
//! follow an ADRP pair to its target) are decoded. Encoders exist for
//! building test images.

/// Coarse instruction class used by the trampoline matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrClass {
    /// ADRP: page-relative address materialization.
    AddressPageBase,
    /// LDR Xt: 64-bit register load from memory.
    LoadRegister,
    /// BR Xn: branch to an address held in a register.
    BranchToRegister,
    /// Anything else.
    Other,
}

/// Classifies a raw instruction word.
///
/// The patterns are mutually exclusive: the ADRP pattern requires bit 28
/// set and bits 27..24 clear, which both the LDR (0xF9) and BR (0xD6)
/// top bytes violate.
#[inline]
pub fn classify(instr: u32) -> InstrClass {
    if is_adrp(instr) {
        InstrClass::AddressPageBase
    } else if is_ldr_x(instr) {
        InstrClass::LoadRegister
    } else if is_br(instr) {
        InstrClass::BranchToRegister
    } else {
        InstrClass::Other
    }
}

// =============================================================================
// Instruction Detection
// =============================================================================

/// Returns true if the instruction is ADRP.
///
/// Bits 29 (immlo) and 24 are left unconstrained.
#[inline]
pub fn is_adrp(instr: u32) -> bool {
    (instr & 0x9F00_0000) == 0x9000_0000
}

/// Returns true if the instruction is a 64-bit LDR/STR family encoding with
/// a 0xF9 top byte (only the top byte is pinned).
#[inline]
pub fn is_ldr_x(instr: u32) -> bool {
    (instr & 0xFF00_0000) == 0xF900_0000
}

/// Returns true if the instruction is BR (branch to register).
#[inline]
pub fn is_br(instr: u32) -> bool {
    (instr & 0xFFFF_FC1F) == 0xD61F_0000
}

/// Returns true if the instruction is ADD (immediate).
#[inline]
pub fn is_add_imm(instr: u32) -> bool {
    (instr & 0x7F80_0000) == 0x1100_0000
}

/// Returns true if the instruction is LDR (unsigned immediate), any size.
#[inline]
pub fn is_ldr_unsigned_imm(instr: u32) -> bool {
    (instr & 0x3B40_0000) == 0x3940_0000
}

// =============================================================================
// Instruction Decoding
// =============================================================================

/// Decodes an ADRP instruction, returning the target page address.
pub fn decode_adrp(instr: u32, pc: u64) -> u64 {
    let immlo = ((instr >> 29) & 0x3) as u64;
    let immhi = ((instr >> 5) & 0x7_FFFF) as u64;
    let imm = (immhi << 2) | immlo;

    // Sign extend the 21-bit immediate
    let imm = if (imm & (1 << 20)) != 0 {
        imm | 0xFFFF_FFFF_FFE0_0000
    } else {
        imm
    };

    (pc & !0xFFF).wrapping_add(imm << 12)
}

/// Decodes an ADD (immediate) instruction, returning the immediate value.
pub fn decode_add_imm(instr: u32) -> u32 {
    let imm12 = (instr >> 10) & 0xFFF;
    let shift = (instr >> 22) & 0x3;
    if shift == 1 { imm12 << 12 } else { imm12 }
}

/// Decodes an LDR (unsigned immediate) instruction, returning the byte offset.
pub fn decode_ldr_offset(instr: u32) -> u32 {
    let imm12 = (instr >> 10) & 0xFFF;
    let size = (instr >> 30) & 0x3;
    imm12 << size
}

/// Gets the destination register of ADRP/ADD/LDR.
#[inline]
pub fn rd(instr: u32) -> u8 {
    (instr & 0x1F) as u8
}

/// Gets the base register of ADD/LDR, or the source register of BR.
#[inline]
pub fn rn(instr: u32) -> u8 {
    ((instr >> 5) & 0x1F) as u8
}

/// How the second instruction of an ADRP pair consumes the page address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// ADRP + ADD: the pair computes an address.
    Add,
    /// ADRP + LDR: the pair loads from an address.
    Load,
}

/// Follows an ADRP+ADD or ADRP+LDR sequence to get the target address.
///
/// The second instruction must use the ADRP destination as its base.
pub fn follow_adrp_pair(adrp_addr: u64, instr0: u32, instr1: u32) -> Option<(u64, PairKind)> {
    if !is_adrp(instr0) || rn(instr1) != rd(instr0) {
        return None;
    }

    let page = decode_adrp(instr0, adrp_addr);

    if is_add_imm(instr1) {
        Some((page.wrapping_add(decode_add_imm(instr1) as u64), PairKind::Add))
    } else if is_ldr_unsigned_imm(instr1) {
        Some((page.wrapping_add(decode_ldr_offset(instr1) as u64), PairKind::Load))
    } else {
        None
    }
}

// =============================================================================
// Instruction Encoding
// =============================================================================

/// Encodes an ADRP instruction.
pub fn encode_adrp(rd: u8, pc: u64, target: u64) -> u32 {
    let delta = (target & !0xFFF).wrapping_sub(pc & !0xFFF) as i64;
    let imm = (delta >> 12) as u32;

    let immlo = (imm & 0x3) << 29;
    let immhi = ((imm >> 2) & 0x7_FFFF) << 5;

    0x9000_0000 | immlo | immhi | (rd as u32)
}

/// Encodes a 64-bit ADD (immediate) instruction.
pub fn encode_add_imm(rd: u8, rn: u8, imm: u32) -> u32 {
    let imm12 = (imm & 0xFFF) << 10;
    0x9100_0000 | imm12 | ((rn as u32) << 5) | (rd as u32)
}

/// Encodes a 64-bit LDR (unsigned immediate); `offset` is in bytes.
pub fn encode_ldr_unsigned(rt: u8, rn: u8, offset: u64) -> u32 {
    let imm12 = ((offset >> 3) & 0xFFF) as u32;
    0xF940_0000 | (imm12 << 10) | ((rn as u32) << 5) | (rt as u32)
}

/// Encodes a BR (branch to register) instruction.
pub fn encode_br(rn: u8) -> u32 {
    0xD61F_0000 | ((rn as u32) << 5)
}

/// Encodes a NOP instruction.
pub fn encode_nop() -> u32 {
    0xD503_201F
}

/// Encodes a BRK (trap) instruction.
pub fn encode_brk(imm: u16) -> u32 {
    0xD420_0000 | ((imm as u32) << 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stub_words() {
        assert_eq!(classify(0x9000_0010), InstrClass::AddressPageBase); // ADRP X16
        assert_eq!(classify(0xB000_0001), InstrClass::AddressPageBase); // ADRP, immlo set
        assert_eq!(classify(0xF940_0210), InstrClass::LoadRegister); // LDR X16, [X16]
        assert_eq!(classify(0xD61F_0200), InstrClass::BranchToRegister); // BR X16
        assert_eq!(classify(encode_nop()), InstrClass::Other);
        assert_eq!(classify(encode_brk(1)), InstrClass::Other);
        assert_eq!(classify(0xD65F_03C0), InstrClass::Other); // RET
    }

    #[test]
    fn test_patterns_are_exclusive() {
        // Walk the top byte and a spread of low bits
        for top in 0u32..=0xFF {
            for low in [0u32, 0x1F, 0x3E0, 0x3FF, 0xFC00, 0x00FF_FFFF] {
                let w = (top << 24) | low;
                let hits = [is_adrp(w), is_ldr_x(w), is_br(w)]
                    .iter()
                    .filter(|&&b| b)
                    .count();
                assert!(hits <= 1, "{w:#x} matched {hits} classes");
            }
        }
    }

    #[test]
    fn test_br_register_field_only() {
        for reg in 0..32 {
            assert!(is_br(encode_br(reg)));
        }
        // BLR X16 flips bit 21
        assert!(!is_br(0xD63F_0200));
    }

    #[test]
    fn test_encode_decode_adrp() {
        let pc = 0x1_8000_0000u64;
        let target = 0x1_8000_1000u64;

        let instr = encode_adrp(16, pc, target);
        assert!(is_adrp(instr));
        assert_eq!(decode_adrp(instr, pc), target & !0xFFF);

        // Backwards
        let instr = encode_adrp(1, 0x1_0000_5000, 0x1_0000_2123);
        assert_eq!(decode_adrp(instr, 0x1_0000_5000), 0x1_0000_2000);
    }

    #[test]
    fn test_follow_adrp_pair() {
        let pc = 0x1_0000_1100u64;
        let slot = 0x1_0000_2008u64;
        let adrp = encode_adrp(1, pc, slot);
        let ldr = encode_ldr_unsigned(1, 1, slot & 0xFFF);
        assert!(is_ldr_x(ldr));
        assert_eq!(follow_adrp_pair(pc, adrp, ldr), Some((slot, PairKind::Load)));

        let add = encode_add_imm(1, 1, 0x234);
        assert_eq!(
            follow_adrp_pair(pc, adrp, add),
            Some((0x1_0000_2234, PairKind::Add))
        );

        // Base register mismatch
        let ldr_other = encode_ldr_unsigned(2, 2, 8);
        assert_eq!(follow_adrp_pair(pc, adrp, ldr_other), None);
        assert_eq!(follow_adrp_pair(pc, encode_nop(), ldr), None);
    }
}
