//! Instruction word reads.

use crate::error::{Error, Result};
use crate::util::read_u32_le;
use crate::view::BinaryView;

/// Size of one arm64 instruction.
pub const INSTRUCTION_SIZE: u64 = 4;

/// Reads the little-endian instruction word at `addr`.
///
/// Fails if the address is unmapped or fewer than four bytes are backed.
pub fn read_instruction<V: BinaryView + ?Sized>(view: &V, addr: u64) -> Result<u32> {
    let bytes = view.read(addr, INSTRUCTION_SIZE as usize)?;
    if bytes.len() < INSTRUCTION_SIZE as usize {
        return Err(Error::ShortRead {
            addr,
            wanted: INSTRUCTION_SIZE as usize,
            got: bytes.len(),
        });
    }
    Ok(read_u32_le(bytes))
}
