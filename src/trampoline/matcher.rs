//! The five-instruction trampoline shape.

use tracing::trace;

use super::reader::{read_instruction, INSTRUCTION_SIZE};
use crate::arm64::{classify, InstrClass};
use crate::view::BinaryView;

/// Required class of each slot, in order.
pub const TRAMPOLINE_SHAPE: [InstrClass; 5] = [
    InstrClass::AddressPageBase,
    InstrClass::LoadRegister,
    InstrClass::AddressPageBase,
    InstrClass::LoadRegister,
    InstrClass::BranchToRegister,
];

/// Size of the trampoline in bytes.
pub const TRAMPOLINE_SIZE: u64 = TRAMPOLINE_SHAPE.len() as u64 * INSTRUCTION_SIZE;

/// Returns true if the five words at `start` classify as
/// ADRP, LDR, ADRP, LDR, BR.
///
/// A failed read of any slot rejects the candidate.
pub fn matches<V: BinaryView + ?Sized>(view: &V, start: u64) -> bool {
    for (slot, expected) in TRAMPOLINE_SHAPE.iter().enumerate() {
        let Some(addr) = start.checked_add(slot as u64 * INSTRUCTION_SIZE) else {
            return false;
        };
        match read_instruction(view, addr) {
            Ok(word) if classify(word) == *expected => {}
            Ok(word) => {
                trace!("{start:#x}: slot {slot} is {word:#010x}, wanted {expected:?}");
                return false;
            }
            Err(e) => {
                trace!("{start:#x}: slot {slot} unreadable: {e}");
                return false;
            }
        }
    }
    true
}
