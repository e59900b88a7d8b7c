//! Trampoline search around a selector reference.

use tracing::trace;

use super::matcher::matches;
use crate::view::{BinaryView, Region};

/// Distances before the reference at which a trampoline may start, in the
/// order they are tried. 20 is the size of the shape itself; 16 and 24 are
/// observed compiler variants.
pub const CANDIDATE_OFFSETS: [u64; 3] = [20, 16, 24];

/// Returns the candidate start addresses for `reference`, skipping any that
/// underflow or fall outside `code_region`.
pub fn candidates(reference: u64, code_region: &Region) -> impl Iterator<Item = u64> + '_ {
    CANDIDATE_OFFSETS
        .iter()
        .filter_map(move |&off| reference.checked_sub(off))
        .filter(move |&start| code_region.contains(start))
}

/// Returns the first candidate start that holds a trampoline.
///
/// First fit: a later candidate is never preferred over an earlier match.
pub fn locate<V: BinaryView + ?Sized>(view: &V, reference: u64, code_region: &Region) -> Option<u64> {
    let found = candidates(reference, code_region).find(|&start| matches(view, start));
    match found {
        Some(start) => trace!("{reference:#x}: trampoline at {start:#x}"),
        None => trace!("{reference:#x}: no trampoline"),
    }
    found
}
