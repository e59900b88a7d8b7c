//! Mach-O file format handling.
//!
//! Read-only parsing of 64-bit Mach-O images: header, segments, sections and
//! the symbol table, plus slicing of universal binaries.

mod constants;
mod context;
mod fat;
mod structs;

pub use constants::*;
pub use context::*;
pub use fat::*;
pub use structs::*;
