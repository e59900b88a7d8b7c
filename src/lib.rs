//! stubnamer - names Objective-C message-send trampolines in arm64 binaries.
//!
//! Binaries built against recent SDKs route `objc_msgSend` calls through tiny
//! per-selector stubs in `__objc_stubs`. This library finds those stubs by
//! following code references from each selector string and names them
//! `_objc_sendMsg$<selector>`.
//!
//! # Example
//!
//! ```no_run
//! use stubnamer::{name_trampolines, BinaryFile, ScanOptions};
//!
//! fn main() -> stubnamer::Result<()> {
//!     let file = BinaryFile::open("/path/to/binary")?;
//!     let image = file.arm64_image(None)?;
//!
//!     let (report, functions) = name_trampolines(image, &ScanOptions::default())?;
//!     for (addr, name) in functions.named() {
//!         println!("{addr:#018x}  {name}");
//!     }
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arm64;
pub mod binder;
pub mod error;
pub mod image;
pub mod macho;
pub mod trampoline;
pub mod util;
pub mod view;

// Re-export main types
pub use binder::{Binder, FunctionTable};
pub use error::{Error, Result};
pub use image::BinaryFile;
pub use macho::MachOContext;
pub use trampoline::{scan, RenameRequest, ScanEvent, ScanOptions, ScanReport};
pub use view::{BinaryView, MachOView, Region};

/// Scans an arm64 Mach-O image and names its trampolines in a fresh
/// [`FunctionTable`] covering the image's instruction sections.
pub fn name_trampolines(data: &[u8], options: &ScanOptions) -> Result<(ScanReport, FunctionTable)> {
    let view = MachOView::new(data)?;
    let mut functions = FunctionTable::new(view.code_regions().to_vec());
    let report = scan(&view, options, &mut functions)?;
    Ok((report, functions))
}
