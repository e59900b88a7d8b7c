//! Memory-mapped binaries on disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::macho::{is_fat, select_arm64_slice};

/// A binary file mapped read-only into memory.
#[derive(Debug)]
pub struct BinaryFile {
    /// Memory-mapped file data
    pub mmap: Mmap,
    /// Path to the file
    pub path: PathBuf,
}

impl BinaryFile {
    /// Opens and maps the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;

        debug!(
            "Mapped {} ({:#x} bytes{})",
            path.display(),
            mmap.len(),
            if is_fat(&mmap) { ", universal" } else { "" }
        );

        Ok(Self { mmap, path })
    }

    /// Returns the whole file.
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Returns the arm64 image, picking a slice out of universal files.
    pub fn arm64_image(&self, arch: Option<&str>) -> Result<&[u8]> {
        select_arm64_slice(&self.mmap, arch)
    }
}
