//! Error types for trampoline discovery.
//!
//! Loading errors (I/O, Mach-O parsing) abort whatever command hit them.
//! Read and binder errors are local: the scan records them and moves on.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for binary loading and trampoline scanning.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Mach-O Errors ====================
    #[error("invalid Mach-O magic: {0:#x}")]
    InvalidMachoMagic(u32),

    #[error("unsupported architecture: cputype {cputype:#x} (only arm64 is handled)")]
    UnsupportedArchitecture { cputype: u32 },

    #[error("no slice in universal binary matches architecture '{arch}'")]
    NoMatchingSlice { arch: String },

    #[error("load command at offset {offset:#x} extends beyond header")]
    LoadCommandOverflow { offset: usize },

    #[error("string table offset {offset} out of bounds (size: {size})")]
    StringTableOverflow { offset: u32, size: u32 },

    #[error("parse error at offset {offset:#x}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    // ==================== Read Errors ====================
    #[error("address {addr:#x} is not backed by file data")]
    AddressNotFound { addr: u64 },

    #[error("short read at {addr:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead { addr: u64, wanted: usize, got: usize },

    // ==================== Scan Errors ====================
    #[error("no section matching '{marker}' found in the binary")]
    RegionNotFound { marker: String },

    #[error("no function known at {addr:#x}")]
    UnknownFunction { addr: u64 },
}

/// A specialized Result type for stubnamer operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error only invalidates a single candidate or
    /// reference and should not stop a scan.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AddressNotFound { .. } | Error::ShortRead { .. } | Error::UnknownFunction { .. }
        )
    }

    /// Creates a parse error with a formatted message.
    #[inline]
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates an address not found error.
    #[inline]
    pub fn address_not_found(addr: u64) -> Self {
        Error::AddressNotFound { addr }
    }

    /// Creates a buffer too small error.
    #[inline]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Error::BufferTooSmall { needed, available }
    }
}
