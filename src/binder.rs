//! Function creation and renaming.
//!
//! The scanner only ever asks a [`Binder`] three things: which functions
//! start at an address, to create one there, and to rename one. Anything
//! the host needs to make a name stick belongs in the implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::view::Region;

/// Sink for trampoline names.
pub trait Binder {
    /// Handle to a function owned by the binder.
    type Function: Copy + fmt::Debug;

    /// Returns the functions starting at `addr`.
    fn functions_at(&self, addr: u64) -> Vec<Self::Function>;

    /// Creates a function at `addr`; `Ok(None)` if none can exist there.
    fn create_function(&mut self, addr: u64) -> Result<Option<Self::Function>>;

    /// Sets the name of `function`. Renaming to the current name is a no-op.
    fn rename(&mut self, function: Self::Function, name: &str) -> Result<()>;
}

/// An in-memory function table keyed by start address.
///
/// Functions can only be created inside the configured code regions.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    code_regions: Vec<Region>,
    functions: BTreeMap<u64, Option<String>>,
}

impl FunctionTable {
    /// Creates an empty table accepting functions inside `code_regions`.
    pub fn new(code_regions: Vec<Region>) -> Self {
        Self {
            code_regions,
            functions: BTreeMap::new(),
        }
    }

    /// Registers an unnamed function, e.g. one discovered by other means.
    pub fn insert(&mut self, addr: u64) {
        self.functions.entry(addr).or_insert(None);
    }

    /// Returns the name of the function at `addr`.
    pub fn name_of(&self, addr: u64) -> Option<&str> {
        self.functions.get(&addr)?.as_deref()
    }

    /// Returns the number of known functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if the table holds no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the named functions, sorted by address.
    pub fn named(&self) -> impl Iterator<Item = (u64, &str)> {
        self.functions
            .iter()
            .filter_map(|(&addr, name)| name.as_deref().map(|n| (addr, n)))
    }

    /// Writes one `<address>  <name>` line per named function.
    pub fn write_symbol_map<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for (addr, name) in self.named() {
            writeln!(out, "{addr:#018x}  {name}")?;
        }
        out.flush()
    }

    /// Writes the symbol map to the file at `path`, replacing it.
    pub fn save_symbol_map<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        File::create(path)
            .and_then(|file| self.write_symbol_map(BufWriter::new(file)))
            .map_err(|e| Error::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn in_code(&self, addr: u64) -> bool {
        self.code_regions.iter().any(|r| r.contains(addr))
    }
}

impl Binder for FunctionTable {
    type Function = u64;

    fn functions_at(&self, addr: u64) -> Vec<u64> {
        if self.functions.contains_key(&addr) {
            vec![addr]
        } else {
            Vec::new()
        }
    }

    fn create_function(&mut self, addr: u64) -> Result<Option<u64>> {
        if !self.in_code(addr) {
            return Ok(None);
        }
        self.insert(addr);
        Ok(Some(addr))
    }

    fn rename(&mut self, function: u64, name: &str) -> Result<()> {
        let slot = self
            .functions
            .get_mut(&function)
            .ok_or(Error::UnknownFunction { addr: function })?;
        if slot.as_deref() != Some(name) {
            *slot = Some(name.to_string());
        }
        Ok(())
    }
}
