//! Selector scan: ties selector strings to the trampolines that load them.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, trace, warn};

use super::locator::locate;
use super::selector::{is_selector_symbol, send_msg_name};
use crate::binder::Binder;
use crate::error::{Error, Result};
use crate::view::{find_region, BinaryView, Region};

/// Section markers used to find the two regions a scan needs.
///
/// Markers are matched case-insensitively as substrings of section names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Marker of the section holding selector name strings
    pub name_section: String,
    /// Marker of the section holding the trampolines
    pub stub_section: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            name_section: "__objc_methname".to_string(),
            stub_section: "__objc_stubs".to_string(),
        }
    }
}

/// A confirmed trampoline and the name it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    /// Trampoline start address
    pub address: u64,
    /// Full function name (`_objc_sendMsg$<selector>`)
    pub name: String,
}

/// Something the scan observed, in traversal order.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A selector string with a selector symbol.
    Selector { address: u64, symbol: String },
    /// A reference outside the stub region; not searched.
    ReferenceSkipped { selector: u64, reference: u64 },
    /// No candidate offset held a trampoline.
    NoTrampoline { selector: u64, reference: u64 },
    /// The trampoline at `address` was renamed.
    Renamed { reference: u64, address: u64, name: String },
    /// The trampoline was already requested by an earlier reference.
    DuplicateTrampoline { reference: u64, address: u64 },
    /// The binder has no function at `address` and could not create one.
    NoFunction { address: u64 },
    /// The binder failed to create or rename the function.
    BinderFailed { address: u64, message: String },
}

/// Result of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Region the selector strings were taken from
    pub name_region: Region,
    /// Region references had to fall in
    pub stub_region: Region,
    /// Number of strings confirmed as selectors
    pub selector_count: usize,
    /// Number of trampolines renamed
    pub trampoline_count: usize,
    /// Successful renames, in order
    pub renames: Vec<RenameRequest>,
    /// Everything else the scan saw
    pub events: Vec<ScanEvent>,
}

impl ScanReport {
    fn new(name_region: Region, stub_region: Region) -> Self {
        Self {
            name_region,
            stub_region,
            selector_count: 0,
            trampoline_count: 0,
            renames: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Counts the references that were skipped for lying outside the stub region.
    pub fn skipped_references(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScanEvent::ReferenceSkipped { .. }))
            .count()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Selectors found: {}", self.selector_count)?;
        write!(f, "Trampolines renamed: {}", self.trampoline_count)
    }
}

/// Scans `view` for selector trampolines and renames them through `binder`.
///
/// A missing name or stub region aborts the scan. Everything that goes
/// wrong for a single string or reference is recorded in the report's
/// events and the scan moves on.
pub fn scan<V, B>(view: &V, options: &ScanOptions, binder: &mut B) -> Result<ScanReport>
where
    V: BinaryView + ?Sized,
    B: Binder + ?Sized,
{
    let name_region = required_region(view, &options.name_section)?;
    let stub_region = required_region(view, &options.stub_section)?;

    info!(
        "Selector names in {}: {:#x} - {:#x}",
        name_region.label, name_region.start, name_region.end
    );
    info!(
        "Trampolines in {}: {:#x} - {:#x}",
        stub_region.label, stub_region.start, stub_region.end
    );

    let mut report = ScanReport::new(name_region.clone(), stub_region.clone());
    let mut requested: HashSet<u64> = HashSet::new();

    for string in view.strings().iter().filter(|s| name_region.contains(s.address)) {
        let Some(symbol) = view.symbol_at(string.address) else {
            continue;
        };
        if !is_selector_symbol(&symbol.name) {
            continue;
        }

        report.selector_count += 1;
        let full_name = send_msg_name(&symbol.name);
        let refs = view.code_refs_to(string.address);
        debug!(
            "Selector {} at {:#x}: {} code references",
            symbol.name,
            string.address,
            refs.len()
        );
        report.events.push(ScanEvent::Selector {
            address: string.address,
            symbol: symbol.name.clone(),
        });

        for &reference in refs {
            if !stub_region.contains(reference) {
                trace!("Skipping reference {reference:#x} (outside {})", stub_region.label);
                report.events.push(ScanEvent::ReferenceSkipped {
                    selector: string.address,
                    reference,
                });
                continue;
            }

            let Some(start) = locate(view, reference, &stub_region) else {
                report.events.push(ScanEvent::NoTrampoline {
                    selector: string.address,
                    reference,
                });
                continue;
            };

            if !requested.insert(start) {
                debug!("Trampoline at {start:#x} already requested");
                report.events.push(ScanEvent::DuplicateTrampoline {
                    reference,
                    address: start,
                });
                continue;
            }

            match bind(binder, start, &full_name) {
                Ok(true) => {
                    debug!("Renamed {start:#x} to {full_name}");
                    report.trampoline_count += 1;
                    report.renames.push(RenameRequest {
                        address: start,
                        name: full_name.clone(),
                    });
                    report.events.push(ScanEvent::Renamed {
                        reference,
                        address: start,
                        name: full_name.clone(),
                    });
                }
                Ok(false) => {
                    debug!("No function obtainable at {start:#x}");
                    report.events.push(ScanEvent::NoFunction { address: start });
                }
                Err(e) => {
                    if e.is_recoverable() {
                        debug!("Binding {start:#x} failed: {e}");
                    } else {
                        warn!("Binding {start:#x} failed: {e}");
                    }
                    report.events.push(ScanEvent::BinderFailed {
                        address: start,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    info!(
        "{} selectors, {} trampolines renamed",
        report.selector_count, report.trampoline_count
    );

    Ok(report)
}

fn required_region<V: BinaryView + ?Sized>(view: &V, marker: &str) -> Result<Region> {
    find_region(view.sections(), marker)
        .cloned()
        .ok_or_else(|| Error::RegionNotFound {
            marker: marker.to_string(),
        })
}

/// Finds or creates the function at `addr` and names it.
///
/// Returns `Ok(false)` if the binder cannot provide a function there.
fn bind<B: Binder + ?Sized>(binder: &mut B, addr: u64, name: &str) -> Result<bool> {
    let function = match binder.functions_at(addr).first().copied() {
        Some(f) => f,
        None => match binder.create_function(addr)? {
            Some(f) => f,
            None => return Ok(false),
        },
    };
    binder.rename(function, name)?;
    Ok(true)
}
