//! Discovery of MMIO windows of devices in the device tree

use crate::resource::{MmioWindow, ResourceError};
use core::mem;
use device_tree::fdt::{FlattenedDeviceTree, StructureNode};
use hob::{HobError, HobList};
use thiserror_no_std::Error;

const WORD_SIZE: usize = mem::size_of::<u64>();
const PAIR_SIZE: usize = 2 * WORD_SIZE;

/// Why the `reg` property of a matching node was not used
#[derive(Debug, Error, Eq, PartialEq, Copy, Clone)]
pub enum MalformedReg {
    #[error("the node has no reg property")]
    Missing,
    #[error("the reg property is {0} bytes long but a (base, size) pair needs 16")]
    TooShort(usize),
    #[error("the reg property is {0} bytes long which is more than one pair but less than two")]
    IncompleteSecondPair(usize),
    #[error("{0}")]
    InvalidWindow(#[from] ResourceError),
}

/// The windows described by a single `reg` property.
///
/// Devices like PCIe host bridges expose a second window (e.g. for configuration space) next to their registers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegWindows {
    pub first: MmioWindow,
    pub second: Option<MmioWindow>,
}

impl RegWindows {
    pub fn iter(&self) -> impl Iterator<Item = MmioWindow> {
        core::iter::once(self.first).chain(self.second)
    }
}

/// The outcome of scanning a device tree for one `compatible` identifier
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ScanReport {
    /// How many nodes were compatible
    pub matched: usize,
    /// How many resource HOBs were added
    pub windows: usize,
    /// How many compatible nodes were ignored because of their `reg` property
    pub skipped: usize,
}

/// Extract the MMIO windows from the `reg` property of `node`.
///
/// The property is interpreted as big-endian `(base, size)` pairs of 64-bit words.
/// A value of exactly one pair yields one window. A longer value must hold at least two complete pairs and yields
/// two windows, anything after the second pair (including a partial word) is ignored.
/// Both windows are validated before anything is returned.
pub fn reg_windows(node: &StructureNode<'_>) -> Result<RegWindows, MalformedReg> {
    let reg = node.prop("reg").ok_or(MalformedReg::Missing)?;
    let len = reg.value.len();
    let word = |i: usize| {
        reg.value
            .get(i * WORD_SIZE..(i + 1) * WORD_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u64::from_be_bytes)
    };

    let (base, size) = match (word(0), word(1)) {
        (Some(base), Some(size)) => (base, size),
        _ => return Err(MalformedReg::TooShort(len)),
    };
    let first = MmioWindow::normalize(base, size)?;
    if len == PAIR_SIZE {
        return Ok(RegWindows {
            first,
            second: None,
        });
    }

    let (base, size) = match (word(2), word(3)) {
        (Some(base), Some(size)) => (base, size),
        _ => return Err(MalformedReg::IncompleteSecondPair(len)),
    };
    let second = MmioWindow::normalize(base, size)?;
    if len > 2 * PAIR_SIZE {
        log::debug!(
            "{}: ignoring {} bytes of reg after the second entry",
            node.name,
            len - 2 * PAIR_SIZE
        );
    }

    Ok(RegWindows {
        first,
        second: Some(second),
    })
}

/// Add a resource HOB for every MMIO window of every node that is compatible with `compatible`.
///
/// Nodes are visited in tree order.
/// A node whose `reg` property is missing or malformed is skipped and the scan continues with the next node.
/// Only failing to add a HOB aborts the scan.
pub fn scan(
    dtb: &FlattenedDeviceTree<'_>,
    compatible: &str,
    hobs: &mut HobList<'_>,
) -> Result<ScanReport, HobError> {
    let mut report = ScanReport::default();

    for node in dtb.compatible_nodes(compatible) {
        report.matched += 1;
        match reg_windows(&node) {
            Ok(windows) => {
                for window in windows.iter() {
                    window.announce(hobs)?;
                    report.windows += 1;
                }
            }
            Err(e) => {
                log::warn!("skipping {} node {}: {}", compatible, node.name, e);
                report.skipped += 1;
            }
        }
    }

    log::info!(
        "found {} {} nodes with {} MMIO windows",
        report.matched,
        compatible,
        report.windows
    );
    Ok(report)
}
