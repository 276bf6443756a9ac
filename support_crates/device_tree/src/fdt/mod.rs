//! Flattened Device Tree (also called Device-Tree-Blob) handling
//!
//! A blob is one contiguous, pointer-free buffer: a fixed size [`FdtHeader`] that locates three variable sized blocks
//! (memory reservations, structure, strings). Offsets in the header are relative to the start of the blob, so the
//! blocks may be separated by unused bytes and do not have to appear in any particular order, although every blob
//! written by this crate lays them out like this:
//!
//! ```text
//!  offset 0 ─► ┌───────────────────────┐
//!              │ header (40 bytes)     │
//!              ├───────────────────────┤ ◄─ off_mem_rsvmap, 8-byte aligned
//!              │ reservation entries   │
//!              │ (0, 0) terminator     │
//!              ├───────────────────────┤ ◄─ off_dt_struct, 4-byte aligned
//!              │ token stream          │
//!              ├───────────────────────┤ ◄─ off_dt_strings
//!              │ property names        │
//!              ├───────────────────────┤
//!              │ unused                │
//!  total_size ►└───────────────────────┘
//! ```
//!
//! The format is described in chapter 5 of the
//! [Devicetree Specification](https://devicetree-specification.readthedocs.io/en/latest/chapter5-flattened-format.html).
//!
//! # Example
//!
//! Parse the device tree of a sample board (in this case a reduced SG2042 tree) and look up its PCIe host bridge
//!
//! ```rust
//! # use align_data::{include_aligned, Align64};
//! # use device_tree::fdt::FlattenedDeviceTree;
//! # static DTB: &[u8] = include_aligned!(Align64, "../../test/data/sg2042_minimal.dtb");
//! let dtb = FlattenedDeviceTree::from_buffer(DTB).unwrap();
//! assert_eq!(dtb.structure.name, "");
//! assert_eq!(dtb.structure.children().nth(0).unwrap().name, "cpus");
//!
//! let pcie = dtb.compatible_nodes("sophgo,cdns-pcie-host").next().unwrap();
//! let reg = pcie.prop("reg").unwrap().as_u64_words().unwrap();
//! assert_eq!(reg.len(), 4);
//! ```
//!

#[cfg(any(test, feature = "builder"))]
pub mod builder;
mod cursor;
mod dtb;
mod header;
mod memory_reservation;
mod open_into;
mod strings;
mod structure;

pub use cursor::{Cursor, CursorError};
pub use dtb::{FdtError, FlattenedDeviceTree};
pub use header::{
    FdtHeader, HeaderReadError, FDT_LAST_COMP_VERSION, FDT_VERSION, HEADER_MAGIC, HEADER_SIZE,
};
pub use memory_reservation::{
    MemoryReservationBlock, MemoryReservationEntry, MemoryReservationFormatError,
    MemoryReservationIter,
};
pub use open_into::OpenIntoError;
pub use strings::{Strings, StringsError};
pub use structure::node::{NodeIter, NodeStructureError, NodeWalk, StructureNode, MAX_NODE_DEPTH};
pub use structure::property::{NodeProperty, PropertyIter, PropertyParseError};
pub use structure::property_value_encoding::{StringError, StringListIterator, U64Iter};
