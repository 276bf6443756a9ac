//! Tokens of the structure block and helpers for reading them
//!
//! The structure block is a flat sequence of 32-bit big-endian tokens. A node is an `FDT_BEGIN_NODE` token and its
//! name, followed by its properties, its child nodes and a closing `FDT_END_NODE`. The block ends with `FDT_END`.
//! See the [Devicetree Specification](https://devicetree-specification.readthedocs.io/en/v0.3/flattened-format.html#structure-block)
//! for the full encoding.

/// Opens a node, followed by the NUL-terminated unit name padded to a 4-byte boundary
pub(crate) const FDT_BEGIN_NODE: u32 = 0x00000001;

/// Closes the most recently opened node
pub(crate) const FDT_END_NODE: u32 = 0x00000002;

/// Starts a property, see [`NodeProperty`](property::NodeProperty) for its layout
pub(crate) const FDT_PROP: u32 = 0x00000003;

/// Filler that readers skip, used to blank out nodes or properties in place
pub(crate) const FDT_NOP: u32 = 0x00000004;

/// Terminates the structure block, nothing may follow it within [`FdtHeader::size_dt_struct`](super::FdtHeader)
pub(crate) const FDT_END: u32 = 0x00000009;

pub(crate) mod node;
pub(crate) mod property;
pub(crate) mod property_value_encoding;

use crate::fdt::cursor::{Cursor, CursorError};

/// Advance the cursor past any `FDT_NOP` tokens
pub(crate) fn skip_nops(cursor: &mut Cursor<'_>) -> Result<(), CursorError> {
    while cursor.peek_u32()? == FDT_NOP {
        cursor.skip(core::mem::size_of::<u32>())?;
    }
    Ok(())
}

/// Return the next token that is not `FDT_NOP` without consuming it
pub(crate) fn peek_token(cursor: &mut Cursor<'_>) -> Result<u32, CursorError> {
    skip_nops(cursor)?;
    cursor.peek_u32()
}
