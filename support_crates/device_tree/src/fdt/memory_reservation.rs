use crate::fdt::cursor::{Cursor, CursorError};
use core::mem;
use thiserror_no_std::Error;

const ENTRY_SIZE: usize = mem::size_of::<u64>() * 2;

/// A physical memory region that must be left alone by the OS, as two big-endian 64-bit words.
///
/// An all-zero entry ends the list and is never yielded by [`MemoryReservationIter`].
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct MemoryReservationEntry {
    pub address: u64,
    /// Length in bytes
    pub size: u64,
}

impl MemoryReservationEntry {
    pub fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }
}

/// Why a memory reservation block was rejected
#[derive(Debug, Error, Eq, PartialEq)]
pub enum MemoryReservationFormatError {
    #[error("The memory reservation block is not aligned to an 8-byte boundary")]
    InvalidAlignment,
    #[error("The memory reservation block is smaller than 16 bytes")]
    BufferTooSmall,
    /// The block runs into the end of the blob before an all-zero entry
    #[error("The memory reservation block is not terminated by an all-zero entry")]
    NoTerminator,
}

/// The memory reservation block, from its start up to and including the terminating entry
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryReservationBlock<'buf> {
    /// All entries including the terminator
    raw: &'buf [u8],
}

impl<'buf> MemoryReservationBlock<'buf> {
    /// Parse a new memory reservation block from an underlying buffer.
    ///
    /// The buffer may extend past the end of the block, the block ends with the first terminator entry.
    pub(crate) fn from_buffer(buf: &'buf [u8]) -> Result<Self, MemoryReservationFormatError> {
        if buf.as_ptr() as usize % 8 != 0 {
            return Err(MemoryReservationFormatError::InvalidAlignment);
        }
        if buf.len() < ENTRY_SIZE {
            return Err(MemoryReservationFormatError::BufferTooSmall);
        }

        let mut cursor = Cursor::new(buf);
        loop {
            let entry = read_entry(&mut cursor)
                .map_err(|_| MemoryReservationFormatError::NoTerminator)?;
            if entry.address == 0 && entry.size == 0 {
                break;
            }
        }

        Ok(Self {
            raw: &buf[..cursor.position()],
        })
    }

    /// Iterate over all reservations, excluding the terminator
    pub fn entries(&self) -> MemoryReservationIter<'buf> {
        MemoryReservationIter {
            cursor: Cursor::new(self.raw),
        }
    }

    /// The encoded block including its terminating entry
    pub fn as_bytes(&self) -> &'buf [u8] {
        self.raw
    }
}

fn read_entry(cursor: &mut Cursor<'_>) -> Result<MemoryReservationEntry, CursorError> {
    let address = cursor.read_u64()?;
    let size = cursor.read_u64()?;
    Ok(MemoryReservationEntry { address, size })
}

/// An iterator over the entries of a [`MemoryReservationBlock`]
#[derive(Debug, Clone)]
pub struct MemoryReservationIter<'buf> {
    cursor: Cursor<'buf>,
}

impl<'buf> Iterator for MemoryReservationIter<'buf> {
    type Item = MemoryReservationEntry;

    fn next(&mut self) -> Option<Self::Item> {
        match read_entry(&mut self.cursor).ok()? {
            // the terminator is always the last entry of the block
            MemoryReservationEntry {
                address: 0,
                size: 0,
            } => None,
            entry => Some(entry),
        }
    }
}
