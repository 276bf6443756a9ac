//! Bounds-checked reading of big-endian data from a byte buffer
//!
//! All offsets that are found inside a device tree blob are controlled by whoever produced the blob.
//! Every read from the structure and memory reservation blocks therefore goes through a [`Cursor`] which knows the
//! length of the buffer it was created from and refuses to read past it.

use core::ffi::CStr;
use core::mem;
use thiserror_no_std::Error;

/// The error returned when a [`Cursor`] is asked to read beyond its buffer
#[derive(Debug, Error, Eq, PartialEq, Copy, Clone)]
pub enum CursorError {
    /// Reading the requested amount of bytes would exceed the underlying buffer
    #[error("Reading {len} bytes at offset {offset} exceeds the buffer of size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    /// There was no zero byte between the read position and the end of the buffer
    #[error("There is no zero-terminated string at offset {0}")]
    Unterminated(usize),
}

/// A read position inside a buffer.
///
/// The cursor upholds the invariant `position() <= buf.len()` so that [`rest()`](Cursor::rest) can never fail.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Cursor<'buf> {
    buf: &'buf [u8],
    pos: usize,
}

impl<'buf> Cursor<'buf> {
    /// Create a new cursor that starts reading at the beginning of `buf`
    pub fn new(buf: &'buf [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The offset of the next read relative to the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// How many bytes are left to be read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The part of the buffer which has not been read yet
    pub fn rest(&self) -> &'buf [u8] {
        &self.buf[self.pos..]
    }

    /// Read `len` bytes and advance past them
    pub fn read_bytes(&mut self, len: usize) -> Result<&'buf [u8], CursorError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CursorError::OutOfBounds {
                offset: self.pos,
                len,
                size: self.buf.len(),
            })?;

        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a big-endian `u32` and convert it to host order
    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read a big-endian `u64` and convert it to host order
    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        self.read_array().map(u64::from_be_bytes)
    }

    /// Read a big-endian `u32` without advancing the cursor
    pub fn peek_u32(&self) -> Result<u32, CursorError> {
        let mut peek = *self;
        peek.read_u32()
    }

    /// Read a zero-terminated string and advance past its terminator
    pub fn read_cstr(&mut self) -> Result<&'buf CStr, CursorError> {
        let s = CStr::from_bytes_until_nul(self.rest())
            .map_err(|_| CursorError::Unterminated(self.pos))?;
        self.pos += s.to_bytes_with_nul().len();
        Ok(s)
    }

    /// Advance the cursor by `len` bytes without looking at them
    pub fn skip(&mut self, len: usize) -> Result<(), CursorError> {
        self.read_bytes(len).map(|_| ())
    }

    /// Advance the cursor to the next offset that is aligned for FDT tokens (4 bytes)
    pub fn align_to_token(&mut self) -> Result<(), CursorError> {
        let padding = align_to_token(self.pos) - self.pos;
        self.skip(padding)
    }
}

/// Align a number (typically a buffer index) so that it can be used to access aligned FDT tokens
#[inline]
pub(crate) const fn align_to_token(n: usize) -> usize {
    const ALIGNMENT: usize = mem::align_of::<u32>();
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}
