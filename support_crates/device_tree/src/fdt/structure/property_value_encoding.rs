//! Interpretation of raw property values according to the encodings of
//! [Devicetree Specification section 2.2.4](https://devicetree-specification.readthedocs.io/en/v0.3/devicetree-basics.html#property-values).

use core::ffi::CStr;
use core::mem;
use thiserror_no_std::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum StringError {
    #[error("The raw property value is not null-terminated")]
    NoNullTerminator,
    #[error("The raw property is not valid UTF-8")]
    Utf8Error,
}

/// An iterator over a property value that is `<stringlist>` encoded.
///
/// While `Iterator<Item = &str>` is implemented for this, entries that are not valid UTF-8 are silently skipped.
/// If reading the error is desired use [`next_str()`](StringListIterator::next_str) instead.
#[derive(Debug, Clone)]
pub struct StringListIterator<'buf> {
    pub(crate) buf: &'buf [u8],
}

impl<'buf> StringListIterator<'buf> {
    /// Prepare iteration over `buf`, which must be empty or end with a zero byte
    pub fn new(buf: &'buf [u8]) -> Result<Self, StringError> {
        match buf.last() {
            None | Some(0) => Ok(Self { buf }),
            Some(_) => Err(StringError::NoNullTerminator),
        }
    }

    /// Try to read the next string from the underlying buffer
    ///
    /// If reading fails, return a descriptive error instead.
    /// Note that the internal buffer is still advanced if possible even if an error is returned so that strings located later in the list can still be read.
    pub fn next_str(&mut self) -> Result<&'buf str, StringError> {
        let cstr =
            CStr::from_bytes_until_nul(self.buf).map_err(|_| StringError::NoNullTerminator)?;
        self.buf = &self.buf[cstr.to_bytes_with_nul().len()..];
        let str = cstr.to_str().map_err(|_| StringError::Utf8Error)?;
        Ok(str)
    }
}

impl<'buf> Iterator for StringListIterator<'buf> {
    type Item = &'buf str;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.buf.is_empty() {
            match self.next_str() {
                Ok(s) => return Some(s),
                Err(StringError::Utf8Error) => continue,
                Err(StringError::NoNullTerminator) => return None,
            }
        }
        None
    }
}

/// An iterator over a property value that consists of big-endian 64-bit words, e.g. a `reg` property of a node
/// whose parent uses two address and two size cells.
#[derive(Debug, Clone)]
pub struct U64Iter<'buf> {
    words: core::slice::ChunksExact<'buf, u8>,
}

impl<'buf> U64Iter<'buf> {
    /// Prepare iteration over `buf`, whose length must be a multiple of 8 bytes
    pub fn new(buf: &'buf [u8]) -> Option<Self> {
        if buf.len() % mem::size_of::<u64>() != 0 {
            return None;
        }
        Some(Self {
            words: buf.chunks_exact(mem::size_of::<u64>()),
        })
    }
}

impl<'buf> Iterator for U64Iter<'buf> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let word = self.words.next()?;
        word.try_into().ok().map(u64::from_be_bytes)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.words.size_hint()
    }
}

impl ExactSizeIterator for U64Iter<'_> {}

#[cfg(test)]
mod test {
    use super::*;
    extern crate alloc;
    use alloc::vec::Vec;

    #[test]
    fn string_list_yields_all_entries() {
        let list = StringListIterator::new(b"sophgo,cdns-pcie-host\0snps,dw-pcie\0").unwrap();
        assert_eq!(
            list.collect::<Vec<_>>(),
            ["sophgo,cdns-pcie-host", "snps,dw-pcie"]
        );
    }

    #[test]
    fn string_list_requires_terminator() {
        assert!(StringListIterator::new(b"bitmain,bm-sd").is_err());
        assert_eq!(StringListIterator::new(b"").unwrap().count(), 0);
    }

    #[test]
    fn string_list_skips_invalid_utf8() {
        let list = StringListIterator::new(b"\xff\xfe\0bitmain,bm-sd\0").unwrap();
        assert_eq!(list.collect::<Vec<_>>(), ["bitmain,bm-sd"]);
    }

    #[test]
    fn u64_words_are_big_endian() {
        let mut buf = [0u8; 16];
        buf[0..8].copy_from_slice(&0x40_0000_0000u64.to_be_bytes());
        buf[8..16].copy_from_slice(&0x1000_0000u64.to_be_bytes());
        let words = U64Iter::new(&buf).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words.collect::<Vec<_>>(), [0x40_0000_0000, 0x1000_0000]);
    }

    #[test]
    fn u64_words_reject_partial_words() {
        assert!(U64Iter::new(&[0u8; 12]).is_none());
        assert_eq!(U64Iter::new(&[]).unwrap().count(), 0);
    }
}
