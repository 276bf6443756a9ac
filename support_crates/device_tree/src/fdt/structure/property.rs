//! Handling of properties inside nodes

use crate::fdt::cursor::Cursor;
use crate::fdt::structure::property_value_encoding::{StringError, StringListIterator, U64Iter};
use crate::fdt::structure::{skip_nops, FDT_PROP};
use crate::fdt::{Strings, StringsError};
use core::ffi::CStr;
use thiserror_no_std::Error;

/// Size of the `FDT_PROP` token plus the property header (value length and name offset)
const PROP_HEADER_SIZE: usize = 12;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PropertyParseError {
    #[error("The property referenced a string for its name that could not be fetched")]
    NameError(#[from] StringsError),
    #[error("The given buffer of size {0} is not large enough to contain a property and its value (12 bytes header + {1:?} bytes value according to the header)")]
    BufferTooSmall(usize, Option<usize>),
    #[error("The given buffer does not start with an FDT_PROP token")]
    NotAProp,
}

/// A single property inside a node
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct NodeProperty<'buf> {
    /// Name of the property as looked up from the *strings* block of the FDT
    pub name: &'buf CStr,
    /// Value of the property
    pub value: &'buf [u8],
}

impl<'buf> NodeProperty<'buf> {
    /// Parse a property from the given buffer and returns that property in addition to how many bytes of the buffer
    /// are used by it.
    ///
    /// The buffer must start immediately with the `FDT_PROP` token but may be larger than the one property.
    pub(super) fn from_buffer(
        buf: &'buf [u8],
        strings: &Strings<'buf>,
    ) -> Result<(usize, Self), PropertyParseError> {
        let mut cursor = Cursor::new(buf);
        if cursor.read_u32().ok() != Some(FDT_PROP) {
            return Err(PropertyParseError::NotAProp);
        }

        // parse header and resolve name
        let (value_len, name_offset) = match (cursor.read_u32(), cursor.read_u32()) {
            (Ok(value_len), Ok(name_offset)) => (value_len as usize, name_offset as usize),
            _ => return Err(PropertyParseError::BufferTooSmall(buf.len(), None)),
        };
        let name = strings.get_string(name_offset)?;

        // fetch property value from buffer and return result
        let value = cursor
            .read_bytes(value_len)
            .map_err(|_| PropertyParseError::BufferTooSmall(buf.len(), Some(value_len)))?;
        Ok((PROP_HEADER_SIZE + value_len, Self { name, value }))
    }

    /// Whether this property is called `name`
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_bytes() == name.as_bytes()
    }

    /// Interpret the value as a `<stringlist>`
    pub fn as_string_list(&self) -> Result<StringListIterator<'buf>, StringError> {
        StringListIterator::new(self.value)
    }

    /// Interpret the value as a sequence of big-endian 64-bit words
    pub fn as_u64_words(&self) -> Option<U64Iter<'buf>> {
        U64Iter::new(self.value)
    }
}

/// An iterator over node properties that are encoded in a buffer
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PropertyIter<'buf> {
    pub(super) buf: Option<&'buf [u8]>,
    pub(super) strings: Strings<'buf>,
}

impl<'buf> PropertyIter<'buf> {
    pub(super) fn new(buf: &'buf [u8], strings: Strings<'buf>) -> Self {
        Self {
            strings,
            buf: if buf.is_empty() { None } else { Some(buf) },
        }
    }
}

impl<'buf> Iterator for PropertyIter<'buf> {
    type Item = NodeProperty<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut cursor = Cursor::new(self.buf.take()?);
        skip_nops(&mut cursor).ok()?;
        let (prop_len, prop) = NodeProperty::from_buffer(cursor.rest(), &self.strings).ok()?;

        // a failure to skip means that this was the last property of the buffer
        if cursor.skip(prop_len).is_ok() && cursor.align_to_token().is_ok() && !cursor.is_empty()
        {
            self.buf = Some(cursor.rest());
        }
        Some(prop)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fdt::structure::FDT_NOP;

    /// Write a property header and its value at `at`, returning the offset after the (unpadded) value
    fn put_prop(buf: &mut [u8], at: usize, value_len: u32, name_offset: u32, value: &[u8]) -> usize {
        let header = [FDT_PROP, value_len, name_offset];
        for (i, word) in header.iter().enumerate() {
            buf[at + 4 * i..at + 4 * (i + 1)].copy_from_slice(&word.to_be_bytes());
        }
        let value_at = at + PROP_HEADER_SIZE;
        buf[value_at..value_at + value.len()].copy_from_slice(value);
        value_at + value.len()
    }

    const ALL_ONES: [u8; 8] = [0xff; 8];

    #[test]
    fn empty_value_only_uses_header() {
        let strings = Strings::from_buffer(b"dma-coherent\0");
        let mut buf = [0u8; 16];
        put_prop(&mut buf, 0, 0, 0, &[]);

        let (prop_size, prop) = NodeProperty::from_buffer(&buf, &strings).unwrap();
        assert_eq!(prop_size, PROP_HEADER_SIZE);
        assert!(prop.has_name("dma-coherent"));
        assert!(prop.value.is_empty());
    }

    #[test]
    fn value_is_sliced_by_declared_length() {
        let strings = Strings::from_buffer(b"model\0reg\0");
        let mut buf = [0u8; 32];
        put_prop(&mut buf, 0, 8, 6, &ALL_ONES);

        let (prop_size, prop) = NodeProperty::from_buffer(&buf, &strings).unwrap();
        assert_eq!(prop_size, 20);
        assert!(prop.has_name("reg"));
        assert!(!prop.has_name("model"));
        assert_eq!(prop.value, &ALL_ONES);
        assert_eq!(prop.as_u64_words().unwrap().next(), Some(u64::MAX));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let strings = Strings::from_buffer(b"reg\0");
        let mut buf = [0u8; 20];
        put_prop(&mut buf, 0, 0xffff_fff0, 0, &[]);

        assert_eq!(
            NodeProperty::from_buffer(&buf, &strings),
            Err(PropertyParseError::BufferTooSmall(20, Some(0xffff_fff0)))
        );
    }

    #[test]
    fn name_outside_strings_block_is_rejected() {
        let strings = Strings::from_buffer(b"reg\0");
        let mut buf = [0u8; 12];
        put_prop(&mut buf, 0, 0, 64, &[]);

        assert_eq!(
            NodeProperty::from_buffer(&buf, &strings),
            Err(PropertyParseError::NameError(StringsError::OutOfBounds(64, 4)))
        );
    }

    #[test]
    fn incomplete_header_or_wrong_token_is_rejected() {
        let strings = Strings::from_buffer(b"reg\0");
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&FDT_PROP.to_be_bytes());
        assert_eq!(
            NodeProperty::from_buffer(&buf, &strings),
            Err(PropertyParseError::BufferTooSmall(8, None))
        );
        assert_eq!(
            NodeProperty::from_buffer(&[0u8; 16], &strings),
            Err(PropertyParseError::NotAProp)
        );
    }

    #[test]
    fn iterator_yields_single_property() {
        let strings = Strings::from_buffer(b"reg\0");
        let mut buf = [0u8; 20];
        put_prop(&mut buf, 0, 8, 0, &ALL_ONES);

        let props = PropertyIter::new(&buf, strings);
        assert_eq!(props.clone().count(), 1);
        let prop = props.clone().next().unwrap();
        assert!(prop.has_name("reg"));
        assert_eq!(prop.value, &ALL_ONES);
    }

    #[test]
    fn iterator_skips_nops_and_padding() {
        let strings = Strings::from_buffer(b"status\0reg\0");
        let mut buf = [0u8; 44];
        // "okay\0" is padded to 8 bytes
        let end = put_prop(&mut buf, 0, 5, 0, b"okay\0");
        assert_eq!(end, 17);
        buf[20..24].copy_from_slice(&FDT_NOP.to_be_bytes());
        put_prop(&mut buf, 24, 8, 7, &0x6000_0000_0000u64.to_be_bytes());

        let names = PropertyIter::new(&buf, strings).map(|prop| prop.name.to_str().unwrap());
        assert!(names.eq(["status", "reg"]));
        let reg = PropertyIter::new(&buf, strings).nth(1).unwrap();
        assert_eq!(reg.as_u64_words().unwrap().next(), Some(0x6000_0000_0000));
    }
}
