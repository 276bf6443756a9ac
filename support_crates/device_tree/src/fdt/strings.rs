//! Handling of the *strings* block
//!
//! This is implemented according to [Devicetree Specification section 5.5](https://devicetree-specification.readthedocs.io/en/v0.3/flattened-format.html#strings-block).

use core::ffi::CStr;
use thiserror_no_std::Error;

/// The strings block which holds the names of all properties
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Strings<'buf> {
    buf: &'buf [u8],
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum StringsError {
    #[error("No string could be found at offset {0} in buffer of size {1}")]
    OutOfBounds(usize, usize),
    #[error("There was data at offset {0} but it was not zero-terminated")]
    Unterminated(usize),
}

impl<'buf> Strings<'buf> {
    pub fn from_buffer(buf: &'buf [u8]) -> Self {
        Self { buf }
    }

    /// Look up the zero-terminated string that starts at `offset`.
    ///
    /// The string must end inside the strings block, a terminator in whatever follows the block does not count.
    pub fn get_string(&self, offset: usize) -> Result<&'buf CStr, StringsError> {
        match self.buf.get(offset..) {
            None => Err(StringsError::OutOfBounds(offset, self.buf.len())),
            Some(res) => {
                CStr::from_bytes_until_nul(res).map_err(|_| StringsError::Unterminated(offset))
            }
        }
    }

    /// The raw content of the strings block
    pub fn as_bytes(&self) -> &'buf [u8] {
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::ffi::CString;

    #[test]
    fn get_string_works() {
        let s_original = CString::new("hello world").unwrap();
        let strings = Strings::from_buffer(s_original.as_bytes_with_nul());
        let s2 = strings.get_string(0).unwrap();
        assert_eq!(s_original.as_c_str(), s2);
        assert_eq!("hello world", s2.to_str().unwrap())
    }

    #[test]
    fn get_string_at_offset() {
        let strings = Strings::from_buffer(b"compatible\0reg\0");
        assert_eq!(strings.get_string(11).unwrap().to_bytes(), b"reg");
        // offsets into the middle of a string are legal and used for suffix sharing
        assert_eq!(strings.get_string(7).unwrap().to_bytes(), b"ble");
    }

    #[test]
    fn get_string_fails_outside_of_block() {
        let strings = Strings::from_buffer(b"reg\0name");
        assert_eq!(strings.get_string(9), Err(StringsError::OutOfBounds(9, 8)));
        assert_eq!(strings.get_string(4), Err(StringsError::Unterminated(4)));
    }
}
