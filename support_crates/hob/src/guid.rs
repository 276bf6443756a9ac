use core::fmt::{Display, Formatter};

/// A globally unique identifier in the layout used by EFI.
///
/// The first three fields are stored little-endian, the last eight bytes are stored as-is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// The name of the GUID extension HOB that carries the address of the relocated device tree
pub const FDT_HOB_GUID: Guid = Guid::new(
    0x16958446,
    0x19b7,
    0x480b,
    [0xb0, 0x47, 0x74, 0x85, 0xad, 0x3f, 0x71, 0x6d],
);

impl Guid {
    pub const ZERO: Guid = Guid::new(0, 0, 0, [0; 8]);

    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        let [a, b, c, d, e, f, g, h, data4 @ ..] = *bytes;
        Self {
            data1: u32::from_le_bytes([a, b, c, d]),
            data2: u16::from_le_bytes([e, f]),
            data3: u16::from_le_bytes([g, h]),
            data4,
        }
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for byte in &self.data4[2..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    extern crate std;
    use std::string::ToString;

    #[test]
    fn fdt_guid_is_displayed_in_registry_format() {
        assert_eq!(
            FDT_HOB_GUID.to_string(),
            "16958446-19b7-480b-b047-7485ad3f716d"
        );
    }

    #[test]
    fn bytes_use_mixed_endian_layout() {
        let bytes = FDT_HOB_GUID.to_bytes();
        assert_eq!(
            bytes,
            [
                0x46, 0x84, 0x95, 0x16, 0xb7, 0x19, 0x0b, 0x48, 0xb0, 0x47, 0x74, 0x85, 0xad, 0x3f,
                0x71, 0x6d
            ]
        );
        assert_eq!(Guid::from_bytes(&bytes), FDT_HOB_GUID);
    }
}
