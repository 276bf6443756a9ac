use crate::guid::Guid;
use crate::resource::{ResourceAttribute, ResourceDescriptor, ResourceType};
use thiserror_no_std::Error;

/// Every record starts at an 8-byte boundary and its length is a multiple of 8
const HOB_ALIGNMENT: usize = 8;
const HEADER_LEN: usize = 8;
const RESOURCE_DESCRIPTOR_BODY_LEN: usize = 40;
const GUID_EXTENSION_HEADER_BODY_LEN: usize = 16;
const FIRMWARE_VOLUME_BODY_LEN: usize = 16;

/// The type field of the generic header that precedes every record
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum HobType {
    ResourceDescriptor = 0x0003,
    GuidExtension = 0x0004,
    FirmwareVolume = 0x0005,
    EndOfHobList = 0xffff,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum HobError {
    /// The record and the end-of-list record that must follow it do not fit into the remaining space
    #[error("The HOB list has {available} bytes left but {required} bytes are required")]
    OutOfSpace { required: usize, available: usize },
    /// The record would be longer than the 16-bit length field of a HOB header can describe
    #[error("{0} bytes of data are too large to be stored in a single HOB")]
    DataTooLarge(usize),
    /// A GUID extension HOB with that name has already been added and only one may exist
    #[error("A GUID extension HOB named {0} already exists in the HOB list")]
    SlotAlreadyUsed(Guid),
}

/// A single decoded record of a [`HobList`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Hob<'a> {
    ResourceDescriptor(ResourceDescriptor),
    /// Arbitrary data identified by a name.
    /// The data is zero-padded to a multiple of 8 bytes.
    GuidExtension { name: Guid, data: &'a [u8] },
    FirmwareVolume { base: u64, length: u64 },
    /// A record with a type that is not known to this crate
    Unknown { hob_type: u16, body: &'a [u8] },
}

/// An append-only list of HOBs inside a fixed buffer.
///
/// Records are never modified or removed once they have been added.
/// The list always ends with an end-of-list record, even after a failed append.
#[derive(Debug)]
pub struct HobList<'mem> {
    buf: &'mem mut [u8],
    /// Offset of the end-of-list record
    end: usize,
}

impl<'mem> HobList<'mem> {
    /// Start a new, empty list in `buf`.
    ///
    /// Bytes before the first 8-byte boundary of `buf` are not used.
    pub fn new(buf: &'mem mut [u8]) -> Result<Self, HobError> {
        let offset = buf.as_ptr().align_offset(HOB_ALIGNMENT);
        let buf = buf.get_mut(offset..).unwrap_or_default();
        if buf.len() < HEADER_LEN {
            return Err(HobError::OutOfSpace {
                required: HEADER_LEN,
                available: buf.len(),
            });
        }

        let mut list = Self { buf, end: 0 };
        list.write_end_of_list();
        Ok(list)
    }

    /// Append a resource descriptor HOB
    pub fn add_resource_descriptor(&mut self, resource: &ResourceDescriptor) -> Result<(), HobError> {
        self.append(HobType::ResourceDescriptor, RESOURCE_DESCRIPTOR_BODY_LEN, |body| {
            body[0..16].copy_from_slice(&resource.owner.to_bytes());
            body[16..20].copy_from_slice(&(resource.resource_type as u32).to_le_bytes());
            body[20..24].copy_from_slice(&resource.attributes.bits().to_le_bytes());
            body[24..32].copy_from_slice(&resource.start.to_le_bytes());
            body[32..40].copy_from_slice(&resource.length.to_le_bytes());
        })
    }

    /// Append a HOB announcing a firmware volume
    pub fn add_firmware_volume(&mut self, base: u64, length: u64) -> Result<(), HobError> {
        self.append(HobType::FirmwareVolume, FIRMWARE_VOLUME_BODY_LEN, |body| {
            body[0..8].copy_from_slice(&base.to_le_bytes());
            body[8..16].copy_from_slice(&length.to_le_bytes());
        })
    }

    /// Append a GUID extension HOB named `name` which carries `data`
    pub fn add_guid_hob(&mut self, name: &Guid, data: &[u8]) -> Result<(), HobError> {
        self.append(
            HobType::GuidExtension,
            GUID_EXTENSION_HEADER_BODY_LEN + data.len(),
            |body| {
                let (name_buf, data_buf) = body.split_at_mut(GUID_EXTENSION_HEADER_BODY_LEN);
                name_buf.copy_from_slice(&name.to_bytes());
                data_buf.copy_from_slice(data);
            },
        )
    }

    /// Append a GUID extension HOB like [`add_guid_hob`](HobList::add_guid_hob) but fail if one with the same name
    /// already exists
    pub fn add_unique_guid_hob(&mut self, name: &Guid, data: &[u8]) -> Result<(), HobError> {
        if self.find_guid_hob(name).is_some() {
            return Err(HobError::SlotAlreadyUsed(*name));
        }
        self.add_guid_hob(name, data)
    }

    /// Get the data of the first GUID extension HOB named `name`
    pub fn find_guid_hob(&self, name: &Guid) -> Option<&[u8]> {
        self.iter().find_map(|hob| match hob {
            Hob::GuidExtension { name: hob_name, data } if hob_name == *name => Some(data),
            _ => None,
        })
    }

    /// Iterate over all records in the order in which they were added
    pub fn iter(&self) -> HobIter<'_> {
        HobIter {
            buf: self.as_bytes(),
        }
    }

    /// The encoded list including its end-of-list record
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.end + HEADER_LEN]
    }

    /// Write a record of the given type and let `fill` write its body.
    ///
    /// `fill` receives exactly `body_len` bytes.
    /// Padding up to the next 8-byte boundary is zeroed.
    fn append(
        &mut self,
        hob_type: HobType,
        body_len: usize,
        fill: impl FnOnce(&mut [u8]),
    ) -> Result<(), HobError> {
        let length = (HEADER_LEN + body_len).next_multiple_of(HOB_ALIGNMENT);
        let encoded_length = u16::try_from(length).map_err(|_| HobError::DataTooLarge(body_len))?;

        let required = length + HEADER_LEN;
        let available = self.buf.len() - self.end;
        if required > available {
            return Err(HobError::OutOfSpace {
                required,
                available,
            });
        }

        let offset = self.end;
        let record = &mut self.buf[offset..offset + length];
        record.fill(0);
        write_header(record, hob_type, encoded_length);
        fill(&mut record[HEADER_LEN..HEADER_LEN + body_len]);

        self.end += length;
        self.write_end_of_list();
        log::trace!(
            "added {:?} HOB of {} bytes at offset {:#x}",
            hob_type,
            length,
            offset
        );
        Ok(())
    }

    fn write_end_of_list(&mut self) {
        write_header(
            &mut self.buf[self.end..self.end + HEADER_LEN],
            HobType::EndOfHobList,
            HEADER_LEN as u16,
        );
    }
}

fn write_header(record: &mut [u8], hob_type: HobType, length: u16) {
    record[0..2].copy_from_slice(&(hob_type as u16).to_le_bytes());
    record[2..4].copy_from_slice(&length.to_le_bytes());
    record[4..8].fill(0);
}

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(buf.get(offset..offset + 4)?.try_into().ok()?))
}

fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_le_bytes(buf.get(offset..offset + 8)?.try_into().ok()?))
}

fn read_guid(buf: &[u8], offset: usize) -> Option<Guid> {
    Some(Guid::from_bytes(buf.get(offset..offset + 16)?.try_into().ok()?))
}

impl TryFrom<u16> for HobType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0003 => Ok(Self::ResourceDescriptor),
            0x0004 => Ok(Self::GuidExtension),
            0x0005 => Ok(Self::FirmwareVolume),
            0xffff => Ok(Self::EndOfHobList),
            other => Err(other),
        }
    }
}

impl<'a> Hob<'a> {
    /// Decode the body of a record, falling back to [`Hob::Unknown`] if it is shorter than its type requires
    fn decode(hob_type: u16, body: &'a [u8]) -> Self {
        let known = match HobType::try_from(hob_type) {
            Ok(HobType::ResourceDescriptor) => Self::decode_resource_descriptor(body),
            Ok(HobType::GuidExtension) => Self::decode_guid_extension(body),
            Ok(HobType::FirmwareVolume) => Self::decode_firmware_volume(body),
            Ok(HobType::EndOfHobList) | Err(_) => None,
        };
        known.unwrap_or(Hob::Unknown { hob_type, body })
    }

    fn decode_resource_descriptor(body: &'a [u8]) -> Option<Self> {
        Some(Hob::ResourceDescriptor(ResourceDescriptor {
            owner: read_guid(body, 0)?,
            resource_type: ResourceType::try_from(read_u32(body, 16)?).ok()?,
            attributes: ResourceAttribute::from_bits_retain(read_u32(body, 20)?),
            start: read_u64(body, 24)?,
            length: read_u64(body, 32)?,
        }))
    }

    fn decode_guid_extension(body: &'a [u8]) -> Option<Self> {
        Some(Hob::GuidExtension {
            name: read_guid(body, 0)?,
            data: body.get(GUID_EXTENSION_HEADER_BODY_LEN..)?,
        })
    }

    fn decode_firmware_volume(body: &'a [u8]) -> Option<Self> {
        Some(Hob::FirmwareVolume {
            base: read_u64(body, 0)?,
            length: read_u64(body, 8)?,
        })
    }
}

/// An iterator over the records of a [`HobList`].
///
/// Iteration stops at the end-of-list record or at the first record whose header is inconsistent.
#[derive(Debug, Clone)]
pub struct HobIter<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for HobIter<'a> {
    type Item = Hob<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = self.buf.split_first_chunk::<HEADER_LEN>()?;
        let hob_type = u16::from_le_bytes([header[0], header[1]]);
        let length = u16::from_le_bytes([header[2], header[3]]) as usize;

        if hob_type == HobType::EndOfHobList as u16
            || length < HEADER_LEN
            || length > self.buf.len()
        {
            self.buf = &[];
            return None;
        }

        let (record, rest) = self.buf.split_at(length);
        self.buf = rest;
        Some(Hob::decode(hob_type, &record[HEADER_LEN..]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::guid::FDT_HOB_GUID;
    extern crate std;
    use std::vec::Vec;

    #[repr(C, align(8))]
    pub struct AlignedBuffer<const LENGTH: usize>(pub [u8; LENGTH]);

    #[test]
    fn new_list_only_contains_end_of_list() {
        let mut buf = AlignedBuffer([0xaau8; 64]);
        let list = HobList::new(&mut buf.0).unwrap();
        assert_eq!(list.as_bytes(), &[0xff, 0xff, 0x08, 0x00, 0, 0, 0, 0]);
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn new_list_needs_space_for_end_of_list() {
        let mut buf = AlignedBuffer([0u8; 4]);
        assert_eq!(
            HobList::new(&mut buf.0).unwrap_err(),
            HobError::OutOfSpace {
                required: 8,
                available: 4
            }
        );
    }

    #[test]
    fn resource_descriptor_encoding() {
        let mut buf = AlignedBuffer([0u8; 128]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        list.add_resource_descriptor(&ResourceDescriptor::mmio(0x60_0000_0000, 0x1000))
            .unwrap();

        let bytes = list.as_bytes();
        assert_eq!(bytes.len(), 48 + 8);
        assert_eq!(&bytes[0..8], &[0x03, 0x00, 0x30, 0x00, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..24], &[0u8; 16]);
        assert_eq!(&bytes[24..28], &1u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0x407u32.to_le_bytes());
        assert_eq!(&bytes[32..40], &0x60_0000_0000u64.to_le_bytes());
        assert_eq!(&bytes[40..48], &0x1000u64.to_le_bytes());
        assert_eq!(&bytes[48..56], &[0xff, 0xff, 0x08, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn guid_data_is_padded() {
        let mut buf = AlignedBuffer([0xaau8; 128]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        list.add_guid_hob(&FDT_HOB_GUID, &[1, 2, 3]).unwrap();

        assert_eq!(&list.as_bytes()[2..4], &32u16.to_le_bytes());
        assert_eq!(
            list.find_guid_hob(&FDT_HOB_GUID),
            Some([1u8, 2, 3, 0, 0, 0, 0, 0].as_slice())
        );
    }

    #[test]
    fn records_are_read_back_in_order() {
        let mut buf = AlignedBuffer([0u8; 256]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        list.add_guid_hob(&FDT_HOB_GUID, &0x8020_0000u64.to_le_bytes())
            .unwrap();
        list.add_firmware_volume(0x8020_0000, 0xe0_0000).unwrap();
        list.add_resource_descriptor(&ResourceDescriptor::mmio(0xC000_0000, 0x4000_0000))
            .unwrap();

        let hobs = list.iter().collect::<Vec<_>>();
        assert_eq!(
            hobs,
            [
                Hob::GuidExtension {
                    name: FDT_HOB_GUID,
                    data: &0x8020_0000u64.to_le_bytes()
                },
                Hob::FirmwareVolume {
                    base: 0x8020_0000,
                    length: 0xe0_0000
                },
                Hob::ResourceDescriptor(ResourceDescriptor::mmio(0xC000_0000, 0x4000_0000)),
            ]
        );
    }

    #[test]
    fn unique_guid_hob_can_only_be_added_once() {
        let mut buf = AlignedBuffer([0u8; 128]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        list.add_unique_guid_hob(&FDT_HOB_GUID, &1u64.to_le_bytes())
            .unwrap();
        assert_eq!(
            list.add_unique_guid_hob(&FDT_HOB_GUID, &2u64.to_le_bytes()),
            Err(HobError::SlotAlreadyUsed(FDT_HOB_GUID))
        );
        assert_eq!(
            list.find_guid_hob(&FDT_HOB_GUID),
            Some(1u64.to_le_bytes().as_slice())
        );
        assert_eq!(list.iter().count(), 1);
    }

    #[test]
    fn failed_append_leaves_list_unchanged() {
        let mut buf = AlignedBuffer([0u8; 64]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        list.add_firmware_volume(0x1000, 0x2000).unwrap();
        let before = Vec::from(list.as_bytes());

        // 48 bytes of descriptor plus 8 bytes of end-of-list do not fit into the remaining 40 bytes
        assert_eq!(
            list.add_resource_descriptor(&ResourceDescriptor::mmio(0, 0)),
            Err(HobError::OutOfSpace {
                required: 56,
                available: 40
            })
        );
        assert_eq!(list.as_bytes(), before.as_slice());
        assert_eq!(list.iter().count(), 1);
    }

    #[test]
    fn oversized_guid_data_is_rejected() {
        let mut buf = AlignedBuffer([0u8; 64]);
        let mut list = HobList::new(&mut buf.0).unwrap();
        let data = std::vec![0u8; 0x1_0000];
        assert_eq!(
            list.add_guid_hob(&FDT_HOB_GUID, &data),
            Err(HobError::DataTooLarge(0x1_0000 + 16))
        );
    }

    #[test]
    fn unknown_records_are_passed_through() {
        let mut buf = AlignedBuffer([0u8; 32]);
        buf.0[0..8].copy_from_slice(&[0x07, 0x00, 0x10, 0x00, 0, 0, 0, 0]);
        buf.0[8..16].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        buf.0[16..24].copy_from_slice(&[0xff, 0xff, 0x08, 0x00, 0, 0, 0, 0]);

        let hobs = HobIter { buf: &buf.0 }.collect::<Vec<_>>();
        assert_eq!(
            hobs,
            [Hob::Unknown {
                hob_type: 7,
                body: &[1, 2, 3, 4, 5, 6, 7, 8]
            }]
        );
    }

    #[test]
    fn inconsistent_length_stops_iteration() {
        let mut buf = AlignedBuffer([0u8; 16]);
        buf.0[0..8].copy_from_slice(&[0x05, 0x00, 0x40, 0x00, 0, 0, 0, 0]);
        assert_eq!(HobIter { buf: &buf.0 }.count(), 0);
    }
}
