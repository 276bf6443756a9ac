//! Copying a device tree into a new, larger buffer
//!
//! This mirrors `fdt_open_into()` of libfdt: the blocks of the source tree are written back to back in their canonical
//! order (header, memory reservation block, structure block, strings block) and the header declares the complete
//! destination buffer as the size of the tree.
//! Whatever space is left after the strings block is zeroed and can be used to grow the tree in-place later on.

use crate::fdt::header::{FDT_LAST_COMP_VERSION, FDT_VERSION, HEADER_MAGIC, HEADER_SIZE};
use crate::fdt::{FdtHeader, FlattenedDeviceTree};
use thiserror_no_std::Error;

/// The error returned when a device tree cannot be copied into a destination buffer
#[derive(Debug, Error, Eq, PartialEq)]
pub enum OpenIntoError {
    /// The destination is too small to hold all blocks of the tree
    #[error("The destination buffer of {available} bytes cannot hold the {required} bytes of the packed device tree")]
    NoSpace { required: usize, available: usize },
    /// The destination is larger than what the 32-bit size fields of a header can describe
    #[error("The destination buffer of {0} bytes is too large to be described by a device tree header")]
    TooLarge(usize),
}

impl<'buf> FlattenedDeviceTree<'buf> {
    /// How many bytes the tree occupies when all blocks are packed without any free space in between
    pub fn packed_size(&self) -> usize {
        HEADER_SIZE
            + self.memory_reservations.as_bytes().len()
            + self.struct_block.len()
            + self.strings.as_bytes().len()
    }

    /// Copy this tree into `dst` so that it uses all of `dst`.
    ///
    /// On success the returned header is the one that has been written to the start of `dst`.
    pub fn open_into(&self, dst: &mut [u8]) -> Result<FdtHeader, OpenIntoError> {
        let required = self.packed_size();
        if dst.len() < required {
            return Err(OpenIntoError::NoSpace {
                required,
                available: dst.len(),
            });
        }
        let total_size =
            u32::try_from(dst.len()).map_err(|_| OpenIntoError::TooLarge(dst.len()))?;

        let mem_rsvmap = self.memory_reservations.as_bytes();
        let strings = self.strings.as_bytes();
        let off_mem_rsvmap = HEADER_SIZE;
        let off_dt_struct = off_mem_rsvmap + mem_rsvmap.len();
        let off_dt_strings = off_dt_struct + self.struct_block.len();

        // all offsets are smaller than `required` which fits into `total_size`
        let header = FdtHeader {
            magic: HEADER_MAGIC,
            total_size,
            off_dt_struct: off_dt_struct as u32,
            off_dt_strings: off_dt_strings as u32,
            off_mem_rsvmap: off_mem_rsvmap as u32,
            version: FDT_VERSION,
            last_comp_version: FDT_LAST_COMP_VERSION,
            boot_cpuid_phys: self.header.boot_cpuid_phys,
            size_dt_strings: strings.len() as u32,
            size_dt_struct: self.struct_block.len() as u32,
        };

        let (header_buf, rest) = dst
            .split_first_chunk_mut::<HEADER_SIZE>()
            .ok_or(OpenIntoError::NoSpace {
                required,
                available: 0,
            })?;
        let (mem_rsvmap_buf, rest) = rest.split_at_mut(mem_rsvmap.len());
        let (struct_buf, rest) = rest.split_at_mut(self.struct_block.len());
        let (strings_buf, free_space) = rest.split_at_mut(strings.len());

        header.write_to(header_buf);
        mem_rsvmap_buf.copy_from_slice(mem_rsvmap);
        struct_buf.copy_from_slice(self.struct_block);
        strings_buf.copy_from_slice(strings);
        free_space.fill(0);

        Ok(header)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fdt::builder::FdtBuilder;
    use align_data::{include_aligned, Align64};
    extern crate std;
    use std::vec::Vec;

    static DTB: &[u8] = include_aligned!(Align64, "../../test/data/sg2042_minimal.dtb");

    #[repr(C, align(8))]
    struct AlignedBuffer<const LENGTH: usize>([u8; LENGTH]);

    #[test]
    fn open_into_grows_tree_to_destination_size() {
        let src = FlattenedDeviceTree::from_buffer(DTB).unwrap();
        let mut dst = std::boxed::Box::new(AlignedBuffer([0xaau8; 4096]));

        let header = src.open_into(&mut dst.0).unwrap();
        assert_eq!(header.total_size, 4096);
        assert_eq!(header.version, 17);
        assert_eq!(header.last_comp_version, 16);

        let copy = FlattenedDeviceTree::from_buffer(&dst.0).unwrap();
        assert_eq!(copy.header, header);
        assert_eq!(copy.buf.len(), 4096);
        assert_eq!(
            copy.nodes().map(|node| node.name).collect::<Vec<_>>(),
            src.nodes().map(|node| node.name).collect::<Vec<_>>()
        );
        assert_eq!(
            copy.memory_reservations.entries().collect::<Vec<_>>(),
            src.memory_reservations.entries().collect::<Vec<_>>()
        );
        // everything after the packed blocks is free space
        assert!(dst.0[src.packed_size()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn open_into_removes_gaps_between_blocks() {
        let blob = FdtBuilder::new()
            .block_gap(64)
            .begin_node("")
            .property_str("model", "gap test")
            .end_node()
            .build();
        let src = FlattenedDeviceTree::from_buffer(blob.as_bytes()).unwrap();
        assert!(src.packed_size() < src.header.total_size as usize);

        let mut dst = AlignedBuffer([0u8; 512]);
        let header = src.open_into(&mut dst.0).unwrap();
        assert_eq!(header.off_mem_rsvmap, 40);
        assert_eq!(header.off_dt_struct, 56);
        assert_eq!(
            header.off_dt_strings,
            header.off_dt_struct + header.size_dt_struct
        );

        let copy = FlattenedDeviceTree::from_buffer(&dst.0).unwrap();
        assert_eq!(
            copy.structure.prop("model").unwrap().value,
            b"gap test\0".as_slice()
        );
    }

    #[test]
    fn open_into_rejects_small_destination() {
        let src = FlattenedDeviceTree::from_buffer(DTB).unwrap();
        let mut dst = AlignedBuffer([0u8; 64]);
        assert_eq!(
            src.open_into(&mut dst.0),
            Err(OpenIntoError::NoSpace {
                required: src.packed_size(),
                available: 64
            })
        );
        // nothing has been written
        assert!(dst.0.iter().all(|&b| b == 0));
    }
}
