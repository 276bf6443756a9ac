//! Handling of the DTB/FDT as a whole

use crate::fdt::header::HEADER_SIZE;
use crate::fdt::structure::node::{NodeStructureError, NodeWalk, StructureNode};
use crate::fdt::{
    FdtHeader, HeaderReadError, MemoryReservationBlock, MemoryReservationFormatError, Strings,
};
use thiserror_no_std::Error;

/// The error that can occur when parsing a FDT
#[derive(Debug, Error, Eq, PartialEq)]
pub enum FdtError {
    /// The FDT header could not be parsed for a specific reason
    #[error("Could not parse the fdt header: {0}")]
    HeaderParseError(#[from] HeaderReadError),
    /// The memory reservation block could not be parsed for a specific reason
    #[error("Could not parse memory reservation block: {0}")]
    MemoryReservationError(#[from] MemoryReservationFormatError),
    /// The structure block could not be parsed for a specific reason
    #[error("Could not parse structure block: {0}")]
    StructureError(#[from] NodeStructureError),
}

/// A handle to a flattened device tree that has been parsed from an underlying buffer
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct FlattenedDeviceTree<'buf> {
    /// Metadata information about the device tree
    pub header: FdtHeader,
    /// Areas of the system memory which are reserved and should not be used without special care
    pub memory_reservations: MemoryReservationBlock<'buf>,
    /// Structure information about the device and its hardware
    pub structure: StructureNode<'buf>,
    /// Names of all properties
    pub strings: Strings<'buf>,
    /// The complete structure block as described by the header
    pub(crate) struct_block: &'buf [u8],
    /// The exact buffer that holds this device trees data
    pub buf: &'buf [u8],
}

impl<'buf> FlattenedDeviceTree<'buf> {
    /// Try to parse a FDT from a buffer.
    ///
    /// The buffer may be larger than the device tree, everything after the declared total size is ignored.
    /// Every block is parsed completely so that a successfully parsed tree can be traversed without hitting malformed
    /// data later on.
    pub fn from_buffer(buf: &'buf [u8]) -> Result<Self, FdtError> {
        let header = FdtHeader::read_from_buffer(buf)?;
        header.check_layout(buf.len())?;
        let buf = &buf[..header.total_size as usize];

        let mem_resv_block = MemoryReservationBlock::from_buffer(&buf[header.mem_rsvmap_range()?])?;
        let strings = Strings::from_buffer(&buf[header.strings_range()?]);
        let struct_block = &buf[header.struct_range()?];
        let structure = StructureNode::from_buffer_as_root(struct_block, &strings)?;

        Ok(Self {
            header,
            structure,
            strings,
            struct_block,
            memory_reservations: mem_resv_block,
            buf,
        })
    }

    /// Try to read a FDT from a raw pointer
    ///
    /// # Safety
    /// The given pointer must be valid and the backing memory must be readable for at least 40 bytes after it.
    /// If the header is valid, the memory must also be readable for as many bytes as the header declares as total size.
    ///
    /// The underlying memory must also be valid for as long as the resulting instance is used.
    pub unsafe fn from_ptr(ptr: *const u8) -> Result<Self, FdtError> {
        let header = FdtHeader::from_ptr(ptr)?;
        if (header.total_size as usize) < HEADER_SIZE {
            return Err(HeaderReadError::InvalidTotalSize(header.total_size).into());
        }
        let buf = core::slice::from_raw_parts::<u8>(ptr, header.total_size as usize);
        Self::from_buffer(buf)
    }

    /// Iterate over all nodes of the tree, starting with the root node, in the order in which they are encoded
    pub fn nodes(&self) -> NodeWalk<'buf> {
        self.structure.walk()
    }

    /// Iterate over all nodes whose `compatible` property contains `compatible`, in tree order
    pub fn compatible_nodes<'c>(
        &self,
        compatible: &'c str,
    ) -> impl Iterator<Item = StructureNode<'buf>> + 'c
    where
        'buf: 'c,
    {
        self.nodes().filter(move |node| node.is_compatible(compatible))
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

    #[test]
    fn parsing_sg2042_minimal_works() {
        let dtb = FlattenedDeviceTree::from_buffer(DTB).unwrap();

        assert_eq!(dtb.structure.name, "");
        assert_eq!(dtb.structure.children().nth(0).unwrap().name, "cpus");
        assert_eq!(dtb.structure.children().nth(1).unwrap().name, "memory@80000000");
        assert_eq!(dtb.structure.children().nth(2).unwrap().name, "soc");
        assert_eq!(dtb.header.total_size as usize, dtb.buf.len());
        assert_eq!(dtb.memory_reservations.entries().count(), 1);
    }

    #[test]
    fn compatible_nodes_are_found_in_tree_order() {
        let dtb = FlattenedDeviceTree::from_buffer(DTB).unwrap();

        let pcie = dtb
            .compatible_nodes("sophgo,cdns-pcie-host")
            .map(|node| node.name)
            .collect::<Vec<_>>();
        assert_eq!(pcie, ["pcie@4000000000"]);

        let sd = dtb
            .compatible_nodes("bitmain,bm-sd")
            .map(|node| node.name)
            .collect::<Vec<_>>();
        assert_eq!(sd, ["sdhci@6000000000"]);

        assert_eq!(dtb.compatible_nodes("sophgo,does-not-exist").count(), 0);
    }

    #[test]
    fn compatible_matching_is_exact() {
        let blob = FdtBuilder::new()
            .begin_node("")
            .begin_node("a")
            .property_string_list("compatible", &["vendor,dev"])
            .end_node()
            .begin_node("b")
            .property_string_list("compatible", &["vendor,device"])
            .end_node()
            .begin_node("c")
            .property_string_list("compatible", &["VENDOR,DEV"])
            .end_node()
            .begin_node("d")
            .property_string_list("compatible", &["other,thing", "vendor,dev"])
            .end_node()
            .end_node()
            .build();
        let dtb = FlattenedDeviceTree::from_buffer(blob.as_bytes()).unwrap();

        let matches = dtb
            .compatible_nodes("vendor,dev")
            .map(|node| node.name)
            .collect::<Vec<_>>();
        assert_eq!(matches, ["a", "d"]);
    }

    #[test]
    fn from_ptr_reads_declared_size() {
        let dtb = unsafe { FlattenedDeviceTree::from_ptr(DTB.as_ptr()) }.unwrap();
        assert_eq!(dtb.buf.len(), DTB.len());
        assert_eq!(dtb.nodes().count(), 7);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let blob = FdtBuilder::new().begin_node("").end_node().build();
        let bytes = blob.as_bytes();
        assert!(matches!(
            FlattenedDeviceTree::from_buffer(&bytes[..bytes.len() - 8]),
            Err(FdtError::HeaderParseError(HeaderReadError::Truncated { .. }))
        ));
    }

    #[test]
    fn structure_block_with_garbage_is_rejected() {
        let mut blob = FdtBuilder::new()
            .begin_node("")
            .property_u32("x", 1)
            .end_node()
            .build();
        let header = FdtHeader::read_from_buffer(blob.as_bytes()).unwrap();
        // replace the FDT_PROP token with something unknown
        let prop_token = header.off_dt_struct as usize + 8;
        blob.as_mut_bytes()[prop_token..prop_token + 4].copy_from_slice(&0x77u32.to_be_bytes());

        assert_eq!(
            FlattenedDeviceTree::from_buffer(blob.as_bytes()),
            Err(FdtError::StructureError(NodeStructureError::NoNodeEndToken))
        );
    }
}
