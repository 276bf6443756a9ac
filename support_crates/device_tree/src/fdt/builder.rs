//! Construction of device tree blobs, mostly useful for testing code that consumes them
//!
//! ```rust
//! # use device_tree::fdt::{builder::FdtBuilder, FlattenedDeviceTree};
//! let blob = FdtBuilder::new()
//!     .begin_node("")
//!     .begin_node("sdhci@6000000000")
//!     .property_string_list("compatible", &["bitmain,bm-sd"])
//!     .property_u64_list("reg", &[0x60_0000_0000, 0x1000])
//!     .end_node()
//!     .end_node()
//!     .build();
//!
//! let dtb = FlattenedDeviceTree::from_buffer(blob.as_bytes()).unwrap();
//! assert_eq!(dtb.compatible_nodes("bitmain,bm-sd").count(), 1);
//! ```

use crate::fdt::header::{FDT_LAST_COMP_VERSION, FDT_VERSION, HEADER_MAGIC, HEADER_SIZE};
use crate::fdt::structure::{FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_NOP, FDT_PROP};
use crate::fdt::FdtHeader;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

#[inline]
fn align_up(n: usize, alignment: usize) -> usize {
    (n + alignment - 1) & !(alignment - 1)
}

// Pad a byte vector to given alignment.
#[inline]
fn align_data(data: &mut Vec<u8>, alignment: usize) {
    data.resize(align_up(data.len(), alignment), 0u8);
}

/// A builder which writes nodes and properties in the order in which its methods are called.
///
/// Nothing is validated, unbalanced nodes or odd property values are written as requested so that malformed trees
/// can be produced on purpose.
#[derive(Debug, Default, Clone)]
pub struct FdtBuilder {
    structure: Vec<u8>,
    strings: Vec<u8>,
    reservations: Vec<(u64, u64)>,
    block_gap: usize,
    min_total_size: usize,
    boot_cpuid_phys: u32,
}

impl FdtBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the memory reservation block
    pub fn reserve_memory(&mut self, address: u64, size: u64) -> &mut Self {
        self.reservations.push((address, size));
        self
    }

    /// Leave `gap` bytes of free space between all blocks of the blob
    pub fn block_gap(&mut self, gap: usize) -> &mut Self {
        self.block_gap = align_up(gap, mem::align_of::<u64>());
        self
    }

    /// Declare at least `size` bytes as the total size of the blob, the rest is free space at the end
    pub fn min_total_size(&mut self, size: usize) -> &mut Self {
        self.min_total_size = size;
        self
    }

    pub fn boot_cpuid_phys(&mut self, cpuid: u32) -> &mut Self {
        self.boot_cpuid_phys = cpuid;
        self
    }

    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.structure.extend(FDT_BEGIN_NODE.to_be_bytes());
        self.structure.extend(name.as_bytes());
        self.structure.push(0);
        align_data(&mut self.structure, mem::size_of::<u32>());
        self
    }

    pub fn end_node(&mut self) -> &mut Self {
        self.structure.extend(FDT_END_NODE.to_be_bytes());
        self
    }

    pub fn nop(&mut self) -> &mut Self {
        self.structure.extend(FDT_NOP.to_be_bytes());
        self
    }

    /// Add a property with a raw value
    pub fn property(&mut self, name: &str, value: &[u8]) -> &mut Self {
        let name_offset = self.intern_string(name);
        self.structure.extend(FDT_PROP.to_be_bytes());
        self.structure.extend((value.len() as u32).to_be_bytes());
        self.structure.extend(name_offset.to_be_bytes());
        self.structure.extend(value);
        align_data(&mut self.structure, mem::size_of::<u32>());
        self
    }

    pub fn property_str(&mut self, name: &str, value: &str) -> &mut Self {
        self.property_string_list(name, &[value])
    }

    pub fn property_string_list(&mut self, name: &str, values: &[&str]) -> &mut Self {
        let mut value = Vec::new();
        for s in values {
            value.extend(s.as_bytes());
            value.push(0);
        }
        self.property(name, &value)
    }

    pub fn property_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.property(name, &value.to_be_bytes())
    }

    /// Add a property that consists of big-endian 64-bit words
    pub fn property_u64_list(&mut self, name: &str, values: &[u64]) -> &mut Self {
        let value = values
            .iter()
            .flat_map(|word| word.to_be_bytes())
            .collect::<Vec<_>>();
        self.property(name, &value)
    }

    // Find an existing instance of `s` or add it to the strings block and return its offset.
    fn intern_string(&mut self, s: &str) -> u32 {
        let mut offset = 0;
        for existing in self.strings.split(|&b| b == 0) {
            if existing == s.as_bytes() && offset + existing.len() < self.strings.len() {
                return offset as u32;
            }
            offset += existing.len() + 1;
        }

        let offset = self.strings.len() as u32;
        self.strings.extend(s.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Encode everything into a blob.
    ///
    /// The structure block is closed with the FDT_END token automatically.
    pub fn build(&self) -> Blob {
        let mut mem_rsvmap = Vec::new();
        for (address, size) in self.reservations.iter().chain([(0, 0)].iter()) {
            mem_rsvmap.extend(address.to_be_bytes());
            mem_rsvmap.extend(size.to_be_bytes());
        }
        let mut structure = self.structure.clone();
        structure.extend(FDT_END.to_be_bytes());

        let off_mem_rsvmap = align_up(HEADER_SIZE + self.block_gap, mem::align_of::<u64>());
        let off_dt_struct = off_mem_rsvmap + mem_rsvmap.len() + self.block_gap;
        let off_dt_strings = off_dt_struct + structure.len() + self.block_gap;
        let end = align_up(off_dt_strings + self.strings.len(), mem::align_of::<u64>());
        let total_size = end.max(self.min_total_size);

        let header = FdtHeader {
            magic: HEADER_MAGIC,
            total_size: total_size as u32,
            off_dt_struct: off_dt_struct as u32,
            off_dt_strings: off_dt_strings as u32,
            off_mem_rsvmap: off_mem_rsvmap as u32,
            version: FDT_VERSION,
            last_comp_version: FDT_LAST_COMP_VERSION,
            boot_cpuid_phys: self.boot_cpuid_phys,
            size_dt_strings: self.strings.len() as u32,
            size_dt_struct: structure.len() as u32,
        };

        let mut blob = Blob::zeroed(total_size);
        let bytes = blob.as_mut_bytes();
        let mut header_buf = [0u8; HEADER_SIZE];
        header.write_to(&mut header_buf);
        bytes[..HEADER_SIZE].copy_from_slice(&header_buf);
        bytes[off_mem_rsvmap..off_mem_rsvmap + mem_rsvmap.len()].copy_from_slice(&mem_rsvmap);
        bytes[off_dt_struct..off_dt_struct + structure.len()].copy_from_slice(&structure);
        bytes[off_dt_strings..off_dt_strings + self.strings.len()].copy_from_slice(&self.strings);
        blob
    }
}

/// An 8-byte aligned byte buffer holding an encoded device tree
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Blob {
    words: Vec<u64>,
    len: usize,
}

impl Blob {
    fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(mem::size_of::<u64>())],
            len,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the words are initialized, hold at least `len` bytes and every bit pattern is a valid u8
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        // SAFETY: see as_bytes()
        unsafe { core::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }
}
