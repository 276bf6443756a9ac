use core::mem;
use core::ops::Range;
use thiserror_no_std::Error;

/// The value of [`FdtHeader::magic`] in every valid device tree blob
pub const HEADER_MAGIC: u32 = 0xd00dfeed;

/// Size in bytes of the encoded [`FdtHeader`]
pub const HEADER_SIZE: usize = 10 * mem::size_of::<u32>();

/// The structure version that is written by this library
pub const FDT_VERSION: u32 = 17;

/// The oldest version that [`FDT_VERSION`] is backwards compatible with
pub const FDT_LAST_COMP_VERSION: u32 = 16;

/// Errors that can occur when reading the FDT header
#[derive(Debug, Error, Eq, PartialEq)]
pub enum HeaderReadError {
    /// The provided buffer did not contain the required magic bytes at the start
    #[error("The provided buffer did not contain the required magic bytes at the start")]
    InvalidMagic,
    /// The provided buffer did not contain enough bytes to read a header from it
    #[error("The provided buffer did not contain enough bytes to read a header from it")]
    BufferTooSmall,
    /// The device tree blob is encoded using an unsupported version
    #[error("The device tree blob is encoded using version {0} (with last compatible version being {1}) which is not supported")]
    UnsupportedVersion(u32, u32),
    /// The device tree blob is not aligned to an 8-byte boundary
    #[error("The device tree blob is not aligned to an 8-byte boundary")]
    InvalidAlignment,
    /// The declared total size cannot even hold the header itself
    #[error("The declared total size of {0} bytes is smaller than the header")]
    InvalidTotalSize(u32),
    /// The declared total size is larger than the buffer that holds the blob
    #[error("The declared total size of {total_size} bytes exceeds the {available} available bytes")]
    Truncated { total_size: u32, available: usize },
    /// One of the blocks lies (partially) outside of the declared total size
    #[error("The {0} block does not lie inside the device tree blob")]
    BlockOutOfBounds(&'static str),
    /// One of the blocks does not start at an offset with the required alignment
    #[error("The {0} block is not correctly aligned")]
    MisalignedBlock(&'static str),
}

/// The FDT-Header data structure present at the start of every device tree blob.
/// All the header fields are 32-bit integers, stored in big-endian format.
///
/// It is modelled according to the [Devicetree Specification section 5.2](https://devicetree-specification.readthedocs.io/en/latest/chapter5-flattened-format.html#header).
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct FdtHeader {
    /// This field shall contain the value 0xd00dfeed (big-endian).
    pub magic: u32,
    /// This field shall contain the total size in bytes of the devicetree data structure.
    /// This size shall encompass all sections of the structure: the header, the memory reservation block, structure block and strings block, as well as any free space gaps between the blocks or after the final block.
    pub total_size: u32,
    /// This field shall contain the offset in bytes of the structure block from the beginning of the header.
    pub off_dt_struct: u32,
    /// This field shall contain the offset in bytes of the strings block from the beginning of the header.
    pub off_dt_strings: u32,
    /// This field shall contain the offset in bytes of the memory reservation block from the beginning of the header.
    pub off_mem_rsvmap: u32,
    /// This field shall contain the version of the devicetree data structure.
    pub version: u32,
    /// This field shall contain the lowest version of the devicetree data structure with which the version used is backwards compatible.
    pub last_comp_version: u32,
    /// This field shall contain the physical ID of the system's boot CPU.
    pub boot_cpuid_phys: u32,
    /// This field shall contain the length in bytes of the strings block section of the devicetree blob.
    pub size_dt_strings: u32,
    /// This field shall contain the length in bytes of the structure block section of the devicetree blob.
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Try to read a header from a provided buffer.
    ///
    /// Only the magic, the version and the alignment of the buffer are checked here.
    /// Use [`check_layout`](FdtHeader::check_layout) before trusting any of the offsets.
    pub fn read_from_buffer(buf: &[u8]) -> Result<Self, HeaderReadError> {
        // check alignment
        if (buf.as_ptr() as usize) % 8 != 0 {
            return Err(HeaderReadError::InvalidAlignment);
        }

        fn read_u32(buf: &[u8]) -> Result<(u32, &[u8]), HeaderReadError> {
            let (head, tail) = buf
                .split_first_chunk::<{ mem::size_of::<u32>() }>()
                .ok_or(HeaderReadError::BufferTooSmall)?;
            Ok((u32::from_be_bytes(*head), tail))
        }

        let (magic, buf) = read_u32(buf)?;
        if magic != HEADER_MAGIC {
            return Err(HeaderReadError::InvalidMagic);
        }
        let (total_size, buf) = read_u32(buf)?;
        let (off_dt_struct, buf) = read_u32(buf)?;
        let (off_dt_strings, buf) = read_u32(buf)?;
        let (off_mem_rsvmap, buf) = read_u32(buf)?;
        let (version, buf) = read_u32(buf)?;
        let (last_comp_version, buf) = read_u32(buf)?;
        // size_dt_struct only exists since version 17
        if version < FDT_VERSION || last_comp_version > FDT_VERSION {
            return Err(HeaderReadError::UnsupportedVersion(
                version,
                last_comp_version,
            ));
        }
        let (boot_cpuid_phys, buf) = read_u32(buf)?;
        let (size_dt_strings, buf) = read_u32(buf)?;
        let (size_dt_struct, _buf) = read_u32(buf)?;

        Ok(Self {
            magic,
            total_size,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            version,
            last_comp_version,
            boot_cpuid_phys,
            size_dt_strings,
            size_dt_struct,
        })
    }

    /// Try to read a header from a provided memory location
    ///
    /// # Safety
    /// The given pointer must be valid and the backing memory must be readable for at least 40 bytes after it.
    pub unsafe fn from_ptr(ptr: *const u8) -> Result<Self, HeaderReadError> {
        let buf = core::slice::from_raw_parts::<u8>(ptr, HEADER_SIZE);
        Self::read_from_buffer(buf)
    }

    /// Verify that the blob described by this header fits into `available` bytes and that all blocks lie inside of it.
    pub fn check_layout(&self, available: usize) -> Result<(), HeaderReadError> {
        if (self.total_size as usize) < HEADER_SIZE {
            return Err(HeaderReadError::InvalidTotalSize(self.total_size));
        }
        if self.total_size as usize > available {
            return Err(HeaderReadError::Truncated {
                total_size: self.total_size,
                available,
            });
        }

        if self.off_mem_rsvmap % 8 != 0 {
            return Err(HeaderReadError::MisalignedBlock("memory reservation"));
        }
        if self.off_dt_struct % 4 != 0 {
            return Err(HeaderReadError::MisalignedBlock("structure"));
        }
        if (self.off_mem_rsvmap as usize) < HEADER_SIZE
            || self.off_mem_rsvmap >= self.total_size
        {
            return Err(HeaderReadError::BlockOutOfBounds("memory reservation"));
        }
        self.struct_range()?;
        self.strings_range()?;

        Ok(())
    }

    /// The byte range of the structure block relative to the start of the blob
    pub fn struct_range(&self) -> Result<Range<usize>, HeaderReadError> {
        self.block_range(self.off_dt_struct, self.size_dt_struct)
            .ok_or(HeaderReadError::BlockOutOfBounds("structure"))
    }

    /// The byte range of the strings block relative to the start of the blob
    pub fn strings_range(&self) -> Result<Range<usize>, HeaderReadError> {
        self.block_range(self.off_dt_strings, self.size_dt_strings)
            .ok_or(HeaderReadError::BlockOutOfBounds("strings"))
    }

    /// The byte range from the memory reservation block up to the end of the blob.
    ///
    /// The header does not record the size of that block, it is only known after the terminating entry was found.
    pub fn mem_rsvmap_range(&self) -> Result<Range<usize>, HeaderReadError> {
        self.block_range(
            self.off_mem_rsvmap,
            self.total_size.saturating_sub(self.off_mem_rsvmap),
        )
        .ok_or(HeaderReadError::BlockOutOfBounds("memory reservation"))
    }

    fn block_range(&self, offset: u32, size: u32) -> Option<Range<usize>> {
        let end = offset.checked_add(size)?;
        if (offset as usize) < HEADER_SIZE || end > self.total_size {
            return None;
        }
        Some(offset as usize..end as usize)
    }

    /// Encode the header into its big-endian wire format
    pub fn write_to(&self, buf: &mut [u8; HEADER_SIZE]) {
        let fields = [
            self.magic,
            self.total_size,
            self.off_dt_struct,
            self.off_dt_strings,
            self.off_mem_rsvmap,
            self.version,
            self.last_comp_version,
            self.boot_cpuid_phys,
            self.size_dt_strings,
            self.size_dt_struct,
        ];
        for (chunk, field) in buf.chunks_exact_mut(mem::size_of::<u32>()).zip(fields) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
    }
}
