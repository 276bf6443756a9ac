use crate::guid::Guid;
use bitflags::bitflags;

/// What kind of resource a [`ResourceDescriptor`] describes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum ResourceType {
    SystemMemory = 0x0,
    MemoryMappedIo = 0x1,
    Io = 0x2,
    FirmwareDevice = 0x3,
    MemoryMappedIoPort = 0x4,
    MemoryReserved = 0x5,
    IoReserved = 0x6,
}

impl TryFrom<u32> for ResourceType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::SystemMemory),
            0x1 => Ok(Self::MemoryMappedIo),
            0x2 => Ok(Self::Io),
            0x3 => Ok(Self::FirmwareDevice),
            0x4 => Ok(Self::MemoryMappedIoPort),
            0x5 => Ok(Self::MemoryReserved),
            0x6 => Ok(Self::IoReserved),
            other => Err(other),
        }
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ResourceAttribute: u32 {
        /// The resource exists in the system
        const PRESENT = 0x0000_0001;
        /// The resource has been initialized and can be used
        const INITIALIZED = 0x0000_0002;
        /// The resource has been tested
        const TESTED = 0x0000_0004;
        const UNCACHEABLE = 0x0000_0400;
        const WRITE_COMBINEABLE = 0x0000_0800;
        const WRITE_THROUGH_CACHEABLE = 0x0000_1000;
        const WRITE_BACK_CACHEABLE = 0x0000_2000;

        /// Device registers, always uncached and always considered usable once described
        const MMIO = Self::PRESENT.bits()
            | Self::INITIALIZED.bits()
            | Self::UNCACHEABLE.bits()
            | Self::TESTED.bits();
    }
}

/// A physical address range and what it is backed by
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResourceDescriptor {
    /// The driver or component that owns the resource, [`Guid::ZERO`] if nobody does yet
    pub owner: Guid,
    pub resource_type: ResourceType,
    pub attributes: ResourceAttribute,
    pub start: u64,
    pub length: u64,
}

impl ResourceDescriptor {
    /// Describe a memory-mapped I/O window that is not owned by anyone yet
    pub const fn mmio(start: u64, length: u64) -> Self {
        Self {
            owner: Guid::ZERO,
            resource_type: ResourceType::MemoryMappedIo,
            attributes: ResourceAttribute::MMIO,
            start,
            length,
        }
    }
}
