use allocators::PAGE_SIZE;
use hob::{HobError, HobList, ResourceDescriptor};
use thiserror_no_std::Error;

#[derive(Debug, Error, Eq, PartialEq, Copy, Clone)]
pub enum ResourceError {
    #[error("The size {size:#x} of the window at {base:#x} cannot be rounded up to whole pages without overflowing")]
    SizeOverflow { base: u64, size: u64 },
}

/// A memory-mapped I/O window whose size covers whole pages
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MmioWindow {
    pub base: u64,
    pub size: u64,
}

impl MmioWindow {
    /// Round `size` up to the next multiple of [`PAGE_SIZE`].
    ///
    /// The base address is taken as-is.
    pub fn normalize(base: u64, size: u64) -> Result<Self, ResourceError> {
        let size = size
            .checked_next_multiple_of(PAGE_SIZE as u64)
            .ok_or(ResourceError::SizeOverflow { base, size })?;
        Ok(Self { base, size })
    }

    /// Describe this window as an uncached, present, initialized and tested MMIO resource
    pub fn announce(&self, hobs: &mut HobList<'_>) -> Result<(), HobError> {
        hobs.add_resource_descriptor(&ResourceDescriptor::mmio(self.base, self.size))?;
        log::debug!(
            "added MMIO resource base={:#x} size={:#x}",
            self.base,
            self.size
        );
        Ok(())
    }
}
