//! Moving the device tree into permanent firmware memory

use crate::error::PhaseError;
use allocators::{size_to_pages, AllocInit, PageAllocator};
use device_tree::fdt::FlattenedDeviceTree;
use hob::{HobError, HobList, FDT_HOB_GUID};

/// A device tree that has been copied into pages of permanent memory.
///
/// The copy fills all of its pages, everything after the packed tree is free space that later phases can use to
/// modify the tree in-place.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RelocatedTree<'mem> {
    tree: FlattenedDeviceTree<'mem>,
}

impl<'mem> RelocatedTree<'mem> {
    pub fn tree(&self) -> &FlattenedDeviceTree<'mem> {
        &self.tree
    }

    /// The physical address at which the copy is located
    pub fn address(&self) -> u64 {
        self.tree.buf.as_ptr() as usize as u64
    }

    /// The size of the copy including its free space, always a multiple of the page size
    pub fn size(&self) -> usize {
        self.tree.buf.len()
    }

    /// Tell later boot phases where the device tree is located.
    ///
    /// There is only one slot for this announcement so it fails if the HOB list already contains one.
    pub fn announce(&self, hobs: &mut HobList<'_>) -> Result<(), HobError> {
        hobs.add_unique_guid_hob(&FDT_HOB_GUID, &self.address().to_le_bytes())?;
        log::info!(
            "device tree is now located at {:#x} ({} bytes)",
            self.address(),
            self.size()
        );
        Ok(())
    }
}

/// Copy `src` into as many freshly allocated pages as its declared total size requires.
///
/// The pages are allocated in a single step and are never given back, also not if copying fails.
pub fn relocate<'mem>(
    src: &FlattenedDeviceTree<'_>,
    allocator: &impl PageAllocator<'mem>,
) -> Result<RelocatedTree<'mem>, PhaseError> {
    let pages = size_to_pages(src.header.total_size as usize);
    let dst = allocator.allocate_pages(pages, AllocInit::Uninitialized)?;
    src.open_into(dst)?;

    let dst: &'mem [u8] = dst;
    let tree = FlattenedDeviceTree::from_buffer(dst)?;
    Ok(RelocatedTree { tree })
}
