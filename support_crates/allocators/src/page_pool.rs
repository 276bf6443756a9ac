use crate::traits::{pages_to_size, AllocError, AllocInit, PageAllocator, PAGE_SIZE};
use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

/// A pool of permanent pages which are handed out from a fixed region of backing memory.
///
/// The pool bumps a marker through its backing memory.
/// Pages are never given back, so every allocation is valid for as long as the backing memory is.
///
/// Boot phases run single threaded which is why the marker lives in a [`Cell`].
/// This also makes the pool `!Sync`.
#[derive(Debug)]
pub struct PagePool<'mem> {
    /// First page of the backing memory
    start: NonNull<u8>,
    /// Number of pages in the backing memory
    pages: usize,
    /// Number of pages that have already been handed out
    allocated: Cell<usize>,
    _mem: PhantomData<&'mem mut [u8]>,
}

impl<'mem> PagePool<'mem> {
    /// Create a pool that allocates from `mem`.
    ///
    /// Bytes before the first page boundary and after the last complete page of `mem` are not used.
    pub fn new(mem: &'mem mut [u8]) -> Self {
        let offset = mem.as_ptr().align_offset(PAGE_SIZE);
        let usable = mem.get_mut(offset..).unwrap_or_default();
        let pages = usable.len() / PAGE_SIZE;
        log::trace!(
            "creating page pool with {} pages at {:p}",
            pages,
            usable.as_ptr()
        );

        Self {
            start: NonNull::from(usable).cast(),
            pages,
            allocated: Cell::new(0),
            _mem: PhantomData,
        }
    }

    /// Create a new pool that allocates from the memory region between `start` and `end`
    ///
    /// # Safety
    /// The entire memory area must be accessible and otherwise completely unused for the lifetime `'mem`.
    pub unsafe fn new_raw(start: *mut u8, end: *mut u8) -> Self {
        assert!(start <= end);
        Self::new(&mut *ptr::slice_from_raw_parts_mut(
            start,
            end as usize - start as usize,
        ))
    }

    /// The number of pages that have been handed out so far
    pub fn allocated_pages(&self) -> usize {
        self.allocated.get()
    }

    /// The total number of pages managed by this pool
    pub fn total_pages(&self) -> usize {
        self.pages
    }
}

impl<'mem> PageAllocator<'mem> for PagePool<'mem> {
    fn allocate_pages(&self, pages: usize, init: AllocInit) -> Result<&'mem mut [u8], AllocError> {
        if pages == 0 {
            return Err(AllocError::ZeroPages);
        }
        let size = pages_to_size(pages).ok_or(AllocError::SizeOverflow)?;
        if pages > self.free_pages() {
            return Err(AllocError::InsufficientMemory);
        }

        let allocated = self.allocated.get();
        self.allocated.set(allocated + pages);

        // carve out a subslice from the backing memory.
        // the marker guarantees that no two returned slices overlap and the check above guarantees that the slice
        // lies inside the backing memory
        let result = unsafe {
            let begin = self.start.as_ptr().add(allocated * PAGE_SIZE);
            &mut *ptr::slice_from_raw_parts_mut(begin, size)
        };
        log::trace!("allocated {} pages at {:p}", pages, result.as_ptr());

        match init {
            AllocInit::Zeroed => result.fill(0),
            AllocInit::Data(data) => result.fill(data),
            AllocInit::Uninitialized => {}
        }

        Ok(result)
    }

    fn free_pages(&self) -> usize {
        self.pages - self.allocated.get()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    extern crate std;
    use std::boxed::Box;

    #[repr(C, align(4096))]
    struct PageAligned<const LENGTH: usize>([u8; LENGTH]);

    #[test]
    fn allocations_are_page_aligned_and_disjoint() {
        let mut mem = Box::new(PageAligned([0xffu8; 4 * PAGE_SIZE]));
        let pool = PagePool::new(&mut mem.0);
        assert_eq!(pool.total_pages(), 4);

        let first = pool.allocate_pages(1, AllocInit::Zeroed).unwrap();
        let second = pool.allocate_pages(2, AllocInit::Data(0x42)).unwrap();
        assert_eq!(first.len(), PAGE_SIZE);
        assert_eq!(second.len(), 2 * PAGE_SIZE);
        assert_eq!(first.as_ptr() as usize % PAGE_SIZE, 0);
        assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + PAGE_SIZE);
        assert!(first.iter().all(|&b| b == 0));
        assert!(second.iter().all(|&b| b == 0x42));
        assert_eq!(pool.allocated_pages(), 3);
        assert_eq!(pool.free_pages(), 1);
    }

    #[test]
    fn failed_allocation_leaves_pool_untouched() {
        let mut mem = Box::new(PageAligned([0u8; 2 * PAGE_SIZE]));
        let pool = PagePool::new(&mut mem.0);

        assert_eq!(
            pool.allocate_pages(3, AllocInit::Uninitialized),
            Err(AllocError::InsufficientMemory)
        );
        assert_eq!(pool.free_pages(), 2);
        assert!(pool.allocate_pages(2, AllocInit::Uninitialized).is_ok());
        assert_eq!(
            pool.allocate_pages(1, AllocInit::Uninitialized),
            Err(AllocError::InsufficientMemory)
        );
    }

    #[test]
    fn degenerate_requests_are_rejected() {
        let mut mem = Box::new(PageAligned([0u8; PAGE_SIZE]));
        let pool = PagePool::new(&mut mem.0);
        assert_eq!(
            pool.allocate_pages(0, AllocInit::Zeroed),
            Err(AllocError::ZeroPages)
        );
        assert_eq!(
            pool.allocate_pages(usize::MAX, AllocInit::Zeroed),
            Err(AllocError::SizeOverflow)
        );
        assert_eq!(pool.free_pages(), 1);
    }

    #[test]
    fn unaligned_backing_memory_is_trimmed_to_whole_pages() {
        let mut mem = Box::new(PageAligned([0u8; 3 * PAGE_SIZE]));
        let pool = PagePool::new(&mut mem.0[1..]);
        assert_eq!(pool.total_pages(), 2);

        let page = pool.allocate_pages(1, AllocInit::Zeroed).unwrap();
        assert_eq!(page.as_ptr() as usize % PAGE_SIZE, 0);
    }

    #[test]
    fn tiny_backing_memory_has_no_pages() {
        let mut mem = [0u8; 16];
        let pool = PagePool::new(&mut mem);
        assert_eq!(pool.total_pages(), 0);
        assert_eq!(
            pool.allocate_pages(1, AllocInit::Zeroed),
            Err(AllocError::InsufficientMemory)
        );
    }

    #[test]
    fn new_raw_uses_the_given_range() {
        let mut mem = Box::new(PageAligned([0u8; 2 * PAGE_SIZE]));
        let start = mem.0.as_mut_ptr();
        let pool = unsafe { PagePool::new_raw(start, start.add(2 * PAGE_SIZE)) };
        assert_eq!(pool.total_pages(), 2);
        assert_eq!(
            pool.allocate_pages(1, AllocInit::Zeroed).unwrap().as_ptr(),
            start as *const u8
        );
    }
}
