use thiserror_no_std::Error;

/// The granularity in which permanent memory is handed out (the EFI page size)
pub const PAGE_SIZE: usize = 4096;

/// The error returned when an allocation fails
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AllocError {
    #[error("the allocator has insufficient free memory to allocate the requested amount")]
    InsufficientMemory,
    #[error("the requested amount of memory is too large to be expressed in bytes")]
    SizeOverflow,
    #[error("at least one page must be allocated")]
    ZeroPages,
}

/// A desired initial state for allocated memory
#[derive(Default, Debug, Eq, PartialEq, Copy, Clone)]
pub enum AllocInit {
    /// The memory is returned as-is from the allocator.
    /// It may potentially contain old data.
    Uninitialized,

    /// Memory is filled with zeros before being returned to the caller.
    #[default]
    Zeroed,

    /// Memory is filled with a repetition of the given byte before being returned to the caller.
    Data(u8),
}

/// How many pages are needed to cover `size` bytes
pub const fn size_to_pages(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}

/// How many bytes `pages` pages span, `None` if that does not fit into a `usize`
pub const fn pages_to_size(pages: usize) -> Option<usize> {
    pages.checked_mul(PAGE_SIZE)
}

/// An implementation of `PageAllocator` hands out page-aligned memory in multiples of [`PAGE_SIZE`].
///
/// Memory that has been handed out is never returned to the allocator.
/// Callers own it for the complete lifetime `'mem`.
pub trait PageAllocator<'mem> {
    /// Attempt to reserve `pages` contiguous pages in a single step.
    ///
    /// The reservation either succeeds completely or leaves the allocator untouched.
    /// The returned block may or may not have its content initialized based on the value of `init`.
    fn allocate_pages(&self, pages: usize, init: AllocInit) -> Result<&'mem mut [u8], AllocError>;

    /// How many pages can still be allocated
    fn free_pages(&self) -> usize;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn size_to_pages_rounds_up() {
        assert_eq!(size_to_pages(0), 0);
        assert_eq!(size_to_pages(1), 1);
        assert_eq!(size_to_pages(PAGE_SIZE), 1);
        assert_eq!(size_to_pages(PAGE_SIZE + 1), 2);
        assert_eq!(size_to_pages(usize::MAX), usize::MAX / PAGE_SIZE + 1);
    }

    #[test]
    fn pages_to_size_detects_overflow() {
        assert_eq!(pages_to_size(3), Some(3 * PAGE_SIZE));
        assert_eq!(pages_to_size(usize::MAX), None);
    }
}
