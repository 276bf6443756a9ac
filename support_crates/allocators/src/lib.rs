//! Allocation of permanent memory during early boot
#![no_std]

mod page_pool;
mod traits;

pub use page_pool::PagePool;
pub use traits::{pages_to_size, size_to_pages, AllocError, AllocInit, PageAllocator, PAGE_SIZE};
