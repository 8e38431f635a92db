pub mod memory;
pub mod paging;

pub use memory::{Bootstrap, VirtualMemory, VmError, VmResult, locate};
pub use paging::{
    BITMAP_SIZE, BUFFER_POOL_SIZE, BackingStore, BufferPool, PAGE_DATA_SIZE, PAGE_SIZE, Page,
    PageId, PagingError, PagingResult, SIGNATURE, Slot,
};
