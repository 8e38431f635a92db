mod bitmap;
mod buffer_pool;
mod error;
mod page;
mod store;

pub use bitmap::{encode, validate};
pub use buffer_pool::{BufferPool, Slot};
pub use error::{PagingError, PagingResult};
pub use page::Page;
pub use store::BackingStore;

/// Page size in bytes: one bitmap plus one data array
pub const PAGE_SIZE: usize = 512;

/// Number of `i32` cells in a page-sized block
pub const ELEMENTS_PER_PAGE: usize = PAGE_SIZE / size_of::<i32>();

/// Bitmap bytes per page, one bit per cell
pub const BITMAP_SIZE: usize = ELEMENTS_PER_PAGE / 8;

/// Data elements per page
/// Four cells worth of bytes are given up to make room for the bitmap
pub const PAGE_DATA_SIZE: usize = ELEMENTS_PER_PAGE - size_of::<i32>();

/// Number of slots in the buffer pool
pub const BUFFER_POOL_SIZE: usize = 3;

/// Signature bytes at the start of the store
pub const HEADER_SIZE: usize = 2;

/// Store signature, "VM" when written little-endian
pub const SIGNATURE: u16 = 0x4D56;

/// Page ID type
pub type PageId = usize;

const _: () = assert!(BITMAP_SIZE + PAGE_DATA_SIZE * size_of::<i32>() == PAGE_SIZE);
