mod error;


pub use error::{VmError, VmResult};

use std::path::Path;

use tracing::info;

use crate::paging::{
    BUFFER_POOL_SIZE, BackingStore, BufferPool, HEADER_SIZE, PAGE_DATA_SIZE, PAGE_SIZE, PageId,
    PagingError, Slot,
};

/// How the buffer pool is filled when a store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bootstrap {
    /// Load the oldest resident page once per slot, page 0 when nothing is
    /// resident yet. On a fresh pool this loads page 0 three times, reloading
    /// it in place so it never occupies two slots
    #[default]
    Faithful,
    /// Prime the slots with the lowest-numbered pages
    Prefetch,
}

/// Page number and in-page offset of a logical index
pub fn locate(index: u64) -> (PageId, usize) {
    let page_id = (index / PAGE_DATA_SIZE as u64) as PageId;
    let offset = (index % PAGE_DATA_SIZE as u64) as usize;
    (page_id, offset)
}

/// A flat `i32` array backed by a paged file
///
/// Reads fault pages into a small buffer pool. Every write is persisted
/// before `set` returns.
#[derive(Debug)]
pub struct VirtualMemory {
    pool: BufferPool,
    logical_size: u64,
    /// Logical clock, advanced once per access
    clock: u64,
}

impl VirtualMemory {
    /// Open or create the store at `path` holding `logical_size` elements
    pub fn open<P: AsRef<Path>>(path: P, logical_size: u64) -> VmResult<Self> {
        Self::open_with(path, logical_size, Bootstrap::default())
    }

    /// Open with an explicit bootstrap strategy
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        logical_size: u64,
        bootstrap: Bootstrap,
    ) -> VmResult<Self> {
        let pages = logical_size.div_ceil(PAGE_DATA_SIZE as u64);
        // The last record must end at an offset a file can address
        pages
            .checked_mul(PAGE_SIZE as u64)
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE as u64))
            .ok_or(VmError::SizeTooLarge(logical_size))?;
        let page_count =
            usize::try_from(pages).map_err(|_| VmError::SizeTooLarge(logical_size))?;

        let store = BackingStore::open(path, page_count)?;
        let mut vm = Self {
            pool: BufferPool::new(store),
            logical_size,
            clock: 0,
        };
        vm.bootstrap(bootstrap)?;

        info!(
            path = %vm.pool.store().path().display(),
            logical_size,
            page_count,
            ?bootstrap,
            "virtual memory ready"
        );
        Ok(vm)
    }

    fn bootstrap(&mut self, bootstrap: Bootstrap) -> VmResult<()> {
        match bootstrap {
            Bootstrap::Faithful => {
                if self.pool.store().page_count() == 0 {
                    return Ok(());
                }
                for _ in 0..BUFFER_POOL_SIZE {
                    let page_id = self.pool.oldest_resident_page().unwrap_or(0);
                    let slot = match self.pool.find(page_id) {
                        Some(slot) => slot,
                        None => self.pool.eviction_candidate(),
                    };
                    self.pool.load(slot, page_id)?;
                }
            }
            Bootstrap::Prefetch => {
                let page_count = self.pool.store().page_count();
                for (slot, page_id) in (0..BUFFER_POOL_SIZE).zip(0..page_count) {
                    self.pool.load(slot, page_id)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve an index to a resident slot, recording the access
    fn resolve(&mut self, index: i64) -> VmResult<(usize, PageId, usize)> {
        if index < 0 || index as u64 >= self.logical_size {
            return Err(VmError::IndexOutOfRange {
                index,
                size: self.logical_size,
            });
        }

        let (page_id, offset) = locate(index as u64);
        let slot = self.pool.fetch(page_id)?;

        self.clock += 1;
        self.pool.touch(slot, self.clock);
        Ok((slot, page_id, offset))
    }

    /// Read the element at `index`
    pub fn get(&mut self, index: i64) -> VmResult<i32> {
        let (slot, page_id, offset) = self.resolve(index)?;
        let page = self
            .pool
            .page(slot)
            .ok_or(PagingError::PageNotFound(page_id))?;
        Ok(page.get(offset))
    }

    /// Write the element at `index` and persist its page
    pub fn set(&mut self, index: i64, value: i32) -> VmResult<()> {
        let (slot, page_id, offset) = self.resolve(index)?;
        self.pool
            .page_mut(slot)
            .ok_or(PagingError::PageNotFound(page_id))?
            .set(offset, value);
        self.pool.save(slot)?;
        Ok(())
    }

    /// Persist every resident page and release the file
    pub fn close(mut self) -> VmResult<()> {
        self.pool.flush_all()?;
        info!(
            path = %self.pool.store().path().display(),
            access_count = self.pool.access_count(),
            "closed virtual memory"
        );
        Ok(())
    }

    /// Physical page loads plus physical page writes so far
    pub fn access_count(&self) -> u64 {
        self.pool.access_count()
    }

    pub fn logical_size(&self) -> u64 {
        self.logical_size
    }

    pub fn page_count(&self) -> usize {
        self.pool.store().page_count()
    }

    pub fn path(&self) -> &Path {
        self.pool.store().path()
    }

    /// Current buffer slots, for diagnostics
    pub fn slots(&self) -> &[Slot; BUFFER_POOL_SIZE] {
        self.pool.slots()
    }
}
