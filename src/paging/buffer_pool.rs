use tracing::{debug, warn};

use super::error::{PagingError, PagingResult};
use super::page::Page;
use super::store::BackingStore;
use super::{BUFFER_POOL_SIZE, PageId};

/// State of one buffer slot
#[derive(Debug, Clone, Default)]
pub enum Slot {
    #[default]
    Empty,
    Resident(Page),
}

impl Slot {
    pub fn page(&self) -> Option<&Page> {
        match self {
            Slot::Empty => None,
            Slot::Resident(page) => Some(page),
        }
    }

    fn page_mut(&mut self) -> Option<&mut Page> {
        match self {
            Slot::Empty => None,
            Slot::Resident(page) => Some(page),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Fixed set of page slots in front of the backing store
///
/// Slots are addressed by index. A page number is resident in at most one slot.
#[derive(Debug)]
pub struct BufferPool {
    store: BackingStore,
    slots: [Slot; BUFFER_POOL_SIZE],
    /// Physical page loads plus physical page writes
    access_count: u64,
}

impl BufferPool {
    /// Create a pool with every slot empty
    pub fn new(store: BackingStore) -> Self {
        Self {
            store,
            slots: Default::default(),
            access_count: 0,
        }
    }

    pub fn store(&self) -> &BackingStore {
        &self.store
    }

    pub fn slots(&self) -> &[Slot; BUFFER_POOL_SIZE] {
        &self.slots
    }

    /// Page held in a slot, if any
    pub fn page(&self, slot: usize) -> Option<&Page> {
        self.slots[slot].page()
    }

    /// Mutable page held in a slot, if any
    pub fn page_mut(&mut self, slot: usize) -> Option<&mut Page> {
        self.slots[slot].page_mut()
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Slot holding `page_id`
    pub fn find(&self, page_id: PageId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.page().is_some_and(|page| page.number() == page_id))
    }

    /// Slot to load the next page into
    ///
    /// The first empty slot wins. Otherwise the least recently touched one,
    /// ties going to the lowest index.
    pub fn eviction_candidate(&self) -> usize {
        let mut candidate = 0;
        let mut oldest = u64::MAX;

        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Empty => return index,
                Slot::Resident(page) => {
                    if page.last_touch() < oldest {
                        candidate = index;
                        oldest = page.last_touch();
                    }
                }
            }
        }

        candidate
    }

    /// Page number of the least recently touched resident page
    pub fn oldest_resident_page(&self) -> Option<PageId> {
        self.slots
            .iter()
            .filter_map(Slot::page)
            .fold(None, |oldest: Option<&Page>, page| match oldest {
                Some(current) if current.last_touch() <= page.last_touch() => Some(current),
                _ => Some(page),
            })
            .map(Page::number)
    }

    /// Resolve `page_id` to a slot, faulting it in if it is not resident
    pub fn fetch(&mut self, page_id: PageId) -> PagingResult<usize> {
        if let Some(slot) = self.find(page_id) {
            return Ok(slot);
        }

        let slot = self.eviction_candidate();
        self.load(slot, page_id)?;
        Ok(slot)
    }

    /// Load a page from disk into `slot`, evicting whatever it held
    ///
    /// On a bitmap mismatch the slot is left empty and `CorruptPage` is returned.
    pub fn load(&mut self, slot: usize, page_id: PageId) -> PagingResult<()> {
        debug_assert!(
            self.find(page_id).is_none_or(|resident| resident == slot),
            "page {} is already resident in another slot",
            page_id
        );

        self.evict(slot)?;

        let page = self.store.read_page(page_id)?;
        if !page.is_consistent() {
            warn!(page_id, slot, "bitmap does not match page data");
            return Err(PagingError::CorruptPage(page_id));
        }
        self.access_count += 1;

        debug!(page_id, slot, "loaded page");
        self.slots[slot] = Slot::Resident(page);
        Ok(())
    }

    /// Write the page in `slot` back to disk
    /// The bitmap is recomputed from the data first. Empty slots are skipped.
    pub fn save(&mut self, slot: usize) -> PagingResult<()> {
        let Some(page) = self.slots[slot].page_mut() else {
            return Ok(());
        };

        page.refresh_bitmap();
        self.store.write_page(page)?;
        page.mark_clean();
        self.access_count += 1;

        debug!(page_id = page.number(), slot, "saved page");
        Ok(())
    }

    /// Release a slot, saving it first if dirty
    pub fn evict(&mut self, slot: usize) -> PagingResult<()> {
        let Some(page) = self.slots[slot].page() else {
            return Ok(());
        };

        let page_id = page.number();
        if page.is_dirty() {
            self.save(slot)?;
        }

        debug!(page_id, slot, "evicted page");
        self.slots[slot] = Slot::Empty;
        Ok(())
    }

    /// Record an access to the page in `slot`
    pub fn touch(&mut self, slot: usize, tick: u64) {
        if let Some(page) = self.slots[slot].page_mut() {
            page.touch(tick);
        }
    }

    /// Save every resident slot and sync the file
    pub fn flush_all(&mut self) -> PagingResult<()> {
        for slot in 0..BUFFER_POOL_SIZE {
            self.save(slot)?;
        }
        self.store.sync()
    }

    /// Save only the slots with unsaved changes
    pub fn flush_dirty(&mut self) -> PagingResult<()> {
        for slot in 0..BUFFER_POOL_SIZE {
            if self.slots[slot].page().is_some_and(Page::is_dirty) {
                self.save(slot)?;
            }
        }
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Flush unsaved changes when the pool is dropped
        let _ = self.flush_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::PAGE_DATA_SIZE;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn setup_test_env(page_count: usize) -> (TempDir, BufferPool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.vm");
        let store = BackingStore::open(&test_file, page_count).unwrap();
        (temp_dir, BufferPool::new(store))
    }

    fn resident_count(pool: &BufferPool) -> usize {
        pool.slots().iter().filter(|slot| !slot.is_empty()).count()
    }

    fn assert_unique(pool: &BufferPool) {
        let mut seen = HashSet::new();
        for page in pool.slots().iter().filter_map(Slot::page) {
            assert!(seen.insert(page.number()), "page {} resident twice", page.number());
        }
    }

    #[test]
    fn test_new_pool_is_empty() {
        let (_temp_dir, pool) = setup_test_env(4);
        assert_eq!(resident_count(&pool), 0);
        assert_eq!(pool.find(0), None);
        assert_eq!(pool.eviction_candidate(), 0);
        assert_eq!(pool.oldest_resident_page(), None);
        assert_eq!(pool.access_count(), 0);
    }

    #[test]
    fn test_load_and_find() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        pool.load(1, 2).unwrap();
        assert_eq!(pool.find(2), Some(1));
        assert_eq!(pool.access_count(), 1);

        let page = pool.page(1).unwrap();
        assert_eq!(page.number(), 2);
        assert_eq!(page.last_touch(), 0);
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_empty_slots_preferred() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        pool.load(0, 0).unwrap();
        pool.touch(0, 1);
        assert_eq!(pool.eviction_candidate(), 1);

        pool.load(1, 1).unwrap();
        pool.touch(1, 2);
        assert_eq!(pool.eviction_candidate(), 2);
    }

    #[test]
    fn test_least_recently_touched_evicted() {
        let (_temp_dir, mut pool) = setup_test_env(8);

        for page_id in 0..BUFFER_POOL_SIZE {
            let slot = pool.fetch(page_id).unwrap();
            pool.touch(slot, page_id as u64 + 1);
        }
        // Touch page 0 again so page 1 becomes the oldest
        let slot = pool.fetch(0).unwrap();
        pool.touch(slot, 10);

        assert_eq!(pool.eviction_candidate(), 1);
        assert_eq!(pool.oldest_resident_page(), Some(1));

        let slot = pool.fetch(7).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(pool.find(1), None);
        assert_eq!(pool.find(0), Some(0));
        assert_eq!(pool.find(2), Some(2));
        assert_unique(&pool);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        for slot in 0..BUFFER_POOL_SIZE {
            pool.load(slot, slot).unwrap();
        }
        // Untouched pages all carry last_touch 0
        assert_eq!(pool.eviction_candidate(), 0);
        assert_eq!(pool.oldest_resident_page(), Some(0));

        pool.touch(0, 5);
        assert_eq!(pool.eviction_candidate(), 1);
    }

    #[test]
    fn test_fetch_resident_page_does_not_reload() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        let first = pool.fetch(3).unwrap();
        let second = pool.fetch(3).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.access_count(), 1);
        assert_eq!(resident_count(&pool), 1);
    }

    #[test]
    fn test_save_writes_through() {
        let (temp_dir, mut pool) = setup_test_env(4);

        let slot = pool.fetch(2).unwrap();
        pool.page_mut(slot).unwrap().set(PAGE_DATA_SIZE - 1, 77);
        assert!(pool.page(slot).unwrap().is_dirty());

        pool.save(slot).unwrap();
        assert!(!pool.page(slot).unwrap().is_dirty());
        assert_eq!(pool.access_count(), 2);
        drop(pool);

        let mut store = BackingStore::open(temp_dir.path().join("test.vm"), 4).unwrap();
        let page = store.read_page(2).unwrap();
        assert_eq!(page.get(PAGE_DATA_SIZE - 1), 77);
        assert!(page.is_consistent());
    }

    #[test]
    fn test_save_empty_slot_is_noop() {
        let (_temp_dir, mut pool) = setup_test_env(4);
        pool.save(1).unwrap();
        assert_eq!(pool.access_count(), 0);
    }

    #[test]
    fn test_dirty_page_saved_on_eviction() {
        let (temp_dir, mut pool) = setup_test_env(4);

        let slot = pool.fetch(0).unwrap();
        pool.page_mut(slot).unwrap().set(0, 5);
        pool.evict(slot).unwrap();
        assert!(pool.slots()[slot].is_empty());
        drop(pool);

        let mut store = BackingStore::open(temp_dir.path().join("test.vm"), 4).unwrap();
        assert_eq!(store.read_page(0).unwrap().get(0), 5);
    }

    #[test]
    fn test_corrupt_page_leaves_slot_empty() {
        let (temp_dir, pool) = setup_test_env(4);
        drop(pool);

        let path = temp_dir.path().join("test.vm");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[BackingStore::page_offset(3) as usize + 2] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let mut pool = BufferPool::new(BackingStore::open(&path, 4).unwrap());
        pool.load(0, 0).unwrap();

        let result = pool.load(0, 3);
        assert!(matches!(result, Err(PagingError::CorruptPage(3))));
        assert!(pool.slots()[0].is_empty());
        assert_eq!(pool.find(3), None);

        // Only the successful load of page 0 is counted
        assert_eq!(pool.access_count(), 1);
    }

    #[test]
    fn test_flush_all_saves_every_resident_slot() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        pool.fetch(0).unwrap();
        pool.fetch(1).unwrap();
        assert_eq!(pool.access_count(), 2);

        pool.flush_all().unwrap();
        assert_eq!(pool.access_count(), 4);
    }

    #[test]
    fn test_flush_dirty_skips_clean_slots() {
        let (_temp_dir, mut pool) = setup_test_env(4);

        pool.fetch(0).unwrap();
        let slot = pool.fetch(1).unwrap();
        pool.page_mut(slot).unwrap().set(4, 4);

        pool.flush_dirty().unwrap();
        assert_eq!(pool.access_count(), 3);
    }

    #[test]
    fn test_uniqueness_under_churn() {
        let (_temp_dir, mut pool) = setup_test_env(10);

        let pattern = [0, 1, 2, 0, 3, 4, 1, 1, 5, 9, 0, 2, 8, 8, 7, 6, 0];
        for (tick, &page_id) in pattern.iter().enumerate() {
            let slot = pool.fetch(page_id).unwrap();
            pool.touch(slot, tick as u64 + 1);
            assert_eq!(pool.page(slot).unwrap().number(), page_id);
            assert_unique(&pool);
        }
    }
}
