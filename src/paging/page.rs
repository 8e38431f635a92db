use super::bitmap;
use super::{BITMAP_SIZE, PAGE_DATA_SIZE, PAGE_SIZE, PageId};

/// One page held in memory
#[derive(Debug, Clone)]
pub struct Page {
    number: PageId,
    data: [i32; PAGE_DATA_SIZE],
    bitmap: [u8; BITMAP_SIZE],
    /// Logical clock value of the last access (0 = untouched since load)
    last_touch: u64,
    dirty: bool,
}

impl Page {
    /// Create a zero-filled page
    pub fn new(number: PageId) -> Self {
        Self {
            number,
            data: [0; PAGE_DATA_SIZE],
            bitmap: [0; BITMAP_SIZE],
            last_touch: 0,
            dirty: false,
        }
    }

    /// Build a page from a record read off disk, without checking it
    fn from_parts(
        number: PageId,
        bitmap: [u8; BITMAP_SIZE],
        data: [i32; PAGE_DATA_SIZE],
    ) -> Self {
        Self {
            number,
            data,
            bitmap,
            last_touch: 0,
            dirty: false,
        }
    }

    pub fn number(&self) -> PageId {
        self.number
    }

    pub fn data(&self) -> &[i32; PAGE_DATA_SIZE] {
        &self.data
    }

    pub fn bitmap(&self) -> &[u8; BITMAP_SIZE] {
        &self.bitmap
    }

    pub fn last_touch(&self) -> u64 {
        self.last_touch
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read one element
    pub fn get(&self, offset: usize) -> i32 {
        self.data[offset]
    }

    /// Write one element and mark the page dirty
    /// The bitmap is stale until the next `refresh_bitmap`
    pub fn set(&mut self, offset: usize, value: i32) {
        self.data[offset] = value;
        self.dirty = true;
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_touch = tick;
    }

    /// Whether the stored bitmap agrees with the data
    pub fn is_consistent(&self) -> bool {
        bitmap::validate(&self.data, &self.bitmap)
    }

    /// Recompute the bitmap from the current data
    pub fn refresh_bitmap(&mut self) {
        self.bitmap = bitmap::encode(&self.data);
    }

    pub(super) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize as an on-disk record: bitmap, then data as little-endian i32s
    pub fn to_record(&self) -> [u8; PAGE_SIZE] {
        let mut record = [0u8; PAGE_SIZE];
        record[..BITMAP_SIZE].copy_from_slice(&self.bitmap);
        for (chunk, value) in record[BITMAP_SIZE..]
            .chunks_exact_mut(size_of::<i32>())
            .zip(self.data.iter())
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        record
    }

    /// Deserialize an on-disk record
    pub fn from_record(number: PageId, record: &[u8; PAGE_SIZE]) -> Self {
        let mut bitmap = [0u8; BITMAP_SIZE];
        bitmap.copy_from_slice(&record[..BITMAP_SIZE]);

        let mut data = [0i32; PAGE_DATA_SIZE];
        for (value, chunk) in data
            .iter_mut()
            .zip(record[BITMAP_SIZE..].chunks_exact(size_of::<i32>()))
        {
            *value = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Self::from_parts(number, bitmap, data)
    }
}
