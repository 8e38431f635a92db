use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::{PagingError, PagingResult};
use super::page::Page;
use super::{HEADER_SIZE, PAGE_SIZE, PageId, SIGNATURE};

/// The backing file: a signature followed by fixed-size page records
///
/// ```text
/// offset 0            : signature (2 bytes, little-endian)
/// offset 2            : zero padding up to PAGE_SIZE
/// offset 2 + k * 512  : page k = bitmap (16 bytes) ++ data (124 x i32 LE)
/// ```
///
/// Page 0 overlaps the padding, so the header region only reserves the
/// signature bytes. Every read and write goes straight to the file.
#[derive(Debug)]
pub struct BackingStore {
    file: File,
    path: PathBuf,
    page_count: usize,
}

impl BackingStore {
    /// Open the store at `path`, creating and zero-filling it if it does not exist
    pub fn open<P: AsRef<Path>>(path: P, page_count: usize) -> PagingResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open_existing(path, page_count)
        } else {
            Self::create(path, page_count)
        }
    }

    /// File offset of a page record
    pub fn page_offset(page_id: PageId) -> u64 {
        HEADER_SIZE as u64 + page_id as u64 * PAGE_SIZE as u64
    }

    fn create(path: &Path, page_count: usize) -> PagingResult<Self> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut store = Self {
            file,
            path: path.to_path_buf(),
            page_count,
        };

        let mut header = [0u8; PAGE_SIZE];
        header[..HEADER_SIZE].copy_from_slice(&SIGNATURE.to_le_bytes());
        store.file.seek(SeekFrom::Start(0))?;
        store.file.write_all(&header)?;

        for page_id in 0..page_count {
            store.write_page(&Page::new(page_id))?;
        }

        info!(path = %path.display(), page_count, "created backing store");
        Ok(store)
    }

    fn open_existing(path: &Path, page_count: usize) -> PagingResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        let mut signature = [0u8; HEADER_SIZE];
        if len >= HEADER_SIZE as u64 {
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut signature)?;
        }

        let found = u16::from_le_bytes(signature);
        if len < HEADER_SIZE as u64 || found != SIGNATURE {
            warn!(path = %path.display(), found, "signature mismatch");
            return Err(PagingError::InvalidStore {
                path: path.display().to_string(),
                found,
            });
        }

        // Zero pages are valid, so a short store can simply be extended
        let required = Self::page_offset(page_count).max(PAGE_SIZE as u64);
        if len < required {
            debug!(from = len, to = required, "extending backing store");
            file.set_len(required)?;
        }

        info!(path = %path.display(), page_count, "opened backing store");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count,
        })
    }

    /// Read the record of a page
    pub fn read_page(&mut self, page_id: PageId) -> PagingResult<Page> {
        self.check_page(page_id)?;

        let mut record = [0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        self.file.read_exact(&mut record)?;

        Ok(Page::from_record(page_id, &record))
    }

    /// Write a page's bitmap and data at its record offset
    pub fn write_page(&mut self, page: &Page) -> PagingResult<()> {
        self.check_page(page.number())?;

        self.file
            .seek(SeekFrom::Start(Self::page_offset(page.number())))?;
        self.file.write_all(&page.to_record())?;
        Ok(())
    }

    fn check_page(&self, page_id: PageId) -> PagingResult<()> {
        if page_id >= self.page_count {
            return Err(PagingError::PageNotFound(page_id));
        }
        Ok(())
    }

    /// Sync the file to disk
    pub fn sync(&mut self) -> PagingResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
