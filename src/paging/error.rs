use std::io;
use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum PagingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file: {path} (signature {found:#06x})")]
    InvalidStore { path: String, found: u16 },

    #[error("Corrupt page: page_id={0} (bitmap does not match data)")]
    CorruptPage(PageId),

    #[error("Page not found: page_id={0}")]
    PageNotFound(PageId),
}

pub type PagingResult<T> = Result<T, PagingError>;
