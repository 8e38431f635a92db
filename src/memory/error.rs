use crate::paging::PagingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("Paging error: {0}")]
    Paging(#[from] PagingError),

    #[error("Index out of range: index={index}, size={size}")]
    IndexOutOfRange { index: i64, size: u64 },

    #[error("Logical size {0} needs more pages than this platform can address")]
    SizeTooLarge(u64),
}

impl VmError {
    /// Whether the session can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VmError::IndexOutOfRange { .. })
    }
}

pub type VmResult<T> = Result<T, VmError>;
