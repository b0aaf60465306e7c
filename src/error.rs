//! Error types for the page-oriented storage subsystem.

use thiserror::Error;

use crate::storage_manager::PageNumber;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes for the storage manager and buffer manager (spec §6.2).
#[derive(Debug, Error)]
pub enum Error {
    /// The page file does not exist on disk.
    #[error("page file not found: {0}")]
    FileNotFound(String),

    /// A read targeted a page number the page file does not (yet) contain
    /// and the caller asked for a strict read rather than a growing load.
    #[error("page {0} does not exist in the page file")]
    ReadNonExistingPage(PageNumber),

    /// A block write to the page file failed.
    #[error("write to page file failed: {0}")]
    WriteFailed(String),

    /// An operation was attempted on a pool that was never initialised, or
    /// was already torn down by `shutdown`.
    #[error("buffer pool is not initialised")]
    PoolNotInitialised,

    /// `unpin` was called on a page whose fix count is already zero.
    #[error("page {0} is not pinned")]
    PageNotPinned(PageNumber),

    /// `forcePage` was called on a page that is not dirty.
    #[error("page {0} is not dirty")]
    PageNotDirty(PageNumber),

    /// An operation addressed a page that is not currently resident in any
    /// frame.
    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageNumber),

    /// Every frame is pinned; no victim is available for eviction.
    #[error("buffer pool is full: no frame is evictable")]
    PoolFull,

    /// The request itself is malformed (negative page number, zero frames
    /// requested, etc).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The underlying page file I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
