//! Error types for the buffer pool.

use thiserror::Error;

use crate::common::PageKey;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the buffer pool can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Open/read/write against a table file or the spill file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was needed but every materialized page is pinned.
    #[error("buffer pool exhausted: all {pool_size} frames are pinned")]
    PoolExhausted { pool_size: usize },

    /// The page behind a handle no longer exists.
    #[error("handle refers to a destroyed page: {0}")]
    InvalidHandle(PageKey),

    /// A live guard on the page conflicts with the requested access.
    #[error("page {0} is borrowed by a live guard")]
    PageBusy(PageKey),

    /// `page_num * page_size` does not fit a file offset.
    #[error("page {page_num} with page size {page_size} is beyond the addressable file range")]
    OffsetOverflow { page_num: u64, page_size: usize },

    /// Rejected construction parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PoolExhausted { pool_size: 4 };
        assert_eq!(
            format!("{}", err),
            "buffer pool exhausted: all 4 frames are pinned"
        );

        let err = Error::PageBusy(PageKey::table("T", 3));
        assert_eq!(format!("{}", err), "page T[3] is borrowed by a live guard");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
