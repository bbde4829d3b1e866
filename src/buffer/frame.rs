//! Frame - a fixed-size slot in the buffer pool.
//!
//! A [`Frame`] owns `page_size` bytes. Which page occupies it, whether that
//! page is dirty or pinned, all lives in the page record; the frame itself is
//! only memory plus the lock that hands it out.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One slot of the frame pool.
///
/// The pool allocates all of its frames up front and never resizes. Bytes
/// are behind an `RwLock` so that a byte guard can be held without keeping
/// the pool's bookkeeping locked.
pub struct Frame {
    data: RwLock<Box<[u8]>>,
}

impl Frame {
    /// Create a zeroed frame of `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            data: RwLock::new(vec![0u8; page_size].into_boxed_slice()),
        }
    }

    /// Allocate `num_pages` frames of `page_size` bytes each.
    pub fn pool(page_size: usize, num_pages: usize) -> Vec<Frame> {
        (0..num_pages).map(|_| Frame::new(page_size)).collect()
    }

    /// Acquire read lock on the bytes.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Acquire write lock on the bytes.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Read lock, unless a writer holds the frame.
    #[inline]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, Box<[u8]>>> {
        self.data.try_read()
    }

    /// Write lock, unless anyone else holds the frame.
    #[inline]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, Box<[u8]>>> {
        self.data.try_write()
    }
}
