//! Page handles and RAII byte guards.
//!
//! - [`PageHandle`] - Reference-counted access to one page
//! - [`PageReadGuard`] - Shared view of the page bytes
//! - [`PageWriteGuard`] - Exclusive view; marks the page dirty on drop
//!
//! A guard pins its page while it lives, so the slice it hands out cannot be
//! evicted or reloaded underneath it.

use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::error;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::page_table::PageRef;
use crate::buffer::BufferManager;
use crate::common::{Error, FrameId, PageKey, Result};

/// Client handle to a page.
///
/// Handles are cheap to clone; all clones refer to the same page record, so
/// a page is materialized at most once no matter how many handles exist.
/// The record lives until the last handle is dropped (or closed), at which
/// point a frame it still holds is written back if dirty and freed.
///
/// A handle obtained from `get_pinned_page*` holds a pin. Clones of it hold
/// one too. The page is pinned while any handle holds a pin, or until
/// [`BufferManager::unpin`] clears all of them.
///
/// # Example
/// ```no_run
/// # use pagepool::{BufferConfig, BufferManager};
/// let bm = BufferManager::new(BufferConfig::new(64, 4, "spill.tmp"))?;
/// let handle = bm.get_anonymous_page();
///
/// handle.get_bytes_mut()?.fill(b'x');
/// assert_eq!(handle.get_bytes()?[0], b'x');
/// # Ok::<(), pagepool::Error>(())
/// ```
pub struct PageHandle<'a> {
    /// Reference back to the manager for materialize and release.
    bm: &'a BufferManager,
    page_ref: PageRef,
    key: PageKey,
    /// Epoch of the pin this handle holds, if any.
    pin: Cell<Option<u64>>,
    /// Set by `close`, so that `drop` does not release twice.
    released: Cell<bool>,
}

impl<'a> PageHandle<'a> {
    /// Called by the `BufferManager::get_*` methods after registering the
    /// handle with the page.
    pub(crate) fn new(
        bm: &'a BufferManager,
        page_ref: PageRef,
        key: PageKey,
        pin: Option<u64>,
    ) -> Self {
        Self {
            bm,
            page_ref,
            key,
            pin: Cell::new(pin),
            released: Cell::new(false),
        }
    }

    /// Identity of the page.
    #[inline]
    pub fn key(&self) -> &PageKey {
        &self.key
    }

    /// Borrow the page bytes for reading.
    ///
    /// Loads the page into a frame first if needed, possibly evicting the
    /// least recently used unpinned page.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if no frame can be freed
    /// - `Error::Io` if the victim's write-back or the load fails
    /// - `Error::PageBusy` if a `PageWriteGuard` on this page is alive
    pub fn get_bytes(&self) -> Result<PageReadGuard<'_>> {
        let frame_id = self.bm.begin_borrow(self)?;

        match self.bm.frame(frame_id).try_read() {
            Some(lock) => Ok(PageReadGuard {
                handle: self,
                frame_id,
                lock,
            }),
            None => {
                self.bm.end_borrow(self.page_ref, false);
                Err(Error::PageBusy(self.key.clone()))
            }
        }
    }

    /// Borrow the page bytes for writing.
    ///
    /// Same as [`get_bytes`](Self::get_bytes), but exclusive. The page is
    /// marked dirty when the guard drops.
    ///
    /// # Errors
    /// As `get_bytes`; `Error::PageBusy` if any other guard on this page is
    /// alive.
    pub fn get_bytes_mut(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.bm.begin_borrow(self)?;

        match self.bm.frame(frame_id).try_write() {
            Some(lock) => Ok(PageWriteGuard {
                handle: self,
                frame_id,
                lock,
            }),
            None => {
                self.bm.end_borrow(self.page_ref, false);
                Err(Error::PageBusy(self.key.clone()))
            }
        }
    }

    /// Mark the page dirty. No I/O happens until it is written back.
    pub fn wrote_bytes(&self) {
        if let Err(e) = self.bm.mark_dirty(self) {
            error!("wrote_bytes on {}: {}", self.key, e);
        }
    }

    /// Unpin the page. Shorthand for [`BufferManager::unpin`].
    pub fn unpin(&self) {
        self.bm.unpin(self);
    }

    /// Whether this handle holds one of the page's pins.
    pub fn holds_pin(&self) -> bool {
        match self.pin.get() {
            Some(epoch) => self
                .bm
                .inspect(self.page_ref, |page| page.pin_is_live(epoch))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Whether any handle holds a pin on the page.
    pub fn is_pinned(&self) -> bool {
        self.bm
            .inspect(self.page_ref, |page| page.is_pinned())
            .unwrap_or(false)
    }

    /// Whether the page occupies a frame.
    pub fn is_materialized(&self) -> bool {
        self.frame_id().is_some()
    }

    /// Whether the page has writes that are not on disk yet.
    pub fn is_dirty(&self) -> bool {
        self.bm
            .inspect(self.page_ref, |page| page.is_dirty())
            .unwrap_or(false)
    }

    /// Frame the page currently occupies.
    pub fn frame_id(&self) -> Option<FrameId> {
        self.bm.inspect(self.page_ref, |page| page.frame()).flatten()
    }

    /// Release the handle now, reporting a failed write-back.
    ///
    /// Dropping a handle runs the same release but can only log failures.
    pub fn close(self) -> Result<()> {
        self.released.set(true);
        self.bm.release(&self)
    }

    #[inline]
    pub(crate) fn page_ref(&self) -> PageRef {
        self.page_ref
    }

    #[inline]
    pub(crate) fn manager(&self) -> &'a BufferManager {
        self.bm
    }

    /// Give up this handle's pin. Returns the epoch it was taken in.
    #[inline]
    pub(crate) fn take_pin(&self) -> Option<u64> {
        self.pin.take()
    }
}

impl Clone for PageHandle<'_> {
    fn clone(&self) -> Self {
        let pin = self.bm.retain(self.page_ref, self.pin.get());
        Self::new(self.bm, self.page_ref, self.key.clone(), pin)
    }
}

impl Drop for PageHandle<'_> {
    fn drop(&mut self) {
        if self.released.get() {
            return;
        }
        if let Err(e) = self.bm.release(self) {
            error!("releasing {}: {}", self.key, e);
        }
    }
}

impl fmt::Debug for PageHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("key", &self.key)
            .field("holds_pin", &self.pin.get().is_some())
            .finish()
    }
}

/// Guard for read-only access to a page's bytes.
///
/// Several read guards on one page may coexist.
pub struct PageReadGuard<'h> {
    handle: &'h PageHandle<'h>,
    frame_id: FrameId,
    lock: RwLockReadGuard<'h, Box<[u8]>>,
}

impl PageReadGuard<'_> {
    /// Frame holding the bytes.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.handle.bm.end_borrow(self.handle.page_ref, false);
    }
}

/// Guard for exclusive access to a page's bytes.
///
/// The page is marked dirty when the guard drops.
pub struct PageWriteGuard<'h> {
    handle: &'h PageHandle<'h>,
    frame_id: FrameId,
    lock: RwLockWriteGuard<'h, Box<[u8]>>,
}

impl PageWriteGuard<'_> {
    /// Frame holding the bytes.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.handle.bm.end_borrow(self.handle.page_ref, true);
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::FileTable;
    use crate::common::BufferConfig;
    use crate::{BufferManager, Error};
    use tempfile::{tempdir, TempDir};

    fn create_test_bm(num_pages: usize) -> (BufferManager, TempDir) {
        let dir = tempdir().unwrap();
        let config = BufferConfig::new(16, num_pages, dir.path().join("spill")).with_sync_writes(false);
        (BufferManager::new(config).unwrap(), dir)
    }

    #[test]
    fn test_guard_len_is_page_size() {
        let (bm, _dir) = create_test_bm(2);
        let handle = bm.get_anonymous_page();

        assert_eq!(handle.get_bytes().unwrap().len(), 16);
        assert_eq!(handle.get_bytes_mut().unwrap().len(), 16);
    }

    #[test]
    fn test_read_guard_does_not_dirty() {
        let (bm, _dir) = create_test_bm(2);
        let handle = bm.get_anonymous_page();

        drop(handle.get_bytes().unwrap());
        assert!(!handle.is_dirty());

        drop(handle.get_bytes_mut().unwrap());
        assert!(handle.is_dirty());
    }

    #[test]
    fn test_wrote_bytes_marks_dirty_without_io() {
        let (bm, _dir) = create_test_bm(2);
        let handle = bm.get_anonymous_page();

        handle.wrote_bytes();
        assert!(handle.is_dirty());
        assert!(!handle.is_materialized());
    }

    #[test]
    fn test_holds_pin() {
        let (bm, _dir) = create_test_bm(2);

        let pinned = bm.get_pinned_anonymous_page().unwrap();
        assert!(pinned.holds_pin());
        assert!(pinned.clone().holds_pin());

        pinned.unpin();
        assert!(!pinned.holds_pin());
        assert!(!pinned.is_pinned());
        assert!(!pinned.clone().holds_pin());
    }

    #[test]
    fn test_close_releases_page() {
        let (bm, dir) = create_test_bm(2);
        let table = FileTable::new("T", dir.path().join("t.dat"));

        let handle = bm.get_page(&table, 0);
        handle.get_bytes_mut().unwrap()[0] = 9;
        handle.close().unwrap();

        assert_eq!(bm.live_page_count(), 0);
        assert_eq!(bm.free_frame_count(), 2);
        assert_eq!(std::fs::read(dir.path().join("t.dat")).unwrap()[0], 9);
    }

    #[test]
    fn test_load_failure_leaves_page_unmaterialized() {
        let (bm, dir) = create_test_bm(2);
        // A directory cannot be opened as a table file.
        let table = FileTable::new("T", dir.path());

        let handle = bm.get_page(&table, 0);
        assert!(matches!(handle.get_bytes(), Err(Error::Io(_))));
        assert!(!handle.is_materialized());
        assert_eq!(bm.free_frame_count(), 2);
        assert!(bm.check_invariants().is_ok());

        // Nothing resident, so closing has nothing to write back.
        handle.close().unwrap();
        assert_eq!(bm.live_page_count(), 0);
    }

    #[test]
    fn test_debug_format() {
        let (bm, _dir) = create_test_bm(2);
        let handle = bm.get_anonymous_page();
        let debug = format!("{:?}", handle);
        assert!(debug.contains("Anonymous"));
        assert!(debug.contains("holds_pin: false"));
    }
}
