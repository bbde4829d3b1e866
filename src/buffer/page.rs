//! Page - identity and state of one logical page.
//!
//! A [`Page`] record exists while at least one
//! [`PageHandle`](crate::PageHandle) refers to it. It occupies at most one
//! frame at a time and knows where its bytes live when they are not in one.

use std::path::PathBuf;

use crate::common::{FrameId, PageKey, Result};
use crate::storage::{SpillFile, TableFile};

/// Where a page's bytes live outside the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Backing {
    /// Page `page_num` of the table file at `path`.
    Table { path: PathBuf, page_num: u64 },

    /// Spill slot, reserved the first time the page is written back.
    Anonymous { spill_offset: Option<u64> },
}

/// State record for one page.
///
/// # Pinning
/// Two kinds of pin keep a materialized page out of the replacer:
/// - `pin_holders`: live handles obtained through `get_pinned_page` (or
///   cloned from one) that have not been unpinned.
/// - `borrows`: live byte guards. A guard pins its page for as long as the
///   slice it hands out is in use.
///
/// An explicit unpin drops every pin at once and starts a new `pin_epoch`.
/// A handle remembers the epoch it pinned in, so a pin that was already
/// cleared is not released a second time when the handle goes away.
///
/// The page is an eviction candidate iff it holds a frame and both counts are
/// zero.
#[derive(Debug)]
pub(crate) struct Page {
    key: PageKey,
    backing: Backing,
    dirty: bool,
    pin_holders: u32,
    pin_epoch: u64,
    borrows: u32,
    /// Outstanding handles. The record is destroyed when this reaches zero.
    handles: u32,
    frame: Option<FrameId>,
}

impl Page {
    /// A table-backed page, not yet materialized.
    pub(crate) fn table(key: PageKey, path: PathBuf, page_num: u64) -> Self {
        Self::with_backing(key, Backing::Table { path, page_num })
    }

    /// An anonymous page, not yet materialized.
    pub(crate) fn anonymous(id: u64) -> Self {
        Self::with_backing(
            PageKey::Anonymous(id),
            Backing::Anonymous { spill_offset: None },
        )
    }

    fn with_backing(key: PageKey, backing: Backing) -> Self {
        Self {
            key,
            backing,
            dirty: false,
            pin_holders: 0,
            pin_epoch: 0,
            borrows: 0,
            handles: 0,
            frame: None,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &PageKey {
        &self.key
    }

    #[inline]
    pub(crate) fn is_anonymous(&self) -> bool {
        matches!(self.backing, Backing::Anonymous { .. })
    }

    pub(crate) fn spill_offset(&self) -> Option<u64> {
        match self.backing {
            Backing::Anonymous { spill_offset } => spill_offset,
            Backing::Table { .. } => None,
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    #[inline]
    pub(crate) fn is_materialized(&self) -> bool {
        self.frame.is_some()
    }

    #[inline]
    pub(crate) fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    pub(crate) fn attach(&mut self, frame_id: FrameId) {
        debug_assert!(self.frame.is_none(), "page {} already has a frame", self.key);
        self.frame = Some(frame_id);
    }

    pub(crate) fn detach(&mut self) -> Option<FrameId> {
        self.frame.take()
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // ========================================================================
    // Pins, borrows and handles
    // ========================================================================

    #[inline]
    pub(crate) fn is_pinned(&self) -> bool {
        self.pin_holders > 0
    }

    /// Add a pin. Returns the epoch the pin belongs to.
    pub(crate) fn pin(&mut self) -> u64 {
        self.pin_holders += 1;
        self.pin_epoch
    }

    /// Whether a pin taken in `epoch` is still held.
    #[inline]
    pub(crate) fn pin_is_live(&self, epoch: u64) -> bool {
        epoch == self.pin_epoch && self.pin_holders > 0
    }

    /// Drop one pin taken in `epoch`. Returns true if this made the page
    /// unpinned. A pin from an earlier epoch was already cleared and is
    /// ignored.
    pub(crate) fn unpin(&mut self, epoch: u64) -> bool {
        if epoch != self.pin_epoch {
            return false;
        }
        assert!(self.pin_holders > 0, "pin count underflow on {}", self.key);
        self.pin_holders -= 1;
        self.pin_holders == 0
    }

    /// Drop every pin. Returns whether the page was pinned.
    pub(crate) fn unpin_all(&mut self) -> bool {
        let was_pinned = self.is_pinned();
        self.pin_holders = 0;
        self.pin_epoch += 1;
        was_pinned
    }

    #[inline]
    pub(crate) fn is_borrowed(&self) -> bool {
        self.borrows > 0
    }

    pub(crate) fn borrow(&mut self) {
        self.borrows += 1;
    }

    pub(crate) fn end_borrow(&mut self) {
        assert!(self.borrows > 0, "borrow count underflow on {}", self.key);
        self.borrows -= 1;
    }

    pub(crate) fn retain(&mut self) {
        self.handles += 1;
    }

    /// Drop one handle. Returns the number still outstanding.
    pub(crate) fn release(&mut self) -> u32 {
        assert!(self.handles > 0, "handle count underflow on {}", self.key);
        self.handles -= 1;
        self.handles
    }

    /// Whether the page belongs in the replacer.
    #[inline]
    pub(crate) fn is_evictable(&self) -> bool {
        self.is_materialized() && !self.is_pinned() && !self.is_borrowed()
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// Fill `buf` with the page's stored content.
    ///
    /// Returns true if the bytes came from storage, false if the page was
    /// zero-filled because it has never been spilled.
    pub(crate) fn load_into(&self, buf: &mut [u8], spill: &mut SpillFile) -> Result<bool> {
        match &self.backing {
            Backing::Table { path, page_num } => {
                TableFile::open(path, buf.len())?.read_page(*page_num, buf)?;
                Ok(true)
            }
            Backing::Anonymous {
                spill_offset: Some(offset),
            } => {
                spill.read_slot(*offset, buf)?;
                Ok(true)
            }
            Backing::Anonymous { spill_offset: None } => {
                buf.fill(0);
                Ok(false)
            }
        }
    }

    /// Write `data` back if the page is dirty, then clear the dirty flag.
    ///
    /// Anonymous pages reserve their spill slot on the first write-back.
    /// Returns true if anything was written.
    pub(crate) fn write_back(
        &mut self,
        data: &[u8],
        spill: &mut SpillFile,
        sync: bool,
    ) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        match &mut self.backing {
            Backing::Table { path, page_num } => {
                TableFile::open(path, data.len())?.write_page(*page_num, data, sync)?;
            }
            Backing::Anonymous { spill_offset } => {
                let offset = *spill_offset.get_or_insert_with(|| spill.reserve());
                spill.write_slot(offset, data, sync)?;
            }
        }

        self.dirty = false;
        Ok(true)
    }
}
