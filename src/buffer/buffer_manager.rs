//! Buffer Manager - multiplexes a fixed set of frames over many pages.
//!
//! The [`BufferManager`] provides:
//! - Lazy lookup of table-backed and anonymous pages
//! - Eager materialization of pinned pages
//! - LRU eviction over unpinned, materialized pages
//! - Write-back of dirty pages on eviction, on page destruction and on shutdown

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

use crate::buffer::page::Page;
use crate::buffer::page_table::{PageRef, PageTable};
use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageHandle};
use crate::catalog::Table;
use crate::common::{BufferConfig, Error, FrameId, PageKey, Result};
use crate::storage::SpillFile;

/// Bookkeeping guarded by the manager's single mutex.
///
/// Eviction reads and mutates all of these at once, so they are never
/// locked separately.
struct PoolState {
    /// Live page records and the key lookup.
    pages: PageTable,

    /// Frames no page occupies.
    free_list: Vec<FrameId>,

    /// Materialized pages with no pin and no live byte guard.
    replacer: LruReplacer<PageRef>,

    /// Backing store for anonymous pages.
    spill: SpillFile,

    /// Id handed to the next anonymous page.
    next_anonymous: u64,
}

/// Manages a pool of frames for table-backed and anonymous pages.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                        BufferManager                         │
/// │  ┌───────────────┐   ┌──────────────────────────────────┐    │
/// │  │  PageTable    │   │       frames: Vec<Frame>         │    │
/// │  │ key → record  │──▶│  [Frame0] [Frame1] [Frame2] ...  │    │
/// │  └───────────────┘   └──────────────────────────────────┘    │
/// │  ┌───────────────┐   ┌───────────────┐   ┌──────────────┐    │
/// │  │  free_list    │   │   replacer    │   │  SpillFile   │    │
/// │  │ Vec<FrameId>  │   │  LruReplacer  │   │ anon pages   │    │
/// │  └───────────────┘   └───────────────┘   └──────────────┘    │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Page lifecycle
/// ```text
/// Unmaterialized ──▶ Materialized & Pinned ⇄ Materialized & Unpinned (in LRU)
///        ▲                                              │
///        └────────────── evicted (flushed) ◀────────────┘
/// ```
/// A page record is destroyed when its last [`PageHandle`] goes away; a
/// frame it still holds is flushed and returned to the free list.
///
/// # Thread Safety
/// - `state`: one `Mutex` over page table, free list, replacer and spill file
/// - `frames`: no outer lock, each `Frame` has its own `RwLock`
/// - `stats`: atomic counters
///
/// The pool is designed for one logical thread of control. The locks make
/// `BufferManager: Sync` sound; they do not make concurrent use fast.
///
/// # Usage
/// ```no_run
/// use pagepool::{BufferConfig, BufferManager};
/// use pagepool::catalog::FileTable;
///
/// let bm = BufferManager::new(BufferConfig::new(4096, 64, "spill.tmp"))?;
/// let table = FileTable::new("orders", "orders.dat");
///
/// let handle = bm.get_page(&table, 3);
/// {
///     let mut bytes = handle.get_bytes_mut()?;
///     bytes[0] = 0xAB;
/// } // guard drops: page marked dirty
/// # Ok::<(), pagepool::Error>(())
/// ```
pub struct BufferManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    stats: BufferPoolStats,

    page_size: usize,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,

    sync_writes: bool,
}

impl BufferManager {
    /// Create a buffer manager.
    ///
    /// Allocates all frames and creates (truncating) the spill file.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if the configuration does not validate
    /// - `Error::Io` if the spill file cannot be created
    pub fn new(config: BufferConfig) -> Result<Self> {
        config.validate()?;

        let spill = SpillFile::create(&config.temp_file, config.page_size)?;
        let frames = Frame::pool(config.page_size, config.num_pages);
        let free_list: Vec<FrameId> = (0..config.num_pages).map(FrameId::new).collect();

        info!(
            "buffer manager: {} frames of {} bytes, spill file {}",
            config.num_pages,
            config.page_size,
            config.temp_file.display()
        );

        Ok(Self {
            frames,
            state: Mutex::new(PoolState {
                pages: PageTable::new(),
                free_list,
                replacer: LruReplacer::new(),
                spill,
                next_anonymous: 0,
            }),
            stats: BufferPoolStats::new(),
            page_size: config.page_size,
            pool_size: config.num_pages,
            sync_writes: config.sync_writes,
        })
    }

    // ========================================================================
    // Public API: Get pages
    // ========================================================================

    /// Get a handle to page `page_num` of `table`.
    ///
    /// Returns a handle to the existing page if one is alive, otherwise
    /// creates an unpinned, unmaterialized page. No I/O happens here; the
    /// first byte access loads the page.
    pub fn get_page<T: Table + ?Sized>(&self, table: &T, page_num: u64) -> PageHandle<'_> {
        let (page_ref, key, _) = self.open_table_page(table, page_num, false);
        PageHandle::new(self, page_ref, key, None)
    }

    /// Get a handle to a fresh anonymous page.
    ///
    /// Every call creates a new page. Its content starts zeroed and lives in
    /// the spill file whenever it is evicted while dirty.
    pub fn get_anonymous_page(&self) -> PageHandle<'_> {
        let (page_ref, key, _) = self.open_anonymous_page(false);
        PageHandle::new(self, page_ref, key, None)
    }

    /// Get a pinned handle to page `page_num` of `table`.
    ///
    /// Same lookup as [`get_page`](Self::get_page), but the page is pinned
    /// and loaded into a frame before returning. It stays out of eviction
    /// until every pinning handle is released, or until [`unpin`](Self::unpin).
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::Io` if the victim's write-back or the page load fails
    pub fn get_pinned_page<T: Table + ?Sized>(
        &self,
        table: &T,
        page_num: u64,
    ) -> Result<PageHandle<'_>> {
        let (page_ref, key, pin) = self.open_table_page(table, page_num, true);
        let handle = PageHandle::new(self, page_ref, key, pin);

        self.materialize(&handle)?;
        Ok(handle)
    }

    /// Get a pinned handle to a fresh anonymous page.
    ///
    /// # Errors
    /// Same as [`get_pinned_page`](Self::get_pinned_page).
    pub fn get_pinned_anonymous_page(&self) -> Result<PageHandle<'_>> {
        let (page_ref, key, pin) = self.open_anonymous_page(true);
        let handle = PageHandle::new(self, page_ref, key, pin);

        self.materialize(&handle)?;
        Ok(handle)
    }

    /// Unpin the page behind `handle`.
    ///
    /// Clears every pin on the page, whichever handles took them, and puts
    /// the page back in the replacer as most recently used. Handles that
    /// pinned it no longer hold a pin. Any handle to the page may be used.
    pub fn unpin(&self, handle: &PageHandle<'_>) {
        if !std::ptr::eq(handle.manager(), self) {
            warn!("unpin of {} through a foreign buffer manager", handle.key());
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let page_ref = handle.page_ref();

        handle.take_pin();
        let Some(page) = state.pages.get_mut(page_ref) else {
            return;
        };

        if !page.unpin_all() {
            debug!("unpin of {}: page is not pinned", handle.key());
            return;
        }
        if page.is_evictable() {
            state.replacer.touch(page_ref);
        }
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Write back every dirty materialized page, keeping it resident.
    ///
    /// A page that cannot be flushed does not stop the others; the first
    /// error is returned once every page has been tried.
    ///
    /// # Errors
    /// - `Error::PageBusy` if a dirty page is held by a live write guard
    /// - `Error::Io` on a failed write
    pub fn flush_all(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let PoolState { pages, spill, .. } = &mut *guard;

        let dirty: Vec<PageRef> = pages
            .iter()
            .filter(|(_, page)| page.is_materialized() && page.is_dirty())
            .map(|(page_ref, _)| page_ref)
            .collect();

        let mut first_error = None;
        for page_ref in dirty {
            let Some(page) = pages.get_mut(page_ref) else {
                continue;
            };
            let Some(frame_id) = page.frame() else {
                continue;
            };
            let flushed = match self.frames[frame_id.0].try_read() {
                Some(data) => self.write_back(page, &data[..], spill),
                None => Err(Error::PageBusy(page.key().clone())),
            };
            if let Err(e) = flushed {
                warn!("flush of {} failed: {}", page.key(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Bytes per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Frames no page occupies.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Pages currently occupying a frame.
    pub fn materialized_count(&self) -> usize {
        let state = self.state.lock();
        state
            .pages
            .iter()
            .filter(|(_, page)| page.is_materialized())
            .count()
    }

    /// Pages the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.state.lock().replacer.len()
    }

    /// Page records kept alive by at least one handle.
    pub fn live_page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Spill slots reserved so far.
    pub fn spill_slots(&self) -> u64 {
        self.state.lock().spill.slots()
    }

    /// Verify the pool's structural invariants.
    ///
    /// - free frames + materialized pages == pool size
    /// - no frame is held twice, and no held frame is on the free list
    /// - a page is in the replacer iff it is materialized, unpinned and not
    ///   borrowed
    ///
    /// Meant for tests; walks every live page.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let state = self.state.lock();

        let mut owner: Vec<Option<String>> = vec![None; self.pool_size];
        for frame_id in &state.free_list {
            owner[frame_id.0] = Some("the free list".to_string());
        }

        let mut materialized = 0;
        for (page_ref, page) in state.pages.iter() {
            if let Some(frame_id) = page.frame() {
                materialized += 1;
                if let Some(other) = &owner[frame_id.0] {
                    return Err(format!("{} shares {} with {}", page.key(), frame_id, other));
                }
                owner[frame_id.0] = Some(page.key().to_string());
            }
            if page.is_evictable() != state.replacer.contains(&page_ref) {
                return Err(format!(
                    "{}: evictable={} but in replacer={}",
                    page.key(),
                    page.is_evictable(),
                    state.replacer.contains(&page_ref)
                ));
            }
        }

        if state.free_list.len() + materialized != self.pool_size {
            return Err(format!(
                "{} free + {} materialized != {} frames",
                state.free_list.len(),
                materialized,
                self.pool_size
            ));
        }
        if state.replacer.len() > materialized {
            return Err("replacer holds pages that are gone".to_string());
        }
        Ok(())
    }

    // ========================================================================
    // Internal: Called by PageHandle and its guards
    // ========================================================================

    /// Make sure the handle's page occupies a frame.
    pub(crate) fn materialize(&self, handle: &PageHandle<'_>) -> Result<FrameId> {
        let mut guard = self.state.lock();
        self.materialize_locked(&mut guard, handle.page_ref(), handle.key())
    }

    /// Register one more handle on a page, cloned from a handle holding
    /// the pin `pin`. The new handle pins too if that pin is still live.
    pub(crate) fn retain(&self, page_ref: PageRef, pin: Option<u64>) -> Option<u64> {
        let mut guard = self.state.lock();
        let pinning = match (pin, guard.pages.get(page_ref)) {
            (Some(epoch), Some(page)) => page.pin_is_live(epoch),
            _ => false,
        };
        Self::retain_locked(&mut guard, page_ref, pinning)
    }

    /// Returns the epoch of the new pin when `pinning`.
    fn retain_locked(state: &mut PoolState, page_ref: PageRef, pinning: bool) -> Option<u64> {
        let Some(page) = state.pages.get_mut(page_ref) else {
            error!("retain of a destroyed page");
            return None;
        };

        page.retain();
        if !pinning {
            return None;
        }
        let epoch = page.pin();
        state.replacer.remove(&page_ref);
        Some(epoch)
    }

    /// Drop one handle: give up its pin, and destroy the page if it was the
    /// last handle.
    pub(crate) fn release(&self, handle: &PageHandle<'_>) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let page_ref = handle.page_ref();

        let page = state
            .pages
            .get_mut(page_ref)
            .ok_or_else(|| Error::InvalidHandle(handle.key().clone()))?;

        if let Some(epoch) = handle.take_pin() {
            if page.unpin(epoch) && page.is_evictable() {
                state.replacer.touch(page_ref);
            }
        }
        if page.release() > 0 {
            return Ok(());
        }

        self.destroy(state, page_ref)
    }

    pub(crate) fn mark_dirty(&self, handle: &PageHandle<'_>) -> Result<()> {
        let mut state = self.state.lock();
        let page = state
            .pages
            .get_mut(handle.page_ref())
            .ok_or_else(|| Error::InvalidHandle(handle.key().clone()))?;
        page.mark_dirty();
        Ok(())
    }

    /// Materialize the page and pin it for the lifetime of a byte guard.
    pub(crate) fn begin_borrow(&self, handle: &PageHandle<'_>) -> Result<FrameId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let page_ref = handle.page_ref();

        let frame_id = self.materialize_locked(state, page_ref, handle.key())?;
        if let Some(page) = state.pages.get_mut(page_ref) {
            page.borrow();
        }
        state.replacer.remove(&page_ref);
        Ok(frame_id)
    }

    /// Counterpart of `begin_borrow`, run when a byte guard drops.
    pub(crate) fn end_borrow(&self, page_ref: PageRef, dirty: bool) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(page) = state.pages.get_mut(page_ref) {
            page.end_borrow();
            if dirty {
                page.mark_dirty();
            }
            if page.is_evictable() {
                state.replacer.touch(page_ref);
            }
        }
    }

    /// Inspect the page behind a handle.
    pub(crate) fn inspect<R>(&self, page_ref: PageRef, f: impl FnOnce(&Page) -> R) -> Option<R> {
        self.state.lock().pages.get(page_ref).map(f)
    }

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    // ========================================================================
    // Internal: Lookup
    // ========================================================================

    fn open_table_page<T: Table + ?Sized>(
        &self,
        table: &T,
        page_num: u64,
        pin: bool,
    ) -> (PageRef, PageKey, Option<u64>) {
        let key = PageKey::table(table.name(), page_num);
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let page_ref = match state.pages.lookup(&key) {
            Some(page_ref) => {
                BufferPoolStats::bump(&self.stats.cache_hits);
                page_ref
            }
            None => {
                BufferPoolStats::bump(&self.stats.cache_misses);
                let page = Page::table(
                    key.clone(),
                    table.storage_location().to_path_buf(),
                    page_num,
                );
                let page_ref = state.pages.insert(page);
                state.pages.register(key.clone(), page_ref);
                page_ref
            }
        };

        let epoch = Self::retain_locked(state, page_ref, pin);
        (page_ref, key, epoch)
    }

    fn open_anonymous_page(&self, pin: bool) -> (PageRef, PageKey, Option<u64>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let id = state.next_anonymous;
        state.next_anonymous += 1;
        let page_ref = state.pages.insert(Page::anonymous(id));

        let epoch = Self::retain_locked(state, page_ref, pin);
        (page_ref, PageKey::Anonymous(id), epoch)
    }

    // ========================================================================
    // Internal: Materialization, eviction, write-back
    // ========================================================================

    /// Load a page into a frame unless it already has one.
    ///
    /// Either the page ends up fully loaded, or the frame goes back to the
    /// free list and the page stays unmaterialized.
    fn materialize_locked(
        &self,
        state: &mut PoolState,
        page_ref: PageRef,
        key: &PageKey,
    ) -> Result<FrameId> {
        let page = state
            .pages
            .get(page_ref)
            .ok_or_else(|| Error::InvalidHandle(key.clone()))?;

        if let Some(frame_id) = page.frame() {
            if page.is_evictable() {
                state.replacer.touch(page_ref);
            }
            return Ok(frame_id);
        }

        let frame_id = self.allocate_frame(state)?;

        let PoolState {
            pages,
            free_list,
            replacer,
            spill,
            ..
        } = state;

        let Some(page) = pages.get_mut(page_ref) else {
            free_list.push(frame_id);
            return Err(Error::InvalidHandle(key.clone()));
        };

        let loaded = {
            let mut data = self.frames[frame_id.0].write();
            page.load_into(&mut data[..], spill)
        };
        match loaded {
            Ok(true) => BufferPoolStats::bump(&self.stats.pages_read),
            Ok(false) => {}
            Err(e) => {
                free_list.push(frame_id);
                return Err(e);
            }
        }

        page.attach(frame_id);
        trace!("materialized {} into {}", page.key(), frame_id);

        if page.is_evictable() {
            replacer.touch(page_ref);
        }
        Ok(frame_id)
    }

    /// Take a frame from the free list, or evict the LRU page for one.
    ///
    /// The victim leaves the replacer only once its write-back succeeded; on
    /// failure it stays resident, dirty and least recently used.
    fn allocate_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let victim = state.replacer.peek_lru().ok_or(Error::PoolExhausted {
            pool_size: self.pool_size,
        })?;

        let PoolState {
            pages,
            replacer,
            spill,
            ..
        } = state;

        let Some(page) = pages.get_mut(victim) else {
            unreachable!("replacer held a destroyed page");
        };
        let Some(frame_id) = page.frame() else {
            unreachable!("replacer held unmaterialized page {}", page.key());
        };

        let flushed = {
            let data = self.frames[frame_id.0].read();
            self.write_back(page, &data[..], spill)
        };
        if let Err(e) = flushed {
            warn!("write-back of eviction victim {} failed: {}", page.key(), e);
            return Err(e);
        }

        replacer.remove(&victim);
        page.detach();
        BufferPoolStats::bump(&self.stats.evictions);
        debug!("evicted {} from {}", page.key(), frame_id);

        Ok(frame_id)
    }

    /// Destroy a page record, flushing and freeing its frame.
    fn destroy(&self, state: &mut PoolState, page_ref: PageRef) -> Result<()> {
        state.replacer.remove(&page_ref);

        let Some(mut page) = state.pages.remove(page_ref) else {
            return Ok(());
        };
        let Some(frame_id) = page.detach() else {
            return Ok(());
        };

        let flushed = {
            let data = self.frames[frame_id.0].read();
            self.write_back(&mut page, &data[..], &mut state.spill)
        };
        state.free_list.push(frame_id);
        flushed
    }

    /// Write a dirty page's bytes to its table file or spill slot.
    fn write_back(&self, page: &mut Page, data: &[u8], spill: &mut SpillFile) -> Result<()> {
        if page.write_back(data, spill, self.sync_writes)? {
            if page.is_anonymous() {
                BufferPoolStats::bump(&self.stats.spills);
                trace!("spilled {} at offset {:?}", page.key(), page.spill_offset());
            } else {
                BufferPoolStats::bump(&self.stats.pages_written);
            }
        }
        Ok(())
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let remaining: Vec<PageRef> = state.pages.iter().map(|(page_ref, _)| page_ref).collect();
        for page_ref in remaining {
            if let Err(e) = self.destroy(state, page_ref) {
                error!("failed to flush page during shutdown: {}", e);
            }
        }

        info!("buffer manager shut down: {}", self.stats.snapshot());
    }
}
