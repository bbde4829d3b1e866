//! pagepool - a fixed-capacity, disk-backed buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Client (storage engine)                     │
//! │        get_page / get_anonymous_page / get_pinned_page          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                ↓ PageHandle
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Buffer Pool (buffer/)                        │
//! │   PageTable + Frames + LruReplacer + BufferPoolStats            │
//! └─────────────────────────────────────────────────────────────────┘
//!                 ↓                                 ↓
//! ┌───────────────────────────────┐   ┌─────────────────────────────┐
//! │  TableFile (storage/)         │   │  SpillFile (storage/)       │
//! │  one file per catalog table   │   │  evicted anonymous pages    │
//! └───────────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageKey, FrameId, Error, config)
//! - [`buffer`] - Buffer manager, page handles and the LRU replacer
//! - [`catalog`] - Table descriptors the pool reads pages of
//! - [`storage`] - Positioned page I/O on table and spill files
//!
//! # Quick Start
//! ```no_run
//! use pagepool::{BufferConfig, BufferManager};
//! use pagepool::catalog::FileTable;
//!
//! let bm = BufferManager::new(BufferConfig::new(4096, 128, "/tmp/pagepool.spill"))?;
//! let users = FileTable::new("users", "/tmp/users.tbl");
//!
//! let page = bm.get_page(&users, 0);
//! page.get_bytes_mut()?[..5].copy_from_slice(b"hello");
//!
//! let scratch = bm.get_anonymous_page();
//! scratch.get_bytes_mut()?.fill(0xFF);
//! # Ok::<(), pagepool::Error>(())
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod storage;

pub use common::config::DEFAULT_PAGE_SIZE;
pub use common::{BufferConfig, Error, FrameId, PageKey, Result};

pub use buffer::{
    BufferManager, BufferPoolStats, PageHandle, PageReadGuard, PageWriteGuard, StatsSnapshot,
};
