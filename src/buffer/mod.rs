//! Buffer pool management.
//!
//! The buffer pool multiplexes a fixed set of frames over an unbounded
//! number of pages. Table pages are read from and written back to their
//! table file; anonymous pages live in a spill file while evicted.
//!
//! # Components
//! - [`BufferManager`] - The page cache and its eviction loop
//! - [`PageHandle`] - Reference-counted client access to one page
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards over page bytes
//! - [`Frame`] - A page-sized slot of the pool
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - LRU replacement index

mod buffer_manager;
mod frame;
mod page;
mod page_handle;
mod page_table;
pub mod replacer;
mod stats;

pub use buffer_manager::BufferManager;
pub use frame::Frame;
pub use page_handle::{PageHandle, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
