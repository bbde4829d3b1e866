//! Positioned page I/O on a table's storage file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::Result;
use crate::storage::{page_offset, read_at};

/// An open table storage file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0    page_size   ...   N×page_size
/// ```
///
/// The buffer manager opens a `TableFile` for a single read or write and
/// drops it right after, so no descriptors are held between operations.
/// The file is created if it does not exist yet.
pub struct TableFile {
    file: File,
    page_size: usize,
}

impl TableFile {
    /// Open (or create) the table file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self { file, page_size })
    }

    /// Read page `page_num` into `buf`.
    ///
    /// Pages beyond the end of the file read as zeros. Returns the number of
    /// bytes that actually came from the file.
    pub fn read_page(&mut self, page_num: u64, buf: &mut [u8]) -> Result<usize> {
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = page_offset(page_num, self.page_size)?;
        Ok(read_at(&mut self.file, offset, buf)?)
    }

    /// Write `data` as page `page_num`, extending the file if needed.
    pub fn write_page(&mut self, page_num: u64, data: &[u8], sync: bool) -> Result<()> {
        debug_assert_eq!(data.len(), self.page_size);
        let offset = page_offset(page_num, self.page_size)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
