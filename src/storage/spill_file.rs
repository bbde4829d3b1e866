//! Scratch storage for anonymous pages.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::common::Result;
use crate::storage::read_at;

/// Flat file holding evicted anonymous pages.
///
/// Each anonymous page that is evicted while dirty reserves one `page_size`
/// slot the first time and keeps it for the rest of its life. Slots are handed
/// out in strictly increasing order and are never reused or compacted, even
/// after the owning page is gone.
///
/// The file is truncated when opened and removed when the `SpillFile` is
/// dropped.
pub struct SpillFile {
    file: File,
    path: PathBuf,
    page_size: usize,
    next_slot: u64,
}

impl SpillFile {
    /// Create (or truncate) the spill file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            page_size,
            next_slot: 0,
        })
    }

    /// Reserve the next slot and return its byte offset.
    pub fn reserve(&mut self) -> u64 {
        let offset = self.next_slot * self.page_size as u64;
        self.next_slot += 1;
        debug!("reserved spill slot at offset {}", offset);
        offset
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn slots(&self) -> u64 {
        self.next_slot
    }

    /// Read a previously written slot.
    ///
    /// Unlike table files a short read is an error: every slot that is read
    /// back was written first.
    pub fn read_slot(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let n = read_at(&mut self.file, offset, buf)?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read of spill slot at offset {}", offset),
            )
            .into());
        }
        Ok(())
    }

    /// Write `data` into the slot at `offset`.
    pub fn write_slot(&mut self, offset: u64, data: &[u8], sync: bool) -> Result<()> {
        debug_assert_eq!(data.len(), self.page_size);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove spill file {}: {}", self.path.display(), e);
        }
    }
}
