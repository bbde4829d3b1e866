//! Construction parameters for a [`BufferManager`](crate::BufferManager).

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Tests usually pick something
/// much smaller so that eviction is easy to provoke.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Configuration of a buffer manager.
///
/// There is no dynamic reconfiguration: a manager keeps the values it was
/// built with for its whole lifetime.
///
/// # Example
/// ```
/// use pagepool::BufferConfig;
///
/// let config = BufferConfig::new(64, 16, "/tmp/spill.tmp").with_sync_writes(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Bytes per page, and per frame.
    pub page_size: usize,

    /// Pool capacity in frames.
    pub num_pages: usize,

    /// Spill file for anonymous pages. Created (truncated) by the manager
    /// and removed when the manager is dropped.
    pub temp_file: PathBuf,

    /// Call `sync_all` after every page write.
    pub sync_writes: bool,
}

impl BufferConfig {
    /// Create a configuration with synchronous writes enabled.
    pub fn new<P: AsRef<Path>>(page_size: usize, num_pages: usize, temp_file: P) -> Self {
        Self {
            page_size,
            num_pages,
            temp_file: temp_file.as_ref().to_path_buf(),
            sync_writes: true,
        }
    }

    /// Enable or disable `sync_all` after writes.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Reject configurations the manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page_size must be > 0".to_string()));
        }
        if self.num_pages == 0 {
            return Err(Error::InvalidConfig("num_pages must be > 0".to_string()));
        }
        if self.page_size.checked_mul(self.num_pages).is_none() {
            return Err(Error::InvalidConfig(format!(
                "pool of {} x {} bytes overflows usize",
                self.num_pages, self.page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_size_is_power_of_two() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_new_defaults_to_sync_writes() {
        let config = BufferConfig::new(64, 2, "spill");
        assert!(config.sync_writes);
        assert!(!config.with_sync_writes(false).sync_writes);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(BufferConfig::new(0, 2, "spill").validate().is_err());
        assert!(BufferConfig::new(64, 0, "spill").validate().is_err());
        assert!(BufferConfig::new(64, 2, "spill").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overflow() {
        let config = BufferConfig::new(usize::MAX, 2, "spill");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
