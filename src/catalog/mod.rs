//! Table collaborator.
//!
//! The buffer pool only needs two things from a table: a stable name, used to
//! build [`PageKey`](crate::PageKey)s, and the path of the file its pages live
//! in. Anything that can answer both can back pages.

use std::path::{Path, PathBuf};

/// What the buffer pool consumes from a table.
pub trait Table {
    /// Stable table name. Two tables with the same name share cached pages.
    fn name(&self) -> &str;

    /// File holding the table's pages at `page_num * page_size`.
    fn storage_location(&self) -> &Path;
}

/// A table described by a name and a storage path.
///
/// # Example
/// ```
/// use pagepool::catalog::{FileTable, Table};
///
/// let table = FileTable::new("orders", "/var/db/orders.dat");
/// assert_eq!(table.name(), "orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    name: String,
    storage: PathBuf,
}

impl FileTable {
    pub fn new(name: impl Into<String>, storage: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            storage: storage.as_ref().to_path_buf(),
        }
    }
}

impl Table for FileTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_location(&self) -> &Path {
        &self.storage
    }
}

impl<T: Table + ?Sized> Table for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn storage_location(&self) -> &Path {
        (**self).storage_location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_file_table_accessors() {
        let table = FileTable::new("tempTable", "foobar");
        assert_eq!(table.name(), "tempTable");
        assert_eq!(table.storage_location(), Path::new("foobar"));
    }

    #[test]
    fn test_shared_table() {
        let table = Arc::new(FileTable::new("T", "file_t"));
        assert_eq!(Table::name(&table), "T");
        assert_eq!(table.storage_location(), Path::new("file_t"));
    }
}
