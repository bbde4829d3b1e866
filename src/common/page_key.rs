//! Page identity.

use std::fmt;

/// Identifies a logical page.
///
/// A table-backed page is named by its table and page number and is shared by
/// every handle asking for the same pair. An anonymous page has no backing
/// file; each one gets a fresh id and is never looked up again by key.
///
/// # Example
/// ```
/// use pagepool::PageKey;
///
/// let key = PageKey::table("orders", 7);
/// assert!(!key.is_anonymous());
/// assert_eq!(key.to_string(), "orders[7]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageKey {
    /// Page `page_num` of table `table`.
    Table { table: String, page_num: u64 },

    /// Page with no permanent backing file.
    Anonymous(u64),
}

impl PageKey {
    /// Key of a table-backed page.
    pub fn table(table: impl Into<String>, page_num: u64) -> Self {
        PageKey::Table {
            table: table.into(),
            page_num,
        }
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, PageKey::Anonymous(_))
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Table { table, page_num } => write!(f, "{}[{}]", table, page_num),
            PageKey::Anonymous(id) => write!(f, "anon#{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_page_number_different_tables() {
        assert_ne!(PageKey::table("T1", 0), PageKey::table("T2", 0));
        assert_eq!(PageKey::table("T1", 0), PageKey::table("T1", 0));
    }

    #[test]
    fn test_page_key_display() {
        assert_eq!(PageKey::table("tempTable", 3).to_string(), "tempTable[3]");
        assert_eq!(PageKey::Anonymous(5).to_string(), "anon#5");
    }
}
