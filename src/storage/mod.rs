//! Storage layer - positioned page I/O.
//!
//! - [`TableFile`] - Pages of a table file, opened per operation
//! - [`SpillFile`] - Scratch file for evicted anonymous pages

mod spill_file;
mod table_file;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

pub use spill_file::SpillFile;
pub use table_file::TableFile;

use crate::common::{Error, Result};

/// Byte offset of page `page_num`.
pub(crate) fn page_offset(page_num: u64, page_size: usize) -> Result<u64> {
    page_num
        .checked_mul(page_size as u64)
        .ok_or(Error::OffsetOverflow {
            page_num,
            page_size,
        })
}

/// Read `buf.len()` bytes at `offset`, stopping early at end-of-file.
///
/// Bytes past end-of-file are zeroed. Returns how many bytes came from disk.
pub(crate) fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf[filled..].fill(0);

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempfile;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(3, 64).unwrap(), 192);
        assert!(matches!(
            page_offset(u64::MAX, 64),
            Err(Error::OffsetOverflow { .. })
        ));
    }

    #[test]
    fn test_read_at_zero_fills_past_eof() {
        let mut file = tempfile().unwrap();
        file.write_all(&[7u8; 10]).unwrap();

        let mut buf = [0xFFu8; 16];
        let n = read_at(&mut file, 4, &mut buf).unwrap();

        assert_eq!(n, 6);
        assert_eq!(&buf[..6], &[7u8; 6]);
        assert_eq!(&buf[6..], &[0u8; 10]);
    }
}
