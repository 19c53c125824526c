//! Read-only memory-mapped file access for the HDF5 reader.
//!
//! [`MmapReader`] maps a file and hands out zero-copy slices; the format
//! crate does all its parsing against those bytes.

mod mmap;

pub use mmap::MmapReader;

/// Anything that can expose a whole file as one byte slice.
///
/// The high-level crate reads real files through [`MmapReader`] and test
/// images through an owned `Vec<u8>`.
pub trait FileRead {
    /// The complete file contents.
    fn as_bytes(&self) -> &[u8];
}

impl FileRead for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}
