//! Local heap parsing: the null-terminated name pool of classic groups.

use crate::error::H5Error;
use crate::window::Window;

const HEAP: [u8; 4] = *b"HEAP";

/// Parsed local heap header.
#[derive(Debug, Clone, Copy)]
pub struct LocalHeap {
    /// Size of the data segment in bytes.
    pub data_segment_size: u64,
    /// File address of the data segment.
    pub data_segment_address: u64,
}

impl LocalHeap {
    /// Parse the local heap header at `addr`.
    pub fn parse(
        win: Window<'_>,
        addr: u64,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<LocalHeap, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &HEAP, "local heap")?;
        let version = win.u8_at(base + 4)?;
        if version != 0 {
            return Err(H5Error::BadVersion {
                structure: "local heap",
                version,
            });
        }
        let ls = size_of_lengths as usize;
        let data_segment_size = win.uint_at(base + 8, size_of_lengths)?;
        // free list head offset sits between size and address
        let data_segment_address = win.uint_at(base + 8 + ls * 2, size_of_offsets)?;
        Ok(LocalHeap {
            data_segment_size,
            data_segment_address,
        })
    }

    /// The null-terminated string at `offset` within the data segment.
    pub fn string_at<'a>(&self, win: Window<'a>, offset: u64) -> Result<&'a str, H5Error> {
        let seg = self.data_segment_address as usize;
        let limit = seg + self.data_segment_size as usize;
        win.cstr_at(seg + offset as usize, limit)
    }
}
