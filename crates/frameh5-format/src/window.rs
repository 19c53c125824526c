//! Bounds-checked typed reads over the mapped file bytes.
//!
//! Every on-disk address in an HDF5 file is a byte offset into this window;
//! all multi-byte integers are little-endian. Reads that would cross the end
//! of the window fail with [`H5Error::OutOfRange`].

use byteorder::{ByteOrder, LittleEndian};

use crate::error::H5Error;

/// An immutable view of the whole file, cheap to copy into parse frames.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    data: &'a [u8],
}

impl<'a> Window<'a> {
    /// Wrap a byte slice (usually the mmap of one file).
    pub fn new(data: &'a [u8]) -> Window<'a> {
        Window { data }
    }

    /// Total window length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the window holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A sub-window over `len` bytes starting at `pos`. Offsets inside the
    /// sub-window are relative to `pos`.
    pub fn slice_at(&self, pos: usize, len: usize) -> Result<Window<'a>, H5Error> {
        Ok(Window::new(self.bytes(pos, len)?))
    }

    /// `len` bytes starting at `pos`.
    pub fn bytes(&self, pos: usize, len: usize) -> Result<&'a [u8], H5Error> {
        match pos.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(&self.data[pos..end]),
            _ => Err(H5Error::OutOfRange {
                expected: pos.saturating_add(len),
                available: self.data.len(),
            }),
        }
    }

    pub fn u8_at(&self, pos: usize) -> Result<u8, H5Error> {
        Ok(self.bytes(pos, 1)?[0])
    }

    pub fn u16_at(&self, pos: usize) -> Result<u16, H5Error> {
        Ok(LittleEndian::read_u16(self.bytes(pos, 2)?))
    }

    pub fn u32_at(&self, pos: usize) -> Result<u32, H5Error> {
        Ok(LittleEndian::read_u32(self.bytes(pos, 4)?))
    }

    pub fn u64_at(&self, pos: usize) -> Result<u64, H5Error> {
        Ok(LittleEndian::read_u64(self.bytes(pos, 8)?))
    }

    /// Unsigned integer of `width` bytes (1, 2, 4, or 8) at `pos`.
    ///
    /// Used for every field whose width the superblock parameterizes
    /// (`size_of_offsets`, `size_of_lengths`) and for the variable-width
    /// count fields inside v2 B-tree nodes.
    pub fn uint_at(&self, pos: usize, width: u8) -> Result<u64, H5Error> {
        let raw = self.bytes(pos, width as usize)?;
        match width {
            1 => Ok(raw[0] as u64),
            2 => Ok(LittleEndian::read_u16(raw) as u64),
            4 => Ok(LittleEndian::read_u32(raw) as u64),
            8 => Ok(LittleEndian::read_u64(raw)),
            w => Err(H5Error::BadSizeField(w)),
        }
    }

    /// True when the `width` bytes at `pos` are all ones (the undefined
    /// address sentinel). Out-of-range positions read as defined.
    pub fn is_undefined_at(&self, pos: usize, width: u8) -> bool {
        match self.bytes(pos, width as usize) {
            Ok(raw) => raw.iter().all(|&b| b == 0xFF),
            Err(_) => false,
        }
    }

    /// Read an address field, mapping the all-ones sentinel to `None`.
    pub fn addr_at(&self, pos: usize, width: u8) -> Result<Option<u64>, H5Error> {
        if self.is_undefined_at(pos, width) {
            Ok(None)
        } else {
            Ok(Some(self.uint_at(pos, width)?))
        }
    }

    /// Fail with [`H5Error::BadSignature`] unless `sig` appears at `pos`.
    pub fn expect_signature(
        &self,
        pos: usize,
        sig: &[u8],
        name: &'static str,
    ) -> Result<(), H5Error> {
        if self.bytes(pos, sig.len())? == sig {
            Ok(())
        } else {
            Err(H5Error::BadSignature(name))
        }
    }

    /// True when `sig` appears at `pos`; false on mismatch or truncation.
    pub fn has_signature(&self, pos: usize, sig: &[u8]) -> bool {
        matches!(self.bytes(pos, sig.len()), Ok(raw) if raw == sig)
    }

    /// Null-terminated string starting at `pos`, bounded by `limit`
    /// (exclusive end offset). The terminator must lie inside the bound.
    pub fn cstr_at(&self, pos: usize, limit: usize) -> Result<&'a str, H5Error> {
        let end = limit.min(self.data.len());
        if pos >= end {
            return Err(H5Error::OutOfRange {
                expected: pos + 1,
                available: end,
            });
        }
        let region = &self.data[pos..end];
        let nul = region
            .iter()
            .position(|&b| b == 0)
            .ok_or(H5Error::OutOfRange {
                expected: end + 1,
                available: end,
            })?;
        core::str::from_utf8(&region[..nul]).map_err(|_| H5Error::BadSignature("utf-8 name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let w = Window::new(&data);
        assert_eq!(w.u8_at(0).unwrap(), 0x01);
        assert_eq!(w.u16_at(0).unwrap(), 0x0201);
        assert_eq!(w.u32_at(0).unwrap(), 0x04030201);
        assert_eq!(w.u64_at(0).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn variable_width_reads() {
        let data = [0xAAu8, 0xBB, 0xCC, 0xDD, 0, 0, 0, 0];
        let w = Window::new(&data);
        assert_eq!(w.uint_at(0, 1).unwrap(), 0xAA);
        assert_eq!(w.uint_at(0, 2).unwrap(), 0xBBAA);
        assert_eq!(w.uint_at(0, 4).unwrap(), 0xDDCCBBAA);
        assert_eq!(w.uint_at(0, 3).unwrap_err(), H5Error::BadSizeField(3));
    }

    #[test]
    fn reads_past_end_fail() {
        let data = [1u8, 2, 3];
        let w = Window::new(&data);
        assert_eq!(
            w.u32_at(1).unwrap_err(),
            H5Error::OutOfRange { expected: 5, available: 3 }
        );
        assert!(w.u8_at(3).is_err());
        assert!(w.bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn undefined_sentinel() {
        let data = [0xFFu8, 0xFF, 0xFF, 0xFF, 0x10, 0, 0, 0];
        let w = Window::new(&data);
        assert!(w.is_undefined_at(0, 4));
        assert!(!w.is_undefined_at(4, 4));
        assert_eq!(w.addr_at(0, 4).unwrap(), None);
        assert_eq!(w.addr_at(4, 4).unwrap(), Some(0x10));
        // truncated region is not "undefined"
        assert!(!w.is_undefined_at(6, 4));
    }

    #[test]
    fn sub_windows_rebase_offsets() {
        let data = [9u8, 9, 0x34, 0x12, 9];
        let w = Window::new(&data);
        let sub = w.slice_at(2, 2).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.u16_at(0).unwrap(), 0x1234);
        assert!(sub.u8_at(2).is_err());
        assert!(w.slice_at(4, 2).is_err());
    }

    #[test]
    fn signatures() {
        let data = *b"TREExyz";
        let w = Window::new(&data);
        assert!(w.has_signature(0, b"TREE"));
        assert!(!w.has_signature(1, b"TREE"));
        assert!(w.expect_signature(0, b"TREE", "v1 B-tree").is_ok());
        assert_eq!(
            w.expect_signature(1, b"TREE", "v1 B-tree").unwrap_err(),
            H5Error::BadSignature("v1 B-tree")
        );
    }

    #[test]
    fn cstr_reads() {
        let data = *b"alpha\0beta\0";
        let w = Window::new(&data);
        assert_eq!(w.cstr_at(0, data.len()).unwrap(), "alpha");
        assert_eq!(w.cstr_at(6, data.len()).unwrap(), "beta");
        // bound cuts off the terminator
        assert!(w.cstr_at(6, 9).is_err());
        // start past the bound
        assert!(w.cstr_at(11, data.len()).is_err());
    }
}
