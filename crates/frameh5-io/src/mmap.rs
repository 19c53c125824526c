//! Memory-mapped read-only file windows via `memmap2`.

use memmap2::Mmap;
use std::fs;
use std::io;
use std::path::Path;

use crate::FileRead;

/// A read-only memory-mapped file.
///
/// `as_bytes()` returns a slice straight into the mapping; nothing is
/// copied until a caller copies it.
pub struct MmapReader {
    _file: fs::File,
    mmap: Mmap,
}

impl MmapReader {
    /// Open and map a file for reading.
    ///
    /// The caller must ensure no other process truncates or rewrites the
    /// file while the mapping is live.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<MmapReader> {
        let file = fs::File::open(path)?;
        // SAFETY: read-only mapping; concurrent external modification is
        // excluded by the caller per the documented contract.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(MmapReader { _file: file, mmap })
    }

    /// The whole mapped file, zero-copy.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True for an empty file.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// A slice at `offset`, or `None` past the end.
    pub fn read_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.mmap.get(offset..offset.checked_add(len)?)
    }

    /// Hint the kernel to start faulting in the given range
    /// (`madvise(MADV_WILLNEED)`); useful right before a frame read.
    #[cfg(unix)]
    pub fn advise_willneed(&self, offset: usize, len: usize) {
        let clamped = len.min(self.mmap.len().saturating_sub(offset));
        if clamped == 0 {
            return;
        }
        // SAFETY: the advised range lies inside our valid mapping.
        unsafe {
            let ptr = self.mmap.as_ptr().add(offset);
            libc::madvise(ptr as *mut libc::c_void, clamped, libc::MADV_WILLNEED);
        }
    }

    /// No-op off unix.
    #[cfg(not(unix))]
    pub fn advise_willneed(&self, _offset: usize, _len: usize) {}
}

impl FileRead for MmapReader {
    fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}
