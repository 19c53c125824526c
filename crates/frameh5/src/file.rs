//! File handles: a mapped (or owned) byte window plus its superblock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use frameh5_format::superblock::Superblock;
use frameh5_format::Window;
use frameh5_io::MmapReader;

use crate::dataset::Dataset;
use crate::error::Error;

enum Backing {
    Mapped(MmapReader),
    Owned(Vec<u8>),
}

pub(crate) struct FileInner {
    backing: Backing,
    superblock: Superblock,
    /// Directory external-link filenames resolve against.
    directory: PathBuf,
}

impl FileInner {
    pub(crate) fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(m) => m.as_bytes(),
            Backing::Owned(v) => v,
        }
    }

    pub(crate) fn window(&self) -> Window<'_> {
        Window::new(self.bytes())
    }

    pub(crate) fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }
}

/// An open HDF5 file. Cheap to clone; clones share the mapping.
#[derive(Clone)]
pub struct File {
    pub(crate) inner: Arc<FileInner>,
}

impl File {
    /// Open and map a file, locating and parsing its superblock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<File, Error> {
        let path = path.as_ref();
        let reader = MmapReader::open(path)?;
        let superblock = Superblock::open(Window::new(reader.as_bytes()))?;
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(File {
            inner: Arc::new(FileInner {
                backing: Backing::Mapped(reader),
                superblock,
                directory,
            }),
        })
    }

    /// Open an in-memory file image. External links resolve against the
    /// current directory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<File, Error> {
        let superblock = Superblock::open(Window::new(&bytes))?;
        Ok(File {
            inner: Arc::new(FileInner {
                backing: Backing::Owned(bytes),
                superblock,
                directory: PathBuf::from("."),
            }),
        })
    }

    /// The parsed superblock.
    pub fn superblock(&self) -> &Superblock {
        self.inner.superblock()
    }

    /// Open the dataset at `path`, following external links through sibling
    /// files as needed.
    pub fn dataset(&self, path: &str) -> Result<Dataset, Error> {
        Dataset::open(self, path)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("size", &self.inner.bytes().len())
            .field("superblock_version", &self.inner.superblock().version)
            .finish()
    }
}
