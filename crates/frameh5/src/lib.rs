//! Read-only access to detector image series stored in HDF5.
//!
//! A [`File`] wraps one memory-mapped HDF5 file; a [`Dataset`] resolves a
//! slash-separated path (following external links into sibling data files)
//! and serves scalar, contiguous, and chunked reads.
//!
//! ```no_run
//! use frameh5::File;
//!
//! let file = File::open("master.h5").unwrap();
//! let frames = file.dataset("/entry/data/data_000001").unwrap();
//! let mut frame = vec![0u8; frames.chunk_byte_size()];
//! frames.read_chunk(&mut frame, &[0, 0, 0]).unwrap();
//! ```

pub mod dataset;
pub mod error;
pub mod file;

pub use dataset::Dataset;
pub use error::Error;
pub use file::File;
