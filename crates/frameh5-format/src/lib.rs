//! Byte-level parsing of the HDF5 subset produced by detector control
//! software: superblock versions 0/2/3, object headers v1/v2, classic and
//! new-style group indexes, and chunked datasets indexed by a v1 B-tree.
//!
//! Everything here operates on an immutable byte window (typically a memory
//! map provided by `frameh5-io`). The crate performs no IO, keeps no global
//! state, and never writes.

pub mod btree_v1;
pub mod btree_v2;
pub mod checksum;
pub mod chunked;
pub mod data_layout;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod filter_pipeline;
pub mod fractal_heap;
pub mod link;
pub mod local_heap;
pub mod message;
pub mod object_header;
pub mod path;
pub mod superblock;
pub mod symbol_table;
pub mod window;

pub use error::{ErrorKind, H5Error};
pub use window::Window;
