//! Dataspace message parsing (type 0x0001, versions 1 and 2).

use crate::error::H5Error;
use crate::window::Window;

/// Rank and extents of a dataset. A scalar dataset has rank 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    /// Number of dimensions.
    pub rank: u8,
    /// Current extent of each axis.
    pub dims: Vec<u64>,
    /// Maximum extent of each axis; `u64::MAX` marks an unlimited axis.
    pub max_dims: Option<Vec<u64>>,
}

impl Dataspace {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8], size_of_lengths: u8) -> Result<Dataspace, H5Error> {
        let w = Window::new(payload);
        let version = w.u8_at(0)?;
        let rank = w.u8_at(1)?;
        let flags = w.u8_at(2)?;

        let dims_at = match version {
            // v1: reserved byte + 4 reserved bytes after the flags
            1 => 8usize,
            // v2: byte 3 is the space type
            2 => {
                let space_type = w.u8_at(3)?;
                match space_type {
                    0 | 1 => {}
                    2 => return Err(H5Error::BadDataspaceType(2)), // null space
                    other => return Err(H5Error::BadDataspaceType(other)),
                }
                4
            }
            other => {
                return Err(H5Error::BadVersion {
                    structure: "dataspace",
                    version: other,
                })
            }
        };

        let ls = size_of_lengths as usize;
        let mut pos = dims_at;
        let mut dims = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            dims.push(w.uint_at(pos, size_of_lengths)?);
            pos += ls;
        }
        let max_dims = if flags & 0x01 != 0 {
            let mut m = Vec::with_capacity(rank as usize);
            for _ in 0..rank {
                m.push(w.uint_at(pos, size_of_lengths)?);
                pos += ls;
            }
            Some(m)
        } else {
            None
        };

        Ok(Dataspace {
            rank,
            dims,
            max_dims,
        })
    }

    /// Total element count; 1 for a scalar.
    pub fn element_count(&self) -> u64 {
        self.dims.iter().product()
    }
}
