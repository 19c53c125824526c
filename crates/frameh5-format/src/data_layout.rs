//! Data Layout message parsing (type 0x0008, versions 1 through 4).

use crate::error::H5Error;
use crate::window::Window;

/// Where a dataset's raw bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw bytes stored inline in the message.
    Compact {
        /// The inline bytes.
        data: Vec<u8>,
    },
    /// Raw bytes at one address.
    Contiguous {
        /// Data address; `None` when nothing was ever allocated.
        address: Option<u64>,
        /// Data size in bytes.
        size: u64,
    },
    /// Chunked storage indexed by a v1 B-tree.
    Chunked {
        /// Chunk shape, one axis more than the dataset rank; the trailing
        /// axis is the element size in bytes.
        chunk_dims: Vec<u32>,
        /// Root of the chunk B-tree; `None` when no chunk was ever written.
        btree_address: Option<u64>,
    },
}

impl DataLayout {
    /// Parse from raw message payload bytes.
    pub fn parse(
        payload: &[u8],
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<DataLayout, H5Error> {
        let w = Window::new(payload);
        let version = w.u8_at(0)?;
        match version {
            1 | 2 => Self::parse_legacy(w, size_of_offsets),
            3 => Self::parse_v3(w, size_of_offsets, size_of_lengths),
            4 => Self::parse_v4(w, size_of_offsets, size_of_lengths),
            other => Err(H5Error::BadVersion {
                structure: "data layout",
                version: other,
            }),
        }
    }

    /// v1/v2 framing: dimensionality before the class, fixed reserved pad,
    /// address before the dimension sizes for non-compact classes.
    fn parse_legacy(w: Window<'_>, size_of_offsets: u8) -> Result<DataLayout, H5Error> {
        let dimensionality = w.u8_at(1)? as usize;
        let class = w.u8_at(2)?;
        let mut pos = 8; // version, dimensionality, class, reserved(5)

        let address = if class != 0 {
            let a = w.addr_at(pos, size_of_offsets)?;
            pos += size_of_offsets as usize;
            a
        } else {
            None
        };

        let mut dims = Vec::with_capacity(dimensionality);
        for _ in 0..dimensionality {
            dims.push(w.u32_at(pos)?);
            pos += 4;
        }

        match class {
            0 => {
                let size = w.u32_at(pos)? as usize;
                let data = w.bytes(pos + 4, size)?.to_vec();
                let _ = dims;
                Ok(DataLayout::Compact { data })
            }
            1 => {
                let size = dims.iter().map(|&d| d as u64).product();
                Ok(DataLayout::Contiguous { address, size })
            }
            2 => {
                let elem = w.u32_at(pos)?;
                let mut chunk_dims = dims;
                chunk_dims.push(elem);
                Ok(DataLayout::Chunked {
                    chunk_dims,
                    btree_address: address,
                })
            }
            other => Err(H5Error::UnsupportedLayoutClass(other)),
        }
    }

    fn parse_v3(
        w: Window<'_>,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<DataLayout, H5Error> {
        let class = w.u8_at(1)?;
        let pos = 2;
        match class {
            0 => {
                let size = w.u16_at(pos)? as usize;
                Ok(DataLayout::Compact {
                    data: w.bytes(pos + 2, size)?.to_vec(),
                })
            }
            1 => {
                let address = w.addr_at(pos, size_of_offsets)?;
                let size = w.uint_at(pos + size_of_offsets as usize, size_of_lengths)?;
                Ok(DataLayout::Contiguous { address, size })
            }
            2 => {
                let dimensionality = w.u8_at(pos)? as usize;
                let btree_address = w.addr_at(pos + 1, size_of_offsets)?;
                let mut p = pos + 1 + size_of_offsets as usize;
                let mut chunk_dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    chunk_dims.push(w.u32_at(p)?);
                    p += 4;
                }
                Ok(DataLayout::Chunked {
                    chunk_dims,
                    btree_address,
                })
            }
            other => Err(H5Error::UnsupportedLayoutClass(other)),
        }
    }

    fn parse_v4(
        w: Window<'_>,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<DataLayout, H5Error> {
        let class = w.u8_at(1)?;
        let pos = 2;
        match class {
            0 => {
                let size = w.u16_at(pos)? as usize;
                Ok(DataLayout::Compact {
                    data: w.bytes(pos + 2, size)?.to_vec(),
                })
            }
            1 => {
                let address = w.addr_at(pos, size_of_offsets)?;
                let size = w.uint_at(pos + size_of_offsets as usize, size_of_lengths)?;
                Ok(DataLayout::Contiguous { address, size })
            }
            2 => {
                let _flags = w.u8_at(pos)?;
                let dimensionality = w.u8_at(pos + 1)? as usize;
                let dim_width = w.u8_at(pos + 2)?;
                let mut p = pos + 3;
                let mut chunk_dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    chunk_dims.push(w.uint_at(p, dim_width)? as u32);
                    p += dim_width as usize;
                }
                let index_type = w.u8_at(p)?;
                p += 1;
                // Only the v1 B-tree index (type 5) carries the tree this
                // reader can walk.
                if index_type != 5 {
                    return Err(H5Error::UnsupportedChunkIndex(index_type));
                }
                let btree_address = w.addr_at(p, size_of_offsets)?;
                Ok(DataLayout::Chunked {
                    chunk_dims,
                    btree_address,
                })
            }
            other => Err(H5Error::UnsupportedLayoutClass(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_contiguous() {
        let mut buf = vec![3u8, 1];
        buf.extend_from_slice(&0x1000u64.to_le_bytes());
        buf.extend_from_slice(&256u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: Some(0x1000),
                size: 256
            }
        );
    }

    #[test]
    fn v3_contiguous_unallocated() {
        let mut buf = vec![3u8, 1];
        buf.extend_from_slice(&[0xFF; 8]);
        buf.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: None,
                size: 0
            }
        );
    }

    #[test]
    fn v3_compact() {
        let mut buf = vec![3u8, 0];
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Compact {
                data: vec![0xAA, 0xBB, 0xCC, 0xDD]
            }
        );
    }

    #[test]
    fn v3_chunked_frame_shape() {
        let mut buf = vec![3u8, 2];
        buf.push(4); // rank 3 dataset + element axis
        buf.extend_from_slice(&0x2000u64.to_le_bytes());
        for dim in [1u32, 1064, 1030, 2] {
            buf.extend_from_slice(&dim.to_le_bytes());
        }
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dims: vec![1, 1064, 1030, 2],
                btree_address: Some(0x2000)
            }
        );
    }

    #[test]
    fn v4_chunked_btree_index() {
        let mut buf = vec![4u8, 2];
        buf.push(0); // flags
        buf.push(3); // dimensionality
        buf.push(4); // dim encoding width
        for dim in [1u32, 512, 4] {
            buf.extend_from_slice(&dim.to_le_bytes());
        }
        buf.push(5); // v1 btree index
        buf.extend_from_slice(&0x3000u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dims: vec![1, 512, 4],
                btree_address: Some(0x3000)
            }
        );
    }

    #[test]
    fn v4_other_chunk_indexes_unsupported() {
        let mut buf = vec![4u8, 2];
        buf.push(0);
        buf.push(1);
        buf.push(4);
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.push(3); // fixed array index
        buf.extend_from_slice(&0x3000u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap_err(),
            H5Error::UnsupportedChunkIndex(3)
        );
    }

    #[test]
    fn legacy_v1_contiguous() {
        let mut buf = vec![1u8, 2, 1]; // version 1, rank 2, contiguous
        buf.extend_from_slice(&[0u8; 5]); // reserved
        buf.extend_from_slice(&0x800u64.to_le_bytes());
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(&6u32.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: Some(0x800),
                size: 60
            }
        );
    }

    #[test]
    fn legacy_v2_chunked() {
        let mut buf = vec![2u8, 3, 2]; // version 2, dimensionality 3, chunked
        buf.extend_from_slice(&[0u8; 5]);
        buf.extend_from_slice(&0x900u64.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&64u32.to_le_bytes());
        buf.extend_from_slice(&64u32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes()); // element size
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dims: vec![1, 64, 64, 2],
                btree_address: Some(0x900)
            }
        );
    }

    #[test]
    fn legacy_v1_compact() {
        let mut buf = vec![1u8, 1, 0]; // version 1, rank 1, compact
        buf.extend_from_slice(&[0u8; 5]);
        buf.extend_from_slice(&3u32.to_le_bytes()); // dim
        buf.extend_from_slice(&3u32.to_le_bytes()); // compact data size
        buf.extend_from_slice(&[7, 8, 9]);
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Compact { data: vec![7, 8, 9] }
        );
    }

    #[test]
    fn bad_version_and_class() {
        assert!(matches!(
            DataLayout::parse(&[5, 0, 0, 0], 8, 8).unwrap_err(),
            H5Error::BadVersion { structure: "data layout", version: 5 }
        ));
        assert_eq!(
            DataLayout::parse(&[3, 7, 0, 0], 8, 8).unwrap_err(),
            H5Error::UnsupportedLayoutClass(7)
        );
    }
}
