//! Filter Pipeline message parsing (type 0x000B, versions 1 and 2) and the
//! decode hook the chunk reader drives.
//!
//! The parser never decompresses anything itself; a [`ChunkDecoder`] is
//! injected by the caller and invoked per filter, last-applied first.

use crate::error::H5Error;
use crate::window::Window;

/// gzip / zlib deflate.
pub const FILTER_DEFLATE: u16 = 1;
/// Byte shuffle.
pub const FILTER_SHUFFLE: u16 = 2;
/// LZ4 (registered third-party filter).
pub const FILTER_LZ4: u16 = 32004;
/// Bitshuffle + LZ4 (registered third-party filter).
pub const FILTER_BSLZ4: u16 = 32008;

/// One filter of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescription {
    /// Filter identification value.
    pub filter_id: u16,
    /// Filter flags (bit 0 = optional).
    pub flags: u16,
    /// Client data words passed to the filter.
    pub client_data: Vec<u32>,
}

/// The ordered filter chain of a chunked dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPipeline {
    /// Filters in application (write) order.
    pub filters: Vec<FilterDescription>,
}

/// Decompression callback driven by the chunk reader.
///
/// `decode` writes the plaintext into `dst` and returns the number of bytes
/// produced. Implementations live outside this crate; codecs are black boxes
/// here.
pub trait ChunkDecoder {
    fn decode(
        &self,
        filter_id: u16,
        client_data: &[u32],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, H5Error>;
}

impl FilterPipeline {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8]) -> Result<FilterPipeline, H5Error> {
        let w = Window::new(payload);
        let version = w.u8_at(0)?;
        let count = w.u8_at(1)? as usize;
        match version {
            1 => Self::parse_v1(w, count),
            2 => Self::parse_v2(w, count),
            other => Err(H5Error::BadVersion {
                structure: "filter pipeline",
                version: other,
            }),
        }
    }

    fn parse_v1(w: Window<'_>, count: usize) -> Result<FilterPipeline, H5Error> {
        // version(1) + count(1) + reserved(6)
        let mut pos = 8usize;
        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter_id = w.u16_at(pos)?;
            let name_length = w.u16_at(pos + 2)? as usize;
            let flags = w.u16_at(pos + 4)?;
            let n_client = w.u16_at(pos + 6)? as usize;
            pos += 8;
            // name padded to a multiple of 8
            pos += name_length.div_ceil(8) * 8;
            let mut client_data = Vec::with_capacity(n_client);
            for _ in 0..n_client {
                client_data.push(w.u32_at(pos)?);
                pos += 4;
            }
            if n_client % 2 == 1 {
                pos += 4; // pad to 8 bytes
            }
            filters.push(FilterDescription {
                filter_id,
                flags,
                client_data,
            });
        }
        Ok(FilterPipeline { filters })
    }

    fn parse_v2(w: Window<'_>, count: usize) -> Result<FilterPipeline, H5Error> {
        let mut pos = 2usize;
        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter_id = w.u16_at(pos)?;
            pos += 2;
            // name only present for registered filters >= 256
            let name_length = if filter_id >= 256 {
                let n = w.u16_at(pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = w.u16_at(pos)?;
            let n_client = w.u16_at(pos + 2)? as usize;
            pos += 4;
            pos += name_length; // unpadded in v2
            let mut client_data = Vec::with_capacity(n_client);
            for _ in 0..n_client {
                client_data.push(w.u32_at(pos)?);
                pos += 4;
            }
            filters.push(FilterDescription {
                filter_id,
                flags,
                client_data,
            });
        }
        Ok(FilterPipeline { filters })
    }

    /// True when no filter is configured.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_v1(filters: &[(u16, &str, u16, &[u32])]) -> Vec<u8> {
        let mut buf = vec![1u8, filters.len() as u8, 0, 0, 0, 0, 0, 0];
        for (id, name, flags, cd) in filters {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
            buf.extend_from_slice(&flags.to_le_bytes());
            buf.extend_from_slice(&(cd.len() as u16).to_le_bytes());
            let padded = name.len().div_ceil(8) * 8;
            buf.extend_from_slice(name.as_bytes());
            buf.extend(std::iter::repeat(0u8).take(padded - name.len()));
            for &v in *cd {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            if cd.len() % 2 == 1 {
                buf.extend_from_slice(&0u32.to_le_bytes());
            }
        }
        buf
    }

    fn build_v2(filters: &[(u16, &str, u16, &[u32])]) -> Vec<u8> {
        let mut buf = vec![2u8, filters.len() as u8];
        for (id, name, flags, cd) in filters {
            buf.extend_from_slice(&id.to_le_bytes());
            if *id >= 256 {
                buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
            }
            buf.extend_from_slice(&flags.to_le_bytes());
            buf.extend_from_slice(&(cd.len() as u16).to_le_bytes());
            if *id >= 256 {
                buf.extend_from_slice(name.as_bytes());
            }
            for &v in *cd {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }

    #[test]
    fn v1_deflate() {
        let data = build_v1(&[(FILTER_DEFLATE, "", 1, &[6])]);
        let p = FilterPipeline::parse(&data).unwrap();
        assert_eq!(p.filters.len(), 1);
        assert_eq!(p.filters[0].filter_id, FILTER_DEFLATE);
        assert_eq!(p.filters[0].flags, 1);
        assert_eq!(p.filters[0].client_data, vec![6]);
    }

    #[test]
    fn v1_named_registered_filter() {
        let data = build_v1(&[(FILTER_BSLZ4, "bitshuffle; see https://", 0, &[0, 0, 8, 2, 0])]);
        let p = FilterPipeline::parse(&data).unwrap();
        assert_eq!(p.filters[0].filter_id, FILTER_BSLZ4);
        assert_eq!(p.filters[0].client_data.len(), 5);
    }

    #[test]
    fn v2_shuffle_then_deflate() {
        let data = build_v2(&[
            (FILTER_SHUFFLE, "", 0, &[4]),
            (FILTER_DEFLATE, "", 0, &[6]),
        ]);
        let p = FilterPipeline::parse(&data).unwrap();
        assert_eq!(p.filters.len(), 2);
        assert_eq!(p.filters[0].filter_id, FILTER_SHUFFLE);
        assert_eq!(p.filters[1].filter_id, FILTER_DEFLATE);
    }

    #[test]
    fn v2_registered_filter_carries_name() {
        let data = build_v2(&[(FILTER_LZ4, "HDF5 lz4 filter", 0, &[0])]);
        let p = FilterPipeline::parse(&data).unwrap();
        assert_eq!(p.filters[0].filter_id, FILTER_LZ4);
        assert_eq!(p.filters[0].client_data, vec![0]);
    }

    #[test]
    fn bad_version() {
        let data = [3u8, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            FilterPipeline::parse(&data).unwrap_err(),
            H5Error::BadVersion { structure: "filter pipeline", version: 3 }
        ));
    }

    #[test]
    fn truncated_descriptor() {
        let mut data = build_v1(&[(FILTER_DEFLATE, "", 1, &[6])]);
        data.truncate(12);
        assert!(matches!(
            FilterPipeline::parse(&data).unwrap_err(),
            H5Error::OutOfRange { .. }
        ));
    }
}
