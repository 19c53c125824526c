//! Dataset reads: one chunk at a time for chunked layouts, plus the small
//! contiguous and compact reads used for scalars and masks.
//!
//! The chunk covering a requested origin is located by descending the v1
//! chunk B-tree; its bytes are run through the decode pipeline (reverse
//! filter order, honoring the per-chunk skip mask) and must come out at
//! exactly the chunk's nominal size.

use crate::btree_v1;
use crate::data_layout::DataLayout;
use crate::error::H5Error;
use crate::filter_pipeline::{ChunkDecoder, FilterPipeline};
use crate::window::Window;

/// Read a whole contiguous or compact dataset into `dst`.
///
/// `dst` must be exactly the dataset's byte size; chunked layouts are
/// served by [`read_chunk`].
pub fn read_raw(win: Window<'_>, layout: &DataLayout, dst: &mut [u8]) -> Result<(), H5Error> {
    match layout {
        DataLayout::Compact { data } => {
            if data.len() != dst.len() {
                return Err(H5Error::ChunkSizeMismatch {
                    expected: dst.len(),
                    actual: data.len(),
                });
            }
            dst.copy_from_slice(data);
            Ok(())
        }
        DataLayout::Contiguous { address, size } => {
            let addr = address.ok_or(H5Error::ChunkNotFound)?;
            if *size as usize != dst.len() {
                return Err(H5Error::ChunkSizeMismatch {
                    expected: dst.len(),
                    actual: *size as usize,
                });
            }
            dst.copy_from_slice(win.bytes(addr as usize, dst.len())?);
            Ok(())
        }
        DataLayout::Chunked { .. } => Err(H5Error::BadArgument(
            "chunked dataset read without a chunk origin",
        )),
    }
}

/// Read the chunk whose origin is `origin` into `dst`.
///
/// `origin` gives the spatial coordinates (dataset rank of them); it must be
/// chunk-aligned. `dst` must hold exactly `prod(chunk_dims) * elem_size`
/// bytes.
pub fn read_chunk(
    win: Window<'_>,
    layout: &DataLayout,
    pipeline: Option<&FilterPipeline>,
    decoder: &dyn ChunkDecoder,
    origin: &[u64],
    dst: &mut [u8],
    size_of_offsets: u8,
) -> Result<(), H5Error> {
    let (chunk_dims, btree_address) = match layout {
        DataLayout::Chunked {
            chunk_dims,
            btree_address,
        } => (chunk_dims, btree_address),
        _ => return Err(H5Error::BadArgument("chunk read on a non-chunked layout")),
    };
    // chunk_dims carries the element-size axis; origin does not.
    let rank = chunk_dims.len() - 1;
    if origin.len() != rank {
        return Err(H5Error::BadArgument("chunk origin rank mismatch"));
    }
    for (o, c) in origin.iter().zip(chunk_dims.iter()) {
        if *c == 0 || o % (*c as u64) != 0 {
            return Err(H5Error::BadArgument("chunk origin not chunk-aligned"));
        }
    }
    let elem_size = chunk_dims[rank] as usize;
    let plain_size: usize = chunk_dims[..rank]
        .iter()
        .map(|&d| d as usize)
        .product::<usize>()
        * elem_size;
    if dst.len() != plain_size {
        return Err(H5Error::BadArgument("destination size mismatch"));
    }

    let btree = btree_address.ok_or(H5Error::ChunkNotFound)?;
    // B-tree keys carry the trailing element-size coordinate, always 0.
    let mut key = Vec::with_capacity(rank + 1);
    key.extend_from_slice(origin);
    key.push(0);
    let location = btree_v1::find_chunk(win, btree, &key, size_of_offsets)?
        .ok_or(H5Error::ChunkNotFound)?;

    let stored = win.bytes(location.address as usize, location.byte_size as usize)?;
    decode_into(stored, pipeline, decoder, location.filter_mask, dst)
}

/// Run the decode pipeline over one stored chunk.
///
/// Filters are undone in reverse application order. Bit `i` of
/// `filter_mask` set means filter `i` was skipped when writing, so it is
/// skipped when reading too.
fn decode_into(
    stored: &[u8],
    pipeline: Option<&FilterPipeline>,
    decoder: &dyn ChunkDecoder,
    filter_mask: u32,
    dst: &mut [u8],
) -> Result<(), H5Error> {
    let active: Vec<&crate::filter_pipeline::FilterDescription> = match pipeline {
        Some(p) => p
            .filters
            .iter()
            .enumerate()
            .filter(|(i, _)| filter_mask & (1 << i) == 0)
            .map(|(_, f)| f)
            .collect(),
        None => Vec::new(),
    };

    if active.is_empty() {
        if stored.len() != dst.len() {
            return Err(H5Error::ChunkSizeMismatch {
                expected: dst.len(),
                actual: stored.len(),
            });
        }
        dst.copy_from_slice(stored);
        return Ok(());
    }

    // Undo last-applied first. Intermediate stages go through a scratch
    // buffer sized at the final plaintext; only the last stage writes dst.
    let mut current: Vec<u8> = stored.to_vec();
    for (stage, filter) in active.iter().rev().enumerate() {
        let last = stage == active.len() - 1;
        if last {
            let n = decoder.decode(filter.filter_id, &filter.client_data, &current, dst)?;
            if n != dst.len() {
                return Err(H5Error::ChunkSizeMismatch {
                    expected: dst.len(),
                    actual: n,
                });
            }
        } else {
            let mut scratch = vec![0u8; dst.len()];
            let n = decoder.decode(
                filter.filter_id,
                &filter.client_data,
                &current,
                &mut scratch,
            )?;
            scratch.truncate(n);
            current = scratch;
        }
    }
    Ok(())
}
