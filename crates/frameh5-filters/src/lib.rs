//! Chunk decoders for the filters detector writers actually use:
//! gzip/deflate (1), byte shuffle (2), LZ4 (32004) and bitshuffle+LZ4
//! (32008).
//!
//! [`StandardDecoder`] plugs these into the format crate's `ChunkDecoder`
//! hook. The compression directions exist only so tests can build filtered
//! chunks; the reader never writes.

mod bitshuffle;

pub use bitshuffle::{bitshuffle_block, bitunshuffle_block};

use frameh5_format::filter_pipeline::{
    ChunkDecoder, FILTER_BSLZ4, FILTER_DEFLATE, FILTER_LZ4, FILTER_SHUFFLE,
};
use frameh5_format::H5Error;

fn fail(filter_id: u16, reason: impl Into<String>) -> H5Error {
    H5Error::FilterFailed {
        filter_id,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// deflate (filter 1)
// ---------------------------------------------------------------------------

/// Inflate zlib-wrapped data into `dst`; returns bytes produced.
pub fn deflate_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, H5Error> {
    use std::io::Read;
    let mut decoder = flate2::read::ZlibDecoder::new(src);
    let mut written = 0usize;
    loop {
        let n = decoder
            .read(&mut dst[written..])
            .map_err(|e| fail(FILTER_DEFLATE, e.to_string()))?;
        if n == 0 {
            break;
        }
        written += n;
        if written == dst.len() {
            // drain any trailing output to detect an oversized stream
            let mut probe = [0u8; 1];
            let extra = decoder
                .read(&mut probe)
                .map_err(|e| fail(FILTER_DEFLATE, e.to_string()))?;
            if extra != 0 {
                return Err(fail(FILTER_DEFLATE, "output larger than chunk"));
            }
            break;
        }
    }
    Ok(written)
}

/// Deflate `src` with zlib framing (tests only).
pub fn deflate_compress(src: &[u8], level: u32) -> Vec<u8> {
    use std::io::Write;
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder.write_all(src).expect("in-memory write");
    encoder.finish().expect("in-memory finish")
}

// ---------------------------------------------------------------------------
// byte shuffle (filter 2)
// ---------------------------------------------------------------------------

/// Undo the byte shuffle: on disk all byte-0s come first, then byte-1s, ...
pub fn unshuffle(src: &[u8], dst: &mut [u8], elem_size: usize) -> Result<usize, H5Error> {
    if elem_size <= 1 {
        dst[..src.len()].copy_from_slice(src);
        return Ok(src.len());
    }
    if src.len() % elem_size != 0 || dst.len() < src.len() {
        return Err(fail(FILTER_SHUFFLE, "length not a multiple of element size"));
    }
    let count = src.len() / elem_size;
    for i in 0..count {
        for j in 0..elem_size {
            dst[i * elem_size + j] = src[j * count + i];
        }
    }
    Ok(src.len())
}

/// Apply the byte shuffle (tests only).
pub fn shuffle(src: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 || src.len() % elem_size != 0 {
        return src.to_vec();
    }
    let count = src.len() / elem_size;
    let mut out = vec![0u8; src.len()];
    for i in 0..count {
        for j in 0..elem_size {
            out[j * count + i] = src[i * elem_size + j];
        }
    }
    out
}

// ---------------------------------------------------------------------------
// LZ4 (filter 32004)
// ---------------------------------------------------------------------------
//
// Stream framing: total decompressed size (8 bytes BE), block size
// (4 bytes BE), then per block a 4-byte BE compressed length followed by an
// LZ4 block; a block whose compressed length equals its plain length is
// stored raw.

fn read_be_u64(src: &[u8], pos: usize) -> Result<u64, H5Error> {
    src.get(pos..pos + 8)
        .map(|b| u64::from_be_bytes(b.try_into().unwrap()))
        .ok_or_else(|| fail(FILTER_LZ4, "truncated stream header"))
}

fn read_be_u32(src: &[u8], pos: usize, filter_id: u16) -> Result<u32, H5Error> {
    src.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes(b.try_into().unwrap()))
        .ok_or_else(|| fail(filter_id, "truncated block header"))
}

/// Decode an LZ4-filtered chunk into `dst`; returns bytes produced.
pub fn lz4_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, H5Error> {
    let total = read_be_u64(src, 0)? as usize;
    let mut block_size = read_be_u32(src, 8, FILTER_LZ4)? as usize;
    if block_size == 0 {
        block_size = total;
    }
    if total > dst.len() {
        return Err(fail(FILTER_LZ4, "chunk larger than destination"));
    }

    let mut pos = 12usize;
    let mut out = 0usize;
    while out < total {
        let plain = block_size.min(total - out);
        let packed = read_be_u32(src, pos, FILTER_LZ4)? as usize;
        pos += 4;
        let body = src
            .get(pos..pos + packed)
            .ok_or_else(|| fail(FILTER_LZ4, "truncated block body"))?;
        pos += packed;
        if packed == plain {
            dst[out..out + plain].copy_from_slice(body);
        } else {
            let n = lz4_flex::block::decompress_into(body, &mut dst[out..out + plain])
                .map_err(|e| fail(FILTER_LZ4, e.to_string()))?;
            if n != plain {
                return Err(fail(FILTER_LZ4, "short block"));
            }
        }
        out += plain;
    }
    Ok(total)
}

/// Encode `src` with the LZ4 filter framing (tests only).
pub fn lz4_compress(src: &[u8], block_size: usize) -> Vec<u8> {
    let block_size = if block_size == 0 { src.len().max(1) } else { block_size };
    let mut out = Vec::new();
    out.extend_from_slice(&(src.len() as u64).to_be_bytes());
    out.extend_from_slice(&(block_size as u32).to_be_bytes());
    for block in src.chunks(block_size) {
        let packed = lz4_flex::block::compress(block);
        if packed.len() >= block.len() {
            out.extend_from_slice(&(block.len() as u32).to_be_bytes());
            out.extend_from_slice(block);
        } else {
            out.extend_from_slice(&(packed.len() as u32).to_be_bytes());
            out.extend_from_slice(&packed);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// bitshuffle + LZ4 (filter 32008)
// ---------------------------------------------------------------------------
//
// Same stream framing as the LZ4 filter, but the block size counts bytes of
// bit-transposed data and every decoded block is un-transposed. Blocks
// cover a multiple of 8 elements; the trailing elements that do not fill a
// group of 8 ride at the end of the stream untransformed.

/// Decode a bitshuffle+LZ4 chunk of `elem_size`-byte elements into `dst`.
pub fn bslz4_decompress(src: &[u8], dst: &mut [u8], elem_size: usize) -> Result<usize, H5Error> {
    if elem_size == 0 {
        return Err(fail(FILTER_BSLZ4, "zero element size"));
    }
    let total = read_be_u64(src, 0)? as usize;
    let mut block_bytes = read_be_u32(src, 8, FILTER_BSLZ4)? as usize;
    if total > dst.len() {
        return Err(fail(FILTER_BSLZ4, "chunk larger than destination"));
    }
    let elems = total / elem_size;
    if block_bytes == 0 {
        block_bytes = (elems - elems % 8) * elem_size;
    }
    if block_bytes % (8 * elem_size) != 0 {
        return Err(fail(FILTER_BSLZ4, "block size not a multiple of 8 elements"));
    }

    let blocked_elems = elems - elems % 8;
    let mut pos = 12usize;
    let mut out = 0usize;
    let mut scratch = vec![0u8; block_bytes];

    while out < blocked_elems * elem_size {
        let plain = block_bytes.min(blocked_elems * elem_size - out);
        let packed = read_be_u32(src, pos, FILTER_BSLZ4)? as usize;
        pos += 4;
        let body = src
            .get(pos..pos + packed)
            .ok_or_else(|| fail(FILTER_BSLZ4, "truncated block body"))?;
        pos += packed;
        let transposed = if packed == plain {
            body
        } else {
            let n = lz4_flex::block::decompress_into(body, &mut scratch[..plain])
                .map_err(|e| fail(FILTER_BSLZ4, e.to_string()))?;
            if n != plain {
                return Err(fail(FILTER_BSLZ4, "short block"));
            }
            &scratch[..plain]
        };
        bitunshuffle_block(transposed, &mut dst[out..out + plain], elem_size);
        out += plain;
    }

    // trailing elements (< 8) stored raw
    let tail = total - out;
    let body = src
        .get(pos..pos + tail)
        .ok_or_else(|| fail(FILTER_BSLZ4, "truncated tail"))?;
    dst[out..total].copy_from_slice(body);
    Ok(total)
}

/// Encode `src` with the bitshuffle+LZ4 framing (tests only).
pub fn bslz4_compress(src: &[u8], elem_size: usize, block_elems: usize) -> Vec<u8> {
    let elems = src.len() / elem_size;
    let blocked_elems = elems - elems % 8;
    let block_elems = if block_elems == 0 {
        blocked_elems.max(8)
    } else {
        block_elems - block_elems % 8
    };
    let block_bytes = block_elems * elem_size;

    let mut out = Vec::new();
    out.extend_from_slice(&(src.len() as u64).to_be_bytes());
    out.extend_from_slice(&(block_bytes as u32).to_be_bytes());

    let mut pos = 0usize;
    while pos < blocked_elems * elem_size {
        let plain = block_bytes.min(blocked_elems * elem_size - pos);
        let mut transposed = vec![0u8; plain];
        bitshuffle_block(&src[pos..pos + plain], &mut transposed, elem_size);
        let packed = lz4_flex::block::compress(&transposed);
        if packed.len() >= plain {
            out.extend_from_slice(&(plain as u32).to_be_bytes());
            out.extend_from_slice(&transposed);
        } else {
            out.extend_from_slice(&(packed.len() as u32).to_be_bytes());
            out.extend_from_slice(&packed);
        }
        pos += plain;
    }
    out.extend_from_slice(&src[blocked_elems * elem_size..]);
    out
}

// ---------------------------------------------------------------------------
// decoder hook
// ---------------------------------------------------------------------------

/// The decoder wired into dataset reads: dispatches on the filter id and
/// pulls element sizes out of the filter's client data where needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl ChunkDecoder for StandardDecoder {
    fn decode(
        &self,
        filter_id: u16,
        client_data: &[u32],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, H5Error> {
        match filter_id {
            FILTER_DEFLATE => deflate_decompress(src, dst),
            FILTER_SHUFFLE => {
                let elem = client_data.first().copied().unwrap_or(1) as usize;
                unshuffle(src, dst, elem)
            }
            FILTER_LZ4 => lz4_decompress(src, dst),
            // bitshuffle client data: {major, minor, elem_size, block_size,
            // compression}
            FILTER_BSLZ4 => {
                let elem = client_data.get(2).copied().unwrap_or(1) as usize;
                bslz4_decompress(src, dst, elem)
            }
            other => Err(H5Error::UnsupportedFilter(other)),
        }
    }
}
