//! Fractal heap parsing: the record pool behind new-style group links.
//!
//! Only managed objects are supported. A managed heap id packs an offset of
//! `max_heap_size` bits and a length in the residual bits; the offset is an
//! address in the heap's logical space, laid out by the doubling table (two
//! starting rows of equal size, each later row doubling).

use crate::error::H5Error;
use crate::window::Window;

const FRHP: [u8; 4] = *b"FRHP";
const FHIB: [u8; 4] = *b"FHIB";

/// Parsed fractal heap header.
#[derive(Debug, Clone)]
pub struct FractalHeap {
    /// Length of heap ids in bytes (7 for link storage).
    pub heap_id_length: u16,
    /// Non-zero when direct blocks pass through an IO filter chain.
    pub io_filter_encoded_length: u16,
    /// Width of the doubling table.
    pub table_width: u16,
    /// Block size of the first two doubling-table rows.
    pub starting_block_size: u64,
    /// Bits of heap-id offsets.
    pub max_heap_size: u16,
    /// First doubling-table row holding indirect blocks.
    pub starting_row_of_indirect_blocks: u16,
    /// Root block address, direct or indirect.
    pub root_block_address: Option<u64>,
    /// Rows in the root indirect block; 0 when the root is a direct block.
    pub root_indirect_rows: u16,
}

impl FractalHeap {
    /// Parse the heap header at `addr`.
    pub fn parse(
        win: Window<'_>,
        addr: u64,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<FractalHeap, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &FRHP, "fractal heap")?;
        let version = win.u8_at(base + 4)?;
        if version != 0 {
            return Err(H5Error::BadVersion {
                structure: "fractal heap",
                version,
            });
        }
        let os = size_of_offsets as usize;
        let ls = size_of_lengths as usize;

        let heap_id_length = win.u16_at(base + 5)?;
        let io_filter_encoded_length = win.u16_at(base + 7)?;
        // flags(1) + max_managed_object_size(4)
        let mut pos = base + 9 + 5;
        // next_huge_id(ls) + huge_btree(os) + free_space(ls) + free_mgr(os)
        // + managed_space(ls) + allocated_space(ls) + alloc_iterator(ls)
        // + managed_count(ls) + huge_size(ls) + huge_count(ls)
        // + tiny_size(ls) + tiny_count(ls)
        pos += ls + os + ls + os + ls * 5 + ls * 3;

        let table_width = win.u16_at(pos)?;
        pos += 2;
        let starting_block_size = win.uint_at(pos, size_of_lengths)?;
        pos += ls;
        let _max_direct_block_size = win.uint_at(pos, size_of_lengths)?;
        pos += ls;
        let max_heap_size = win.u16_at(pos)?;
        pos += 2;
        let starting_row_of_indirect_blocks = win.u16_at(pos)?;
        pos += 2;
        let root_block_address = win.addr_at(pos, size_of_offsets)?;
        pos += os;
        let root_indirect_rows = win.u16_at(pos)?;

        Ok(FractalHeap {
            heap_id_length,
            io_filter_encoded_length,
            table_width,
            starting_block_size,
            max_heap_size,
            starting_row_of_indirect_blocks,
            root_block_address,
            root_indirect_rows,
        })
    }

    /// Split a managed heap id into `(heap_offset, length)`.
    pub fn decode_managed_id(&self, id: &[u8]) -> Result<(u64, u64), H5Error> {
        let head = *id.first().ok_or(H5Error::OutOfRange {
            expected: 1,
            available: 0,
        })?;
        let id_type = (head >> 4) & 0x03;
        if id_type != 0 {
            return Err(H5Error::UnsupportedHeapId(id_type));
        }

        let mut packed = 0u64;
        for (i, &b) in id[1..].iter().take(8).enumerate() {
            packed |= (b as u64) << (i * 8);
        }
        let offset_bits = (self.max_heap_size as u32).min(63);
        let offset = packed & ((1u64 << offset_bits) - 1);
        let payload_bits = ((id.len() - 1) as u32 * 8).min(64);
        let length = if payload_bits > offset_bits {
            packed >> offset_bits
        } else {
            0
        };
        Ok((offset, length))
    }

    /// Fetch the managed object behind `id`.
    pub fn object<'a>(
        &self,
        win: Window<'a>,
        id: &[u8],
        size_of_offsets: u8,
    ) -> Result<&'a [u8], H5Error> {
        let (offset, length) = self.decode_managed_id(id)?;
        let root = self
            .root_block_address
            .ok_or_else(|| H5Error::NotFound("fractal heap root block".into()))?;
        if self.root_indirect_rows == 0 {
            self.read_direct(win, root, 0, offset, length as usize)
        } else {
            self.read_indirect(
                win,
                root,
                self.root_indirect_rows,
                0,
                offset,
                length as usize,
                size_of_offsets,
            )
        }
    }

    /// Heap offsets address block interiors including the block header, so
    /// a direct-block read is plain address arithmetic.
    fn read_direct<'a>(
        &self,
        win: Window<'a>,
        block_addr: u64,
        block_heap_offset: u64,
        target: u64,
        length: usize,
    ) -> Result<&'a [u8], H5Error> {
        let local = (target - block_heap_offset) as usize;
        win.bytes(block_addr as usize + local, length)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_indirect<'a>(
        &self,
        win: Window<'a>,
        iblock_addr: u64,
        nrows: u16,
        iblock_heap_offset: u64,
        target: u64,
        length: usize,
        size_of_offsets: u8,
    ) -> Result<&'a [u8], H5Error> {
        let base = iblock_addr as usize;
        win.expect_signature(base, &FHIB, "fractal heap indirect block")?;
        let os = size_of_offsets as usize;
        let block_offset_bytes = (self.max_heap_size as usize).div_ceil(8);
        let mut pos = base + 5 + os + block_offset_bytes;

        let width = self.table_width as usize;
        let start_indirect = self.starting_row_of_indirect_blocks as usize;
        let mut heap_offset = iblock_heap_offset;

        // Direct-block rows.
        for row in 0..(nrows as usize).min(start_indirect) {
            let block_size = self.row_block_size(row);
            for _ in 0..width {
                let child = win.addr_at(pos, size_of_offsets)?;
                pos += os;
                if self.io_filter_encoded_length > 0 {
                    pos += 4; // filter mask of the filtered direct block
                }
                if let Some(child_addr) = child {
                    if target >= heap_offset && target < heap_offset + block_size {
                        return self.read_direct(win, child_addr, heap_offset, target, length);
                    }
                }
                heap_offset += block_size;
            }
        }

        // Indirect-block rows.
        for row in start_indirect..nrows as usize {
            let child_rows = row - start_indirect + 1;
            let span = self.indirect_span(child_rows);
            for _ in 0..width {
                let child = win.addr_at(pos, size_of_offsets)?;
                pos += os;
                if let Some(child_addr) = child {
                    if target >= heap_offset && target < heap_offset + span {
                        return self.read_indirect(
                            win,
                            child_addr,
                            child_rows as u16,
                            heap_offset,
                            target,
                            length,
                            size_of_offsets,
                        );
                    }
                }
                heap_offset += span;
            }
        }

        Err(H5Error::NotFound("fractal heap object".into()))
    }

    /// Block size of a doubling-table row: the first two rows use the
    /// starting size, each later row doubles.
    fn row_block_size(&self, row: usize) -> u64 {
        if row <= 1 {
            self.starting_block_size
        } else {
            self.starting_block_size << (row - 1)
        }
    }

    /// Heap space spanned by an indirect block of `nrows` rows.
    fn indirect_span(&self, nrows: usize) -> u64 {
        let width = self.table_width as u64;
        (0..nrows).map(|r| self.row_block_size(r) * width).sum()
    }
}
