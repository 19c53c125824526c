//! Builders that assemble complete version-0 HDF5 file images in memory,
//! used by the integration tests in place of checked-in fixture binaries.
//!
//! Everything is appended bottom-up (data, then headers, then groups) so
//! every address is computed, never hand-set; the superblock is patched in
//! last.

// Each test binary uses a different slice of these helpers.
#![allow(dead_code)]

use frameh5_format::message::type_id;

/// Filters a synthetic chunked dataset can be built with.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ChunkFilter {
    None,
    Deflate,
    Bslz4,
}

pub struct ImageBuilder {
    buf: Vec<u8>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        // superblock slot, patched by finish()
        ImageBuilder { buf: vec![0u8; 96] }
    }

    fn align8(&mut self) {
        while self.buf.len() % 8 != 0 {
            self.buf.push(0);
        }
    }

    /// Append raw bytes 8-aligned and return their address.
    pub fn append(&mut self, bytes: &[u8]) -> u64 {
        self.align8();
        let addr = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        addr
    }

    /// Append a v1 object header with the given raw messages.
    pub fn object_header(&mut self, messages: &[(u16, Vec<u8>)]) -> u64 {
        let mut body = Vec::new();
        for (t, payload) in messages {
            body.extend_from_slice(&t.to_le_bytes());
            body.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            body.push(0); // flags
            body.extend_from_slice(&[0u8; 3]);
            body.extend_from_slice(payload);
        }
        let mut hdr = Vec::new();
        hdr.push(1); // version
        hdr.push(0);
        hdr.extend_from_slice(&(messages.len() as u16).to_le_bytes());
        hdr.extend_from_slice(&1u32.to_le_bytes()); // reference count
        hdr.extend_from_slice(&(body.len() as u32).to_le_bytes());
        hdr.extend_from_slice(&[0u8; 4]); // pad prefix to 16
        hdr.extend_from_slice(&body);
        self.append(&hdr)
    }

    // -- message payload encoders ------------------------------------------

    pub fn dataspace_msg(dims: &[u64]) -> Vec<u8> {
        let mut m = vec![1u8, dims.len() as u8, 0, 0];
        m.extend_from_slice(&[0u8; 4]);
        for &d in dims {
            m.extend_from_slice(&d.to_le_bytes());
        }
        m
    }

    pub fn datatype_msg(size: u32, float: bool, signed: bool) -> Vec<u8> {
        let mut bits0 = 0u8;
        if float {
            bits0 = 0x20; // IEEE layout bits, little-endian
        } else if signed {
            bits0 = 0x08;
        }
        let class = if float { 0x11 } else { 0x10 };
        let mut m = vec![class, bits0, 0, 0];
        m.extend_from_slice(&size.to_le_bytes());
        m.extend_from_slice(&0u16.to_le_bytes());
        m.extend_from_slice(&((size * 8) as u16).to_le_bytes());
        if float {
            m.extend_from_slice(&[52, 11, 0, 52]);
            m.extend_from_slice(&1023u32.to_le_bytes());
        }
        m
    }

    pub fn contiguous_layout_msg(address: u64, size: u64) -> Vec<u8> {
        let mut m = vec![3u8, 1];
        m.extend_from_slice(&address.to_le_bytes());
        m.extend_from_slice(&size.to_le_bytes());
        m
    }

    pub fn chunked_layout_msg(btree: u64, chunk_dims: &[u32]) -> Vec<u8> {
        let mut m = vec![3u8, 2, chunk_dims.len() as u8];
        m.extend_from_slice(&btree.to_le_bytes());
        for &d in chunk_dims {
            m.extend_from_slice(&d.to_le_bytes());
        }
        m
    }

    pub fn symbol_table_msg(btree: u64, heap: u64) -> Vec<u8> {
        let mut m = Vec::new();
        m.extend_from_slice(&btree.to_le_bytes());
        m.extend_from_slice(&heap.to_le_bytes());
        m
    }

    fn pipeline_msg(filter: ChunkFilter, elem_size: u32) -> Vec<u8> {
        let mut m = vec![1u8, 1, 0, 0, 0, 0, 0, 0];
        match filter {
            ChunkFilter::Deflate => {
                m.extend_from_slice(&1u16.to_le_bytes()); // id
                m.extend_from_slice(&0u16.to_le_bytes()); // name length
                m.extend_from_slice(&1u16.to_le_bytes()); // flags: optional
                m.extend_from_slice(&1u16.to_le_bytes()); // client words
                m.extend_from_slice(&6u32.to_le_bytes());
                m.extend_from_slice(&0u32.to_le_bytes()); // pad to 8
            }
            ChunkFilter::Bslz4 => {
                let name = b"bslz4\0\0\0"; // padded to 8
                m.extend_from_slice(&32008u16.to_le_bytes());
                m.extend_from_slice(&5u16.to_le_bytes());
                m.extend_from_slice(&0u16.to_le_bytes());
                m.extend_from_slice(&5u16.to_le_bytes());
                m.extend_from_slice(name);
                for word in [0u32, 0, elem_size, 0, 2] {
                    m.extend_from_slice(&word.to_le_bytes());
                }
                m.extend_from_slice(&0u32.to_le_bytes()); // pad odd count
            }
            ChunkFilter::None => unreachable!(),
        }
        m
    }

    // -- dataset builders ---------------------------------------------------

    /// Scalar dataset stored contiguously; `raw` is the element's bytes.
    pub fn scalar(&mut self, raw: &[u8], float: bool, signed: bool) -> u64 {
        let addr = self.append(raw);
        self.object_header(&[
            (type_id::DATASPACE, Self::dataspace_msg(&[])),
            (
                type_id::DATATYPE,
                Self::datatype_msg(raw.len() as u32, float, signed),
            ),
            (
                type_id::DATA_LAYOUT,
                Self::contiguous_layout_msg(addr, raw.len() as u64),
            ),
        ])
    }

    /// 2-D unsigned-integer dataset stored contiguously.
    pub fn array_2d(&mut self, dims: [u64; 2], raw: &[u8], elem_size: u32) -> u64 {
        let addr = self.append(raw);
        self.object_header(&[
            (type_id::DATASPACE, Self::dataspace_msg(&dims)),
            (type_id::DATATYPE, Self::datatype_msg(elem_size, false, false)),
            (
                type_id::DATA_LAYOUT,
                Self::contiguous_layout_msg(addr, raw.len() as u64),
            ),
        ])
    }

    /// 3-D unsigned-integer dataset chunked as one frame per chunk.
    ///
    /// `frames[i]` holds the raw bytes of frame `i` (`h * w * elem_size`).
    pub fn frame_stack(
        &mut self,
        dims: [u64; 3],
        frames: &[Vec<u8>],
        elem_size: u32,
        filter: ChunkFilter,
    ) -> u64 {
        let [_, h, w] = dims;
        // store each frame, filtered as requested
        let stored: Vec<(u64, usize)> = frames
            .iter()
            .map(|plain| {
                let encoded = match filter {
                    ChunkFilter::None => plain.clone(),
                    ChunkFilter::Deflate => frameh5_filters::deflate_compress(plain, 6),
                    ChunkFilter::Bslz4 => {
                        frameh5_filters::bslz4_compress(plain, elem_size as usize, 0)
                    }
                };
                let addr = self.append(&encoded);
                (addr, encoded.len())
            })
            .collect();

        // chunk B-tree: one leaf, entries in frame order
        let mut node = Vec::new();
        node.extend_from_slice(b"TREE");
        node.push(1); // chunk node
        node.push(0); // leaf
        node.extend_from_slice(&(frames.len() as u16).to_le_bytes());
        node.extend_from_slice(&u64::MAX.to_le_bytes());
        node.extend_from_slice(&u64::MAX.to_le_bytes());
        for (i, (addr, len)) in stored.iter().enumerate() {
            node.extend_from_slice(&(*len as u32).to_le_bytes());
            node.extend_from_slice(&0u32.to_le_bytes()); // filter mask
            for coord in [i as u64, 0, 0, 0] {
                node.extend_from_slice(&coord.to_le_bytes());
            }
            node.extend_from_slice(&addr.to_le_bytes());
        }
        // upper bound key
        node.extend_from_slice(&0u32.to_le_bytes());
        node.extend_from_slice(&0u32.to_le_bytes());
        for coord in [frames.len() as u64, 0, 0, 0] {
            node.extend_from_slice(&coord.to_le_bytes());
        }
        let btree = self.append(&node);

        let mut messages = vec![
            (type_id::DATASPACE, Self::dataspace_msg(&dims)),
            (type_id::DATATYPE, Self::datatype_msg(elem_size, false, false)),
            (
                type_id::DATA_LAYOUT,
                Self::chunked_layout_msg(btree, &[1, h as u32, w as u32, elem_size]),
            ),
        ];
        if filter != ChunkFilter::None {
            messages.push((type_id::FILTER_PIPELINE, Self::pipeline_msg(filter, elem_size)));
        }
        self.object_header(&messages)
    }

    // -- group builders -----------------------------------------------------

    /// Classic group: local heap + SNOD + one-leaf B-tree + symbol table
    /// message.
    pub fn group(&mut self, children: &[(&str, u64)]) -> u64 {
        let mut sorted: Vec<(&str, u64)> = children.to_vec();
        sorted.sort_by_key(|(name, _)| *name);

        let mut seg = Vec::new();
        let mut offsets = Vec::new();
        for (name, _) in &sorted {
            offsets.push(seg.len() as u64);
            seg.extend_from_slice(name.as_bytes());
            seg.push(0);
        }
        let seg_addr = self.append(&seg);

        let mut heap = Vec::new();
        heap.extend_from_slice(b"HEAP");
        heap.push(0);
        heap.extend_from_slice(&[0u8; 3]);
        heap.extend_from_slice(&(seg.len() as u64).to_le_bytes());
        heap.extend_from_slice(&u64::MAX.to_le_bytes());
        heap.extend_from_slice(&seg_addr.to_le_bytes());
        let heap_addr = self.append(&heap);

        let mut snod = Vec::new();
        snod.extend_from_slice(b"SNOD");
        snod.push(1);
        snod.push(0);
        snod.extend_from_slice(&(sorted.len() as u16).to_le_bytes());
        for (i, (_, child)) in sorted.iter().enumerate() {
            snod.extend_from_slice(&offsets[i].to_le_bytes());
            snod.extend_from_slice(&child.to_le_bytes());
            snod.extend_from_slice(&[0u8; 24]);
        }
        let snod_addr = self.append(&snod);

        let mut tree = Vec::new();
        tree.extend_from_slice(b"TREE");
        tree.push(0); // group node
        tree.push(0); // leaf
        tree.extend_from_slice(&1u16.to_le_bytes());
        tree.extend_from_slice(&u64::MAX.to_le_bytes());
        tree.extend_from_slice(&u64::MAX.to_le_bytes());
        tree.extend_from_slice(&0u64.to_le_bytes()); // key[0]
        tree.extend_from_slice(&snod_addr.to_le_bytes());
        tree.extend_from_slice(&offsets.last().copied().unwrap_or(0).to_le_bytes());
        let tree_addr = self.append(&tree);

        self.object_header(&[(
            type_id::SYMBOL_TABLE,
            Self::symbol_table_msg(tree_addr, heap_addr),
        )])
    }

    /// Group holding explicit Link messages (hard, soft, or external).
    pub fn link_group(&mut self, links: &[frameh5_format::link::LinkMessage]) -> u64 {
        let messages: Vec<(u16, Vec<u8>)> = links
            .iter()
            .map(|l| (type_id::LINK, l.encode(8)))
            .collect();
        self.object_header(&messages)
    }

    /// Write the v0 superblock and return the finished image.
    pub fn finish(mut self, root_header: u64) -> Vec<u8> {
        let eof = self.buf.len() as u64;
        let sb = &mut self.buf[..96];
        sb[0..8].copy_from_slice(&[0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n']);
        // versions and reserved bytes stay zero
        sb[13] = 8; // size of offsets
        sb[14] = 8; // size of lengths
        sb[16..18].copy_from_slice(&4u16.to_le_bytes()); // group leaf k
        sb[18..20].copy_from_slice(&16u16.to_le_bytes()); // group internal k
        sb[24..32].copy_from_slice(&0u64.to_le_bytes()); // base address
        sb[32..40].copy_from_slice(&u64::MAX.to_le_bytes()); // free space
        sb[40..48].copy_from_slice(&eof.to_le_bytes());
        sb[48..56].copy_from_slice(&u64::MAX.to_le_bytes()); // driver info
        sb[56..64].copy_from_slice(&0u64.to_le_bytes()); // root link name offset
        sb[64..72].copy_from_slice(&root_header.to_le_bytes());
        self.buf
    }
}

/// Frame pixel values laid out like the test detector writes them.
pub fn frame_pixels(frame: usize, h: usize, w: usize) -> Vec<u16> {
    (0..h * w)
        .map(|i| ((i * 31 + frame * 7) % 0xFFF0) as u16)
        .collect()
}

pub fn as_bytes_u16(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn as_bytes_u32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A complete master-file image mirroring the detector layout:
/// pixel sizes, mask, nimages/ntrigger, and a chunked 3-D frame stack at
/// `/entry/data/data`.
pub struct MasterImage {
    pub bytes: Vec<u8>,
    pub frames: Vec<Vec<u16>>,
    pub mask: Vec<u32>,
}

pub fn build_master(
    nimages: u64,
    ntrigger: u64,
    h: usize,
    w: usize,
    filter: ChunkFilter,
) -> MasterImage {
    let mut b = ImageBuilder::new();

    let x_pixel = b.scalar(&7.5e-5f64.to_le_bytes(), true, false);
    let y_pixel = b.scalar(&7.5e-5f64.to_le_bytes(), true, false);
    let nimages_ds = b.scalar(&nimages.to_le_bytes(), false, false);
    let ntrigger_ds = b.scalar(&ntrigger.to_le_bytes(), false, false);

    // mask: a gap row flagged -1 (bit 0), a few dead pixels (bit 2)
    let mut mask = vec![0u32; h * w];
    for x in 0..w {
        mask[(h / 2) * w + x] = 1;
    }
    mask[3] = 4;
    mask[w + 5] = 4;
    let mask_ds = b.array_2d([h as u64, w as u64], &as_bytes_u32(&mask), 4);

    let total = (nimages * ntrigger) as usize;
    let frames: Vec<Vec<u16>> = (0..total).map(|i| frame_pixels(i, h, w)).collect();
    let frame_bytes: Vec<Vec<u8>> = frames.iter().map(|f| as_bytes_u16(f)).collect();
    let data_ds = b.frame_stack(
        [total as u64, h as u64, w as u64],
        &frame_bytes,
        2,
        filter,
    );

    let detector_specific = b.group(&[
        ("pixel_mask", mask_ds),
        ("nimages", nimages_ds),
        ("ntrigger", ntrigger_ds),
    ]);
    let detector = b.group(&[
        ("x_pixel_size", x_pixel),
        ("y_pixel_size", y_pixel),
        ("detectorSpecific", detector_specific),
    ]);
    let instrument = b.group(&[("detector", detector)]);
    let data_group = b.group(&[("data", data_ds)]);
    let entry = b.group(&[("instrument", instrument), ("data", data_group)]);
    let root = b.group(&[("entry", entry)]);

    MasterImage {
        bytes: b.finish(root),
        frames,
        mask,
    }
}
