//! Version-1 B-tree traversal.
//!
//! The same node framing (`TREE` signature, type, level, sibling pointers,
//! interleaved keys and children with one trailing key) backs two distinct
//! trees: node type 0 indexes a classic group's symbol-table nodes by name,
//! node type 1 indexes the chunks of a dataset by chunk origin. Searches
//! descend key brackets; child `i` covers the half-open key interval
//! `[key[i], key[i+1])`.

use crate::error::H5Error;
use crate::local_heap::LocalHeap;
use crate::symbol_table::SymbolTableNode;
use crate::window::Window;

const TREE: [u8; 4] = *b"TREE";

/// Common node prelude shared by both node types.
struct NodeHeader {
    node_type: u8,
    node_level: u8,
    entries_used: usize,
    /// Offset of the first key, after the sibling pointers.
    keys_at: usize,
}

fn parse_node_header(
    win: Window<'_>,
    addr: u64,
    size_of_offsets: u8,
) -> Result<NodeHeader, H5Error> {
    let base = addr as usize;
    win.expect_signature(base, &TREE, "v1 B-tree")?;
    let node_type = win.u8_at(base + 4)?;
    let node_level = win.u8_at(base + 5)?;
    let entries_used = win.u16_at(base + 6)? as usize;
    let os = size_of_offsets as usize;
    Ok(NodeHeader {
        node_type,
        node_level,
        entries_used,
        keys_at: base + 8 + os * 2,
    })
}

// ---------------------------------------------------------------------------
// Node type 0: group entries keyed by heap name offsets
// ---------------------------------------------------------------------------

/// Look up `name` in a classic group's B-tree. `Ok(None)` means the name is
/// not present in this group.
pub fn find_group_entry(
    win: Window<'_>,
    btree_address: u64,
    heap: &LocalHeap,
    name: &str,
    size_of_offsets: u8,
) -> Result<Option<u64>, H5Error> {
    let os = size_of_offsets as usize;
    let mut addr = btree_address;

    // Descend at most the file's worth of levels; a level byte caps this
    // at 255 anyway.
    loop {
        let node = parse_node_header(win, addr, size_of_offsets)?;
        if node.node_type != 0 {
            return Err(H5Error::BadNodeType(node.node_type));
        }
        if node.entries_used == 0 {
            return Ok(None);
        }

        if node.node_level == 0 {
            // Children are symbol table nodes; scan their entries.
            let mut pos = node.keys_at;
            for _ in 0..node.entries_used {
                pos += os; // key[i]
                let snod_addr = win.uint_at(pos, size_of_offsets)?;
                pos += os;
                let snod = SymbolTableNode::parse(win, snod_addr, size_of_offsets)?;
                for entry in &snod.entries {
                    if heap.string_at(win, entry.link_name_offset)? == name {
                        return Ok(Some(entry.object_header_address));
                    }
                }
            }
            return Ok(None);
        }

        // Internal node: keys are heap name offsets; child i brackets
        // [key[i], key[i+1]). key[0] acts as an open lower bound.
        let mut chosen = 0usize;
        for i in 1..node.entries_used {
            let key_off = win.uint_at(node.keys_at + i * (os * 2), size_of_offsets)?;
            let key_name = heap.string_at(win, key_off)?;
            if name >= key_name {
                chosen = i;
            } else {
                break;
            }
        }
        addr = win.uint_at(node.keys_at + chosen * (os * 2) + os, size_of_offsets)?;
    }
}

// ---------------------------------------------------------------------------
// Node type 1: chunk records keyed by chunk origin
// ---------------------------------------------------------------------------

/// Where one chunk lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Stored byte size of the chunk (after filtering).
    pub byte_size: u32,
    /// Bitmask of pipeline filters that were skipped for this chunk.
    pub filter_mask: u32,
    /// File address of the chunk bytes.
    pub address: u64,
}

/// Lexicographic comparison of the `ndims` origin coordinates of the key at
/// `key_pos` against `origin`.
fn compare_key(
    win: Window<'_>,
    key_pos: usize,
    origin: &[u64],
    size_of_offsets: u8,
) -> Result<core::cmp::Ordering, H5Error> {
    use core::cmp::Ordering;
    let os = size_of_offsets as usize;
    let mut pos = key_pos + 8; // skip chunk_byte_size(4) + filter_mask(4)
    for &want in origin {
        let got = win.uint_at(pos, size_of_offsets)?;
        match got.cmp(&want) {
            Ordering::Equal => pos += os,
            other => return Ok(other),
        }
    }
    Ok(Ordering::Equal)
}

/// Locate the chunk whose origin is exactly `origin` (length `ndims`,
/// including the trailing element-size axis, which is always 0).
///
/// `Ok(None)` covers every miss: empty trees, origins beyond the extent,
/// and unwritten chunks.
pub fn find_chunk(
    win: Window<'_>,
    btree_address: u64,
    origin: &[u64],
    size_of_offsets: u8,
) -> Result<Option<ChunkLocation>, H5Error> {
    use core::cmp::Ordering;
    let os = size_of_offsets as usize;
    let key_size = 8 + origin.len() * os;
    let mut addr = btree_address;

    loop {
        let node = parse_node_header(win, addr, size_of_offsets)?;
        if node.node_type != 1 {
            return Err(H5Error::BadNodeType(node.node_type));
        }
        if node.entries_used == 0 {
            return Ok(None);
        }
        // entries_used children, entries_used + 1 keys, interleaved.
        let stride = key_size + os;
        win.bytes(node.keys_at, node.entries_used * stride + key_size)?;

        if node.node_level == 0 {
            // Binary search the leaf keys for an exact origin match.
            let mut lo = 0usize;
            let mut hi = node.entries_used;
            while lo < hi {
                let mid = (lo + hi) / 2;
                let key_pos = node.keys_at + mid * stride;
                match compare_key(win, key_pos, origin, size_of_offsets)? {
                    Ordering::Equal => {
                        let byte_size = win.u32_at(key_pos)?;
                        let filter_mask = win.u32_at(key_pos + 4)?;
                        let address = win.uint_at(key_pos + key_size, size_of_offsets)?;
                        return Ok(Some(ChunkLocation {
                            byte_size,
                            filter_mask,
                            address,
                        }));
                    }
                    Ordering::Less => lo = mid + 1,
                    Ordering::Greater => hi = mid,
                }
            }
            return Ok(None);
        }

        // Internal node: find the last key <= origin; the final key is an
        // exclusive upper bound over the whole node.
        if compare_key(win, node.keys_at, origin, size_of_offsets)? == Ordering::Greater {
            return Ok(None); // origin below the subtree's smallest key
        }
        let upper_pos = node.keys_at + node.entries_used * stride;
        if compare_key(win, upper_pos, origin, size_of_offsets)? != Ordering::Greater {
            return Ok(None); // origin at or past the upper bound
        }
        let mut chosen = 0usize;
        for i in 1..node.entries_used {
            let key_pos = node.keys_at + i * stride;
            if compare_key(win, key_pos, origin, size_of_offsets)? != Ordering::Greater {
                chosen = i;
            } else {
                break;
            }
        }
        addr = win.uint_at(node.keys_at + chosen * stride + key_size, size_of_offsets)?;
    }
}
