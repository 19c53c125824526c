//! Version-2 B-tree search for link-name records (tree type 5).
//!
//! Records are fixed-size and sorted by the Jenkins lookup3 hash of the
//! link name; internal nodes interleave child pointers whose count fields
//! use the minimum byte width for the maximum records a subtree of that
//! depth can hold, so the widths are recomputed per depth exactly as the
//! writer sized them.

use crate::error::H5Error;
use crate::window::Window;

const BTHD: [u8; 4] = *b"BTHD";
const BTIN: [u8; 4] = *b"BTIN";
const BTLF: [u8; 4] = *b"BTLF";

/// Tree type for links indexed by name hash.
pub const TREE_TYPE_LINK_NAME: u8 = 5;

/// Node overhead: signature(4) + version(1) + type(1) + checksum(4).
const NODE_OVERHEAD: u32 = 10;

/// Parsed v2 B-tree header.
#[derive(Debug, Clone)]
pub struct BTreeV2 {
    /// Record type stored in this tree.
    pub tree_type: u8,
    /// Size of every node in bytes.
    pub node_size: u32,
    /// Size of one record in bytes.
    pub record_size: u16,
    /// Tree depth; 0 means the root is a leaf.
    pub depth: u16,
    /// Root node address.
    pub root_address: Option<u64>,
    /// Records in the root node.
    pub root_record_count: u16,
}

/// A link-name record: the name hash plus the fractal-heap id of the
/// serialized link message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNameRecord {
    /// Jenkins lookup3 hash of the link name.
    pub name_hash: u32,
    /// Fractal heap id (7 bytes for link storage).
    pub heap_id: Vec<u8>,
}

/// Bytes needed to hold values up to `max`.
fn width_for(max: u64) -> usize {
    if max == 0 {
        1
    } else {
        (64 - max.leading_zeros() as usize).div_ceil(8)
    }
}

/// Little-endian unsigned integer of any width 1..=8 (count fields use the
/// minimum width, so 3-, 5-, 6-, and 7-byte values occur).
fn read_var_uint(win: Window<'_>, pos: usize, width: usize) -> Result<u64, H5Error> {
    let raw = win.bytes(pos, width)?;
    let mut val = 0u64;
    for (i, &b) in raw.iter().enumerate() {
        val |= (b as u64) << (i * 8);
    }
    Ok(val)
}

impl BTreeV2 {
    /// Parse the tree header at `addr`.
    pub fn parse(
        win: Window<'_>,
        addr: u64,
        size_of_offsets: u8,
    ) -> Result<BTreeV2, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &BTHD, "v2 B-tree")?;
        let version = win.u8_at(base + 4)?;
        if version != 0 {
            return Err(H5Error::BadVersion {
                structure: "v2 B-tree",
                version,
            });
        }
        let tree_type = win.u8_at(base + 5)?;
        let node_size = win.u32_at(base + 6)?;
        let record_size = win.u16_at(base + 10)?;
        let depth = win.u16_at(base + 12)?;
        // split(1) + merge(1) percents
        let mut pos = base + 16;
        let root_address = win.addr_at(pos, size_of_offsets)?;
        pos += size_of_offsets as usize;
        let root_record_count = win.u16_at(pos)?;

        // link-name records are hash(4) + heap id(>= 1)
        if record_size < 5 || node_size <= NODE_OVERHEAD {
            return Err(H5Error::BadSizeField(record_size as u8));
        }

        Ok(BTreeV2 {
            tree_type,
            node_size,
            record_size,
            depth,
            root_address,
            root_record_count,
        })
    }

    /// Maximum records a leaf can hold.
    fn max_leaf_records(&self) -> u64 {
        ((self.node_size - NODE_OVERHEAD) / self.record_size as u32) as u64
    }

    /// Per-depth `(max_records, cumulative_max_records)` tables, index 0 =
    /// leaf, up to `self.depth`.
    fn record_capacity_tables(&self, size_of_offsets: u8) -> (Vec<u64>, Vec<u64>) {
        let mut max_nrec = vec![self.max_leaf_records()];
        let mut cum_nrec = vec![self.max_leaf_records()];
        for d in 1..=self.depth as usize {
            let child_count_width = width_for(max_nrec[d - 1]);
            let child_total_width = if d >= 2 { width_for(cum_nrec[d - 1]) } else { 0 };
            let ptr_size = size_of_offsets as usize + child_count_width + child_total_width;
            let usable = (self.node_size - NODE_OVERHEAD) as u64;
            let n = (usable.saturating_sub(ptr_size as u64))
                / (self.record_size as u64 + ptr_size as u64);
            max_nrec.push(n);
            cum_nrec.push((n + 1).saturating_mul(cum_nrec[d - 1]).saturating_add(n));
        }
        (max_nrec, cum_nrec)
    }

    /// Find the record whose stored hash equals `name_hash`.
    ///
    /// `Ok(None)` when no record carries that hash. Hash collisions are the
    /// caller's problem: it must check the resolved link's actual name.
    pub fn find_by_hash(
        &self,
        win: Window<'_>,
        name_hash: u32,
        size_of_offsets: u8,
    ) -> Result<Option<LinkNameRecord>, H5Error> {
        if self.tree_type != TREE_TYPE_LINK_NAME {
            return Err(H5Error::BadNodeType(self.tree_type));
        }
        let root = match self.root_address {
            Some(a) if self.root_record_count > 0 => a,
            _ => return Ok(None),
        };
        let (max_nrec, cum_nrec) = self.record_capacity_tables(size_of_offsets);

        let mut addr = root;
        let mut nrec = self.root_record_count as u64;
        let mut depth = self.depth;
        loop {
            if depth == 0 {
                return self.search_leaf(win, addr, nrec, name_hash);
            }
            match self.search_internal(
                win,
                addr,
                nrec,
                depth,
                name_hash,
                size_of_offsets,
                &max_nrec,
                &cum_nrec,
            )? {
                InternalHit::Record(rec) => return Ok(Some(rec)),
                InternalHit::Child { address, count } => {
                    addr = address;
                    nrec = count;
                    depth -= 1;
                }
            }
        }
    }

    fn read_record(&self, win: Window<'_>, pos: usize) -> Result<LinkNameRecord, H5Error> {
        let name_hash = win.u32_at(pos)?;
        let heap_id = win
            .bytes(pos + 4, self.record_size as usize - 4)?
            .to_vec();
        Ok(LinkNameRecord { name_hash, heap_id })
    }

    fn search_leaf(
        &self,
        win: Window<'_>,
        addr: u64,
        nrec: u64,
        name_hash: u32,
    ) -> Result<Option<LinkNameRecord>, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &BTLF, "v2 B-tree leaf")?;
        let rs = self.record_size as usize;
        let records_at = base + 6;
        win.bytes(records_at, nrec as usize * rs)?;

        let mut lo = 0u64;
        let mut hi = nrec;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let h = win.u32_at(records_at + mid as usize * rs)?;
            match h.cmp(&name_hash) {
                core::cmp::Ordering::Equal => {
                    return self
                        .read_record(win, records_at + mid as usize * rs)
                        .map(Some)
                }
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    fn search_internal(
        &self,
        win: Window<'_>,
        addr: u64,
        nrec: u64,
        depth: u16,
        name_hash: u32,
        size_of_offsets: u8,
        max_nrec: &[u64],
        cum_nrec: &[u64],
    ) -> Result<InternalHit, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &BTIN, "v2 B-tree internal node")?;
        let rs = self.record_size as usize;
        let records_at = base + 6;

        // Child pointer geometry below this node.
        let child_depth = (depth - 1) as usize;
        let count_width = width_for(max_nrec[child_depth]);
        let total_width = if child_depth >= 1 {
            width_for(cum_nrec[child_depth])
        } else {
            0
        };
        let ptr_size = size_of_offsets as usize + count_width + total_width;
        let pointers_at = records_at + nrec as usize * rs;
        win.bytes(pointers_at, (nrec as usize + 1) * ptr_size)?;

        // Binary search the records; on a miss, descend the bracketed child.
        let mut lo = 0usize;
        let mut hi = nrec as usize;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let h = win.u32_at(records_at + mid * rs)?;
            match h.cmp(&name_hash) {
                core::cmp::Ordering::Equal => {
                    return Ok(InternalHit::Record(
                        self.read_record(win, records_at + mid * rs)?,
                    ))
                }
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
            }
        }
        let ptr_pos = pointers_at + lo * ptr_size;
        let address = win.uint_at(ptr_pos, size_of_offsets)?;
        let count = read_var_uint(win, ptr_pos + size_of_offsets as usize, count_width)?;
        Ok(InternalHit::Child { address, count })
    }
}

enum InternalHit {
    Record(LinkNameRecord),
    Child { address: u64, count: u64 },
}
