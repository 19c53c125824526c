//! Superblock location and parsing (versions 0, 2, and 3).
//!
//! The superblock is found by scanning candidate offsets 0, 512, 1024,
//! 2048, ... (doubling) for the 8-byte magic. Its offset/length sizes
//! govern every later variable-width read in the file.

use crate::error::H5Error;
use crate::window::Window;

/// The 8-byte HDF5 magic.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Parsed superblock of a version this reader supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version: 0, 2, or 3.
    pub version: u8,
    /// Size of offsets in bytes (nearly always 8).
    pub size_of_offsets: u8,
    /// Size of lengths in bytes (nearly always 8).
    pub size_of_lengths: u8,
    /// File consistency flags.
    pub consistency_flags: u32,
    /// File base address.
    pub base_address: u64,
    /// End-of-file address.
    pub eof_address: u64,
    /// Address of the root group's object header.
    pub root_object_header_address: u64,
}

/// Scan the candidate offsets for the HDF5 magic.
pub fn find_signature(win: Window<'_>) -> Result<usize, H5Error> {
    if win.has_signature(0, &HDF5_SIGNATURE) {
        return Ok(0);
    }
    let mut offset = 512usize;
    while offset + HDF5_SIGNATURE.len() <= win.len() {
        if win.has_signature(offset, &HDF5_SIGNATURE) {
            return Ok(offset);
        }
        offset *= 2;
    }
    Err(H5Error::SignatureNotFound)
}

fn check_size(size: u8) -> Result<u8, H5Error> {
    match size {
        2 | 4 | 8 => Ok(size),
        other => Err(H5Error::BadSizeField(other)),
    }
}

impl Superblock {
    /// Locate and parse the superblock of the file behind `win`.
    pub fn open(win: Window<'_>) -> Result<Superblock, H5Error> {
        let base = find_signature(win)?;
        Superblock::parse(win, base)
    }

    /// Parse a superblock whose signature sits at `base`.
    pub fn parse(win: Window<'_>, base: usize) -> Result<Superblock, H5Error> {
        win.expect_signature(base, &HDF5_SIGNATURE, "superblock")?;
        let version = win.u8_at(base + 8)?;
        match version {
            0 => Self::parse_v0(win, base),
            2 | 3 => Self::parse_v2v3(win, base, version),
            other => Err(H5Error::UnsupportedSuperblockVersion(other)),
        }
    }

    fn parse_v0(win: Window<'_>, base: usize) -> Result<Superblock, H5Error> {
        // sig(8) version(1) free_space_ver(1) root_group_ver(1) reserved(1)
        // shared_hdr_ver(1) size_of_offsets(1) size_of_lengths(1) reserved(1)
        // group_leaf_k(2) group_internal_k(2) consistency_flags(4)
        let size_of_offsets = check_size(win.u8_at(base + 13)?)?;
        let size_of_lengths = check_size(win.u8_at(base + 14)?)?;
        let consistency_flags = win.u32_at(base + 20)?;

        let os = size_of_offsets as usize;
        let mut pos = base + 24;
        let base_address = win.uint_at(pos, size_of_offsets)?;
        pos += os; // free space address
        pos += os;
        let eof_address = win.uint_at(pos, size_of_offsets)?;
        pos += os; // driver info address
        pos += os;

        // Root group symbol table entry: link_name_offset, object_header_addr,
        // cache_type(4), reserved(4), scratch(16). Only the header address
        // matters here.
        pos += os;
        let root_object_header_address = win.uint_at(pos, size_of_offsets)?;
        pos += os;
        // the rest of the entry must at least be present
        win.bytes(pos, 4 + 4 + 16)?;

        Ok(Superblock {
            version: 0,
            size_of_offsets,
            size_of_lengths,
            consistency_flags,
            base_address,
            eof_address,
            root_object_header_address,
        })
    }

    fn parse_v2v3(win: Window<'_>, base: usize, version: u8) -> Result<Superblock, H5Error> {
        // sig(8) version(1) size_of_offsets(1) size_of_lengths(1) flags(1)
        let size_of_offsets = check_size(win.u8_at(base + 9)?)?;
        let size_of_lengths = check_size(win.u8_at(base + 10)?)?;
        let consistency_flags = win.u8_at(base + 11)? as u32;

        let os = size_of_offsets as usize;
        let mut pos = base + 12;
        let base_address = win.uint_at(pos, size_of_offsets)?;
        pos += os; // superblock extension address
        pos += os;
        let eof_address = win.uint_at(pos, size_of_offsets)?;
        pos += os;
        let root_object_header_address = win.uint_at(pos, size_of_offsets)?;
        pos += os;
        // trailing lookup3 checksum, present but not verified
        win.bytes(pos, 4)?;

        Ok(Superblock {
            version,
            size_of_offsets,
            size_of_lengths,
            consistency_flags,
            base_address,
            eof_address,
            root_object_header_address,
        })
    }
}
