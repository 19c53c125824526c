//! Link and Link Info messages: the directory entries of new-style groups.

use crate::error::H5Error;
use crate::window::Window;

/// What a link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Object header address inside the same file.
    Hard(u64),
    /// In-file path, absolute or relative to the containing group.
    Soft(String),
    /// Path inside another file, to be opened by the caller.
    External {
        /// Name of the other file.
        filename: String,
        /// Path of the object within that file.
        object_path: String,
    },
}

/// A parsed Link message (type 0x0006).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    /// Link name.
    pub name: String,
    /// Link target.
    pub target: LinkTarget,
}

impl LinkMessage {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8], size_of_offsets: u8) -> Result<LinkMessage, H5Error> {
        let w = Window::new(payload);
        let version = w.u8_at(0)?;
        if version != 1 {
            return Err(H5Error::BadVersion {
                structure: "link message",
                version,
            });
        }
        let flags = w.u8_at(1)?;
        let has_link_type = flags & 0x02 != 0;
        let name_len_width = 1u8 << ((flags >> 4) & 0x03);
        let mut pos = 2usize;

        let link_type = if has_link_type {
            let t = w.u8_at(pos)?;
            pos += 1;
            t
        } else {
            0 // hard
        };
        if flags & 0x01 != 0 {
            pos += 8; // creation order
        }
        if flags & 0x04 != 0 {
            pos += 1; // character set
        }

        let name_len = w.uint_at(pos, name_len_width)? as usize;
        pos += name_len_width as usize;
        let name = String::from_utf8_lossy(w.bytes(pos, name_len)?).into_owned();
        pos += name_len;

        let target = match link_type {
            0 => LinkTarget::Hard(w.uint_at(pos, size_of_offsets)?),
            1 => {
                let len = w.u16_at(pos)? as usize;
                pos += 2;
                let path = String::from_utf8_lossy(w.bytes(pos, len)?).into_owned();
                LinkTarget::Soft(path)
            }
            64 => {
                let len = w.u16_at(pos)? as usize;
                pos += 2;
                let body = w.bytes(pos, len)?;
                // version/flags byte, then two null-terminated strings
                let rest = body.get(1..).unwrap_or(&[]);
                let cut = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                let filename = String::from_utf8_lossy(&rest[..cut]).into_owned();
                let after = &rest[(cut + 1).min(rest.len())..];
                let cut2 = after.iter().position(|&b| b == 0).unwrap_or(after.len());
                let object_path = String::from_utf8_lossy(&after[..cut2]).into_owned();
                LinkTarget::External {
                    filename,
                    object_path,
                }
            }
            other => return Err(H5Error::BadLinkType(other)),
        };

        Ok(LinkMessage { name, target })
    }

    /// Encode as message payload bytes. Only tests build link messages; the
    /// reader itself never writes.
    pub fn encode(&self, size_of_offsets: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(1); // version
        let is_hard = matches!(self.target, LinkTarget::Hard(_));
        let mut flags = 0u8;
        if !is_hard {
            flags |= 0x02;
        }
        buf.push(flags); // 1-byte name length field
        match &self.target {
            LinkTarget::Soft(_) => buf.push(1),
            LinkTarget::External { .. } => buf.push(64),
            LinkTarget::Hard(_) => {}
        }
        buf.push(self.name.len() as u8);
        buf.extend_from_slice(self.name.as_bytes());
        match &self.target {
            LinkTarget::Hard(addr) => match size_of_offsets {
                4 => buf.extend_from_slice(&(*addr as u32).to_le_bytes()),
                _ => buf.extend_from_slice(&addr.to_le_bytes()),
            },
            LinkTarget::Soft(path) => {
                buf.extend_from_slice(&(path.len() as u16).to_le_bytes());
                buf.extend_from_slice(path.as_bytes());
            }
            LinkTarget::External {
                filename,
                object_path,
            } => {
                let mut body = vec![0u8];
                body.extend_from_slice(filename.as_bytes());
                body.push(0);
                body.extend_from_slice(object_path.as_bytes());
                body.push(0);
                buf.extend_from_slice(&(body.len() as u16).to_le_bytes());
                buf.extend_from_slice(&body);
            }
        }
        buf
    }
}

/// A parsed Link Info message (type 0x0002).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfoMessage {
    /// Fractal heap holding the serialized link messages, when dense.
    pub fractal_heap_address: Option<u64>,
    /// v2 B-tree indexing links by name hash, when dense.
    pub name_index_address: Option<u64>,
}

impl LinkInfoMessage {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8], size_of_offsets: u8) -> Result<LinkInfoMessage, H5Error> {
        let w = Window::new(payload);
        let version = w.u8_at(0)?;
        if version != 0 {
            return Err(H5Error::BadVersion {
                structure: "link info message",
                version,
            });
        }
        let flags = w.u8_at(1)?;
        let mut pos = 2usize;
        if flags & 0x01 != 0 {
            pos += 8; // maximum creation order
        }
        let fractal_heap_address = w.addr_at(pos, size_of_offsets)?;
        pos += size_of_offsets as usize;
        let name_index_address = w.addr_at(pos, size_of_offsets)?;
        Ok(LinkInfoMessage {
            fractal_heap_address,
            name_index_address,
        })
    }
}
