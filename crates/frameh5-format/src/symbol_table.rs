//! Symbol table message and node (SNOD) parsing for classic groups.

use crate::error::H5Error;
use crate::window::Window;

const SNOD: [u8; 4] = *b"SNOD";

/// Symbol Table message (type 0x0011) from a classic group's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableMessage {
    /// Address of the group's v1 B-tree (node type 0).
    pub btree_address: u64,
    /// Address of the group's local heap.
    pub local_heap_address: u64,
}

impl SymbolTableMessage {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8], size_of_offsets: u8) -> Result<SymbolTableMessage, H5Error> {
        let w = Window::new(payload);
        Ok(SymbolTableMessage {
            btree_address: w.uint_at(0, size_of_offsets)?,
            local_heap_address: w.uint_at(size_of_offsets as usize, size_of_offsets)?,
        })
    }
}

/// One entry of a symbol table node.
#[derive(Debug, Clone, Copy)]
pub struct SymbolTableEntry {
    /// Offset of the link name in the group's local heap.
    pub link_name_offset: u64,
    /// Address of the child's object header.
    pub object_header_address: u64,
}

/// A symbol table node: the leaf payload of a classic group B-tree.
#[derive(Debug, Clone)]
pub struct SymbolTableNode {
    /// Entries in name order.
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    /// Parse the SNOD at `addr`.
    pub fn parse(
        win: Window<'_>,
        addr: u64,
        size_of_offsets: u8,
    ) -> Result<SymbolTableNode, H5Error> {
        let base = addr as usize;
        win.expect_signature(base, &SNOD, "symbol table node")?;
        let version = win.u8_at(base + 4)?;
        if version != 1 {
            return Err(H5Error::BadVersion {
                structure: "symbol table node",
                version,
            });
        }
        let count = win.u16_at(base + 6)? as usize;

        let os = size_of_offsets as usize;
        // link_name_offset(os) + header_addr(os) + cache_type(4) + reserved(4)
        // + scratch(16)
        let entry_size = os * 2 + 24;
        win.bytes(base + 8, count * entry_size)?;

        let mut entries = Vec::with_capacity(count);
        let mut pos = base + 8;
        for _ in 0..count {
            let link_name_offset = win.uint_at(pos, size_of_offsets)?;
            let object_header_address = win.uint_at(pos + os, size_of_offsets)?;
            entries.push(SymbolTableEntry {
                link_name_offset,
                object_header_address,
            });
            pos += entry_size;
        }
        Ok(SymbolTableNode { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_snod(entries: &[(u64, u64)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&SNOD);
        buf.push(1); // version
        buf.push(0); // reserved
        buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for &(name_off, header_addr) in entries {
            buf.extend_from_slice(&name_off.to_le_bytes());
            buf.extend_from_slice(&header_addr.to_le_bytes());
            buf.extend_from_slice(&[0u8; 24]); // cache type + reserved + scratch
        }
        buf
    }

    #[test]
    fn message_parse() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1000u64.to_le_bytes());
        payload.extend_from_slice(&0x2000u64.to_le_bytes());
        let msg = SymbolTableMessage::parse(&payload, 8).unwrap();
        assert_eq!(msg.btree_address, 0x1000);
        assert_eq!(msg.local_heap_address, 0x2000);
    }

    #[test]
    fn message_too_short() {
        let payload = [0u8; 8];
        assert!(matches!(
            SymbolTableMessage::parse(&payload, 8).unwrap_err(),
            H5Error::OutOfRange { .. }
        ));
    }

    #[test]
    fn node_entries() {
        let data = build_snod(&[(0, 0x100), (6, 0x200)]);
        let node = SymbolTableNode::parse(Window::new(&data), 0, 8).unwrap();
        assert_eq!(node.entries.len(), 2);
        assert_eq!(node.entries[0].link_name_offset, 0);
        assert_eq!(node.entries[0].object_header_address, 0x100);
        assert_eq!(node.entries[1].link_name_offset, 6);
    }

    #[test]
    fn bad_signature() {
        let mut data = build_snod(&[(0, 0x100)]);
        data[0] = b'X';
        assert_eq!(
            SymbolTableNode::parse(Window::new(&data), 0, 8).unwrap_err(),
            H5Error::BadSignature("symbol table node")
        );
    }

    #[test]
    fn bad_version() {
        let mut data = build_snod(&[(0, 0x100)]);
        data[4] = 2;
        assert!(matches!(
            SymbolTableNode::parse(Window::new(&data), 0, 8).unwrap_err(),
            H5Error::BadVersion { structure: "symbol table node", version: 2 }
        ));
    }
}
