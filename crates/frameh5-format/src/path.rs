//! Path resolution: slash-separated names down to an object header, or an
//! external-file redirect for the caller to chase.
//!
//! Resolution is iterative over path components. Within one component the
//! parent's messages are scanned in file order; a message that does not
//! match is simply not the one (three-valued lookup), while malformed bytes
//! abort the whole resolution. Soft links re-enter with their target
//! prepended, bounded by a depth cap; external links are never opened here.

use std::collections::VecDeque;

use crate::btree_v1;
use crate::btree_v2::BTreeV2;
use crate::checksum::lookup3;
use crate::error::H5Error;
use crate::fractal_heap::FractalHeap;
use crate::link::{LinkMessage, LinkTarget};
use crate::local_heap::LocalHeap;
use crate::message::{type_id, Message};
use crate::object_header::ObjectHeader;
use crate::window::Window;

/// Maximum soft-link expansions in one resolution.
const MAX_LINK_DEPTH: u32 = 64;

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Object header address inside this file.
    Object(u64),
    /// The object lives in another file; the caller opens it and resolves
    /// `object_path` there.
    External {
        /// Name of the other file.
        filename: String,
        /// Remaining path inside that file.
        object_path: String,
    },
}

/// Resolve `path` starting from the root group at `root_address`.
pub fn resolve(
    win: Window<'_>,
    root_address: u64,
    path: &str,
    size_of_offsets: u8,
    size_of_lengths: u8,
) -> Result<ResolvedPath, H5Error> {
    let mut components: VecDeque<String> = path
        .split('/')
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect();
    let mut current = root_address;
    let mut soft_expansions = 0u32;

    while let Some(component) = components.pop_front() {
        let header = ObjectHeader::parse(win, current, size_of_offsets, size_of_lengths)?;
        let target = lookup_in_header(
            win,
            &header,
            &component,
            size_of_offsets,
            size_of_lengths,
        )?
        .ok_or_else(|| H5Error::NotFound(component.clone()))?;

        match target {
            LinkTarget::Hard(addr) => current = addr,
            LinkTarget::Soft(soft_path) => {
                soft_expansions += 1;
                if soft_expansions > MAX_LINK_DEPTH {
                    return Err(H5Error::LinkDepthExceeded);
                }
                if soft_path.starts_with('/') {
                    current = root_address;
                }
                for part in soft_path.split('/').filter(|c| !c.is_empty()).rev() {
                    components.push_front(part.to_owned());
                }
            }
            LinkTarget::External {
                filename,
                object_path,
            } => {
                let mut full = object_path;
                for part in &components {
                    if !full.ends_with('/') {
                        full.push('/');
                    }
                    full.push_str(part);
                }
                return Ok(ResolvedPath::External {
                    filename,
                    object_path: full,
                });
            }
        }
    }

    Ok(ResolvedPath::Object(current))
}

/// Scan one header for `name`. `Ok(None)` means no message in this header
/// names it; the caller turns that into the final `NotFound`.
fn lookup_in_header(
    win: Window<'_>,
    header: &ObjectHeader,
    name: &str,
    size_of_offsets: u8,
    size_of_lengths: u8,
) -> Result<Option<LinkTarget>, H5Error> {
    for raw in &header.messages {
        match raw.type_id {
            type_id::LINK | type_id::LINK_INFO | type_id::SYMBOL_TABLE => {}
            _ => continue,
        }
        match Message::parse(raw, size_of_offsets, size_of_lengths)? {
            Message::Link(link) if link.name == name => return Ok(Some(link.target)),
            Message::Link(_) => {}
            Message::LinkInfo(info) => {
                let (heap_addr, btree_addr) =
                    match (info.fractal_heap_address, info.name_index_address) {
                        (Some(h), Some(b)) => (h, b),
                        _ => continue, // compact storage: plain Link messages
                    };
                let tree = BTreeV2::parse(win, btree_addr, size_of_offsets)?;
                let record =
                    match tree.find_by_hash(win, lookup3(name.as_bytes()), size_of_offsets)? {
                        Some(r) => r,
                        None => continue,
                    };
                let heap = FractalHeap::parse(win, heap_addr, size_of_offsets, size_of_lengths)?;
                let bytes = heap.object(win, &record.heap_id, size_of_offsets)?;
                let link = LinkMessage::parse(bytes, size_of_offsets)?;
                if link.name == name {
                    return Ok(Some(link.target));
                }
                // stored-hash collision with a different name
            }
            Message::SymbolTable(st) => {
                let heap = LocalHeap::parse(
                    win,
                    st.local_heap_address,
                    size_of_offsets,
                    size_of_lengths,
                )?;
                if let Some(addr) = btree_v1::find_group_entry(
                    win,
                    st.btree_address,
                    &heap,
                    name,
                    size_of_offsets,
                )? {
                    return Ok(Some(LinkTarget::Hard(addr)));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}
