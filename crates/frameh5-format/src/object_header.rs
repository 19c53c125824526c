//! Object header parsing (v1 and v2).
//!
//! An object header is a stream of tagged messages describing one group or
//! dataset. Continuation messages splice in further byte ranges; iteration
//! follows them transparently, so callers always see one flat message list.

use crate::error::H5Error;
use crate::message::type_id;
use crate::window::Window;

const OHDR: [u8; 4] = *b"OHDR";
const OCHK: [u8; 4] = *b"OCHK";

/// One header message, with its payload copied out of the window.
#[derive(Debug, Clone)]
pub struct HeaderMessage {
    /// Raw message type id.
    pub type_id: u16,
    /// Message flags byte.
    pub flags: u8,
    /// Creation order (v2 headers with tracking enabled).
    pub creation_order: Option<u16>,
    /// Message payload bytes.
    pub data: Vec<u8>,
}

/// A parsed object header: all non-nil messages from all chunks.
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    /// Header version (1 or 2).
    pub version: u8,
    /// Messages in file order, continuations spliced in.
    pub messages: Vec<HeaderMessage>,
}

/// `(address, length)` of a continuation block, from a type-16 payload.
fn continuation_target(
    payload: &[u8],
    size_of_offsets: u8,
    size_of_lengths: u8,
) -> Result<(usize, usize), H5Error> {
    let pw = Window::new(payload);
    let addr = pw.uint_at(0, size_of_offsets)? as usize;
    let len = pw.uint_at(size_of_offsets as usize, size_of_lengths)? as usize;
    Ok((addr, len))
}

/// Nil messages vanish; unknown messages survive unless marked
/// must-understand (flag bit 3), which this reader cannot honor.
fn keep_message(type_id_raw: u16, flags: u8) -> Result<bool, H5Error> {
    if type_id_raw == type_id::NIL {
        return Ok(false);
    }
    if !type_id::is_known(type_id_raw) && flags & 0x08 != 0 {
        return Err(H5Error::UnsupportedMessage(type_id_raw));
    }
    Ok(true)
}

impl ObjectHeader {
    /// Parse the object header at `addr`.
    pub fn parse(
        win: Window<'_>,
        addr: u64,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<ObjectHeader, H5Error> {
        let base = addr as usize;
        if win.has_signature(base, &OHDR) {
            Self::parse_v2(win, base, size_of_offsets, size_of_lengths)
        } else {
            Self::parse_v1(win, base, size_of_offsets, size_of_lengths)
        }
    }

    /// Messages of the given type, in file order.
    pub fn messages_of(&self, wanted: u16) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.type_id == wanted)
    }

    /// First message of the given type, if any.
    pub fn find(&self, wanted: u16) -> Option<&HeaderMessage> {
        self.messages_of(wanted).next()
    }

    fn parse_v1(
        win: Window<'_>,
        base: usize,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<ObjectHeader, H5Error> {
        let version = win.u8_at(base)?;
        if version != 1 {
            return Err(H5Error::BadVersion {
                structure: "object header",
                version,
            });
        }
        let message_count = win.u16_at(base + 2)? as usize;
        let header_size = win.u32_at(base + 8)? as usize;

        // The 12-byte prefix is padded to 8-byte alignment before messages.
        let start = base + 16;
        win.bytes(start, header_size)?;

        let mut messages = Vec::with_capacity(message_count);
        let mut blocks = vec![(start, header_size)];
        let mut remaining = message_count;

        while let Some((block_start, block_len)) = blocks.pop() {
            let end = block_start + block_len;
            let mut pos = block_start;
            // Each v1 message: type(2) size(2) flags(1) reserved(3) payload.
            while remaining > 0 && pos + 8 <= end {
                let msg_type = win.u16_at(pos)?;
                let msg_size = win.u16_at(pos + 2)? as usize;
                let msg_flags = win.u8_at(pos + 4)?;
                pos += 8;
                if pos + msg_size > end {
                    break;
                }
                let payload = win.bytes(pos, msg_size)?;
                pos += msg_size;
                remaining -= 1;

                if msg_type == type_id::CONTINUATION {
                    let (addr, len) =
                        continuation_target(payload, size_of_offsets, size_of_lengths)?;
                    win.bytes(addr, len)?;
                    blocks.push((addr, len));
                    continue;
                }
                if keep_message(msg_type, msg_flags)? {
                    messages.push(HeaderMessage {
                        type_id: msg_type,
                        flags: msg_flags,
                        creation_order: None,
                        data: payload.to_vec(),
                    });
                }
            }
        }

        Ok(ObjectHeader {
            version: 1,
            messages,
        })
    }

    fn parse_v2(
        win: Window<'_>,
        base: usize,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<ObjectHeader, H5Error> {
        win.expect_signature(base, &OHDR, "object header")?;
        let version = win.u8_at(base + 4)?;
        if version != 2 {
            return Err(H5Error::BadVersion {
                structure: "object header",
                version,
            });
        }
        let flags = win.u8_at(base + 5)?;
        let mut pos = base + 6;

        // Timestamps (flags bit 2): four u32 values.
        if flags & 0x04 != 0 {
            win.bytes(pos, 16)?;
            pos += 16;
        }
        // Attribute storage thresholds (flags bit 4).
        if flags & 0x10 != 0 {
            win.bytes(pos, 4)?;
            pos += 4;
        }

        // Size-of-chunk-0 width from flags bits 0-1.
        let size_width = 1u8 << (flags & 0x03);
        let chunk0_size = win.uint_at(pos, size_width)? as usize;
        pos += size_width as usize;

        // Chunk 0 runs to chunk0_size, then a 4-byte checksum (skipped).
        win.bytes(pos + chunk0_size, 4)?;
        let track_order = flags & 0x04 != 0;
        let head = if track_order { 6usize } else { 4 };

        let mut messages = Vec::new();
        // (message span start, span end); chunk 0 has no signature of its own
        let mut spans = vec![(pos, pos + chunk0_size)];
        let mut continuations: Vec<(usize, usize)> = Vec::new();

        loop {
            let (msg_start, msg_end) = match spans.pop() {
                Some(span) => span,
                None => match continuations.pop() {
                    // Continuation blocks carry an OCHK signature and a
                    // trailing 4-byte checksum around their message span.
                    Some((addr, len)) => {
                        if len < 8 {
                            return Err(H5Error::OutOfRange {
                                expected: 8,
                                available: len,
                            });
                        }
                        win.bytes(addr, len)?;
                        win.expect_signature(addr, &OCHK, "continuation block")?;
                        (addr + 4, addr + len - 4)
                    }
                    None => break,
                },
            };

            // Each v2 message: type(1) size(2) flags(1) [creation_order(2)].
            let mut p = msg_start;
            while p + head <= msg_end {
                let msg_type = win.u8_at(p)? as u16;
                let msg_size = win.u16_at(p + 1)? as usize;
                let msg_flags = win.u8_at(p + 3)?;
                let creation_order = if track_order {
                    Some(win.u16_at(p + 4)?)
                } else {
                    None
                };
                p += head;
                if p + msg_size > msg_end {
                    break;
                }
                let payload = win.bytes(p, msg_size)?;
                p += msg_size;

                if msg_type == type_id::CONTINUATION {
                    let (addr, len) =
                        continuation_target(payload, size_of_offsets, size_of_lengths)?;
                    continuations.push((addr, len));
                    continue;
                }
                if keep_message(msg_type, msg_flags)? {
                    messages.push(HeaderMessage {
                        type_id: msg_type,
                        flags: msg_flags,
                        creation_order,
                        data: payload.to_vec(),
                    });
                }
            }
        }

        Ok(ObjectHeader {
            version: 2,
            messages,
        })
    }
}
