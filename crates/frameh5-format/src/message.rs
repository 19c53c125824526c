//! Header message type ids and the tagged message variant.
//!
//! Dispatch on the numeric type id happens exactly once, in
//! [`Message::parse`]; use sites match on the resulting variant.

use crate::data_layout::DataLayout;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::H5Error;
use crate::filter_pipeline::FilterPipeline;
use crate::link::{LinkInfoMessage, LinkMessage};
use crate::object_header::HeaderMessage;
use crate::symbol_table::SymbolTableMessage;

/// Numeric message type ids this reader knows about.
pub mod type_id {
    pub const NIL: u16 = 0x0000;
    pub const DATASPACE: u16 = 0x0001;
    pub const LINK_INFO: u16 = 0x0002;
    pub const DATATYPE: u16 = 0x0003;
    pub const FILL_VALUE_OLD: u16 = 0x0004;
    pub const FILL_VALUE: u16 = 0x0005;
    pub const LINK: u16 = 0x0006;
    pub const DATA_LAYOUT: u16 = 0x0008;
    pub const GROUP_INFO: u16 = 0x000A;
    pub const FILTER_PIPELINE: u16 = 0x000B;
    pub const ATTRIBUTE: u16 = 0x000C;
    pub const CONTINUATION: u16 = 0x0010;
    pub const SYMBOL_TABLE: u16 = 0x0011;
    pub const MODIFICATION_TIME: u16 = 0x0012;

    /// Whether `id` is a message type this reader understands (well enough
    /// to parse or deliberately ignore).
    pub fn is_known(id: u16) -> bool {
        matches!(
            id,
            NIL | DATASPACE
                | LINK_INFO
                | DATATYPE
                | FILL_VALUE_OLD
                | FILL_VALUE
                | LINK
                | DATA_LAYOUT
                | GROUP_INFO
                | FILTER_PIPELINE
                | ATTRIBUTE
                | CONTINUATION
                | SYMBOL_TABLE
                | MODIFICATION_TIME
        )
    }
}

/// A header message parsed into its typed form.
#[derive(Debug, Clone)]
pub enum Message {
    Dataspace(Dataspace),
    Datatype(Datatype),
    DataLayout(DataLayout),
    Link(LinkMessage),
    LinkInfo(LinkInfoMessage),
    SymbolTable(SymbolTableMessage),
    FilterPipeline(FilterPipeline),
    /// Anything else, kept only by its raw type id.
    Other(u16),
}

impl Message {
    /// Parse a raw header message into its typed variant.
    pub fn parse(
        msg: &HeaderMessage,
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<Message, H5Error> {
        Ok(match msg.type_id {
            type_id::DATASPACE => {
                Message::Dataspace(Dataspace::parse(&msg.data, size_of_lengths)?)
            }
            type_id::DATATYPE => Message::Datatype(Datatype::parse(&msg.data)?),
            type_id::DATA_LAYOUT => Message::DataLayout(DataLayout::parse(
                &msg.data,
                size_of_offsets,
                size_of_lengths,
            )?),
            type_id::LINK => Message::Link(LinkMessage::parse(&msg.data, size_of_offsets)?),
            type_id::LINK_INFO => {
                Message::LinkInfo(LinkInfoMessage::parse(&msg.data, size_of_offsets)?)
            }
            type_id::SYMBOL_TABLE => {
                Message::SymbolTable(SymbolTableMessage::parse(&msg.data, size_of_offsets)?)
            }
            type_id::FILTER_PIPELINE => {
                Message::FilterPipeline(FilterPipeline::parse(&msg.data)?)
            }
            other => Message::Other(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(type_id: u16, data: Vec<u8>) -> HeaderMessage {
        HeaderMessage {
            type_id,
            flags: 0,
            creation_order: None,
            data,
        }
    }

    #[test]
    fn dispatch_by_type_id() {
        let mut dataspace = vec![1u8, 0, 0, 0];
        dataspace.extend_from_slice(&[0u8; 4]);
        let msg = Message::parse(&raw(type_id::DATASPACE, dataspace), 8, 8).unwrap();
        assert!(matches!(msg, Message::Dataspace(_)));

        let mut symtab = Vec::new();
        symtab.extend_from_slice(&0x100u64.to_le_bytes());
        symtab.extend_from_slice(&0x200u64.to_le_bytes());
        let msg = Message::parse(&raw(type_id::SYMBOL_TABLE, symtab), 8, 8).unwrap();
        assert!(matches!(msg, Message::SymbolTable(_)));
    }

    #[test]
    fn unknown_types_become_other() {
        let msg = Message::parse(&raw(0x00EE, vec![1, 2, 3]), 8, 8).unwrap();
        assert!(matches!(msg, Message::Other(0x00EE)));
        // ignored-but-known ids also pass through untyped
        let msg = Message::parse(&raw(type_id::ATTRIBUTE, vec![]), 8, 8).unwrap();
        assert!(matches!(msg, Message::Other(0x000C)));
    }

    #[test]
    fn malformed_payload_propagates() {
        let err = Message::parse(&raw(type_id::DATATYPE, vec![0x10]), 8, 8).unwrap_err();
        assert!(matches!(err, H5Error::OutOfRange { .. }));
    }

    #[test]
    fn known_ids() {
        assert!(type_id::is_known(type_id::LINK));
        assert!(type_id::is_known(type_id::CONTINUATION));
        assert!(!type_id::is_known(0x00EE));
        assert!(!type_id::is_known(0x0007));
    }
}
