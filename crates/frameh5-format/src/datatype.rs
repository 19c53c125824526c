//! Datatype message parsing (type 0x0003).
//!
//! Detector files only ever carry fixed-point and floating-point elements;
//! every other type class is rejected as unsupported.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::H5Error;

/// Byte order of stored elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrdering {
    LittleEndian,
    BigEndian,
}

/// Element type of a dataset: integer or float, with size and sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// Class 0: fixed-point integer.
    FixedPoint {
        /// Element size in bytes.
        size: u32,
        byte_order: ByteOrdering,
        signed: bool,
    },
    /// Class 1: floating point.
    FloatingPoint {
        /// Element size in bytes.
        size: u32,
        byte_order: ByteOrdering,
    },
}

impl Datatype {
    /// Parse from raw message payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Datatype, H5Error> {
        if payload.len() < 8 {
            return Err(H5Error::OutOfRange {
                expected: 8,
                available: payload.len(),
            });
        }
        let class_and_version = payload[0];
        let class = class_and_version & 0x0F;
        let version = class_and_version >> 4;
        if !(1..=3).contains(&version) {
            return Err(H5Error::BadVersion {
                structure: "datatype",
                version,
            });
        }
        let bits0 = payload[1];
        let size = LittleEndian::read_u32(&payload[4..8]);
        let byte_order = if bits0 & 0x01 == 0 {
            ByteOrdering::LittleEndian
        } else {
            ByteOrdering::BigEndian
        };

        match class {
            0 => Ok(Datatype::FixedPoint {
                size,
                byte_order,
                signed: bits0 & 0x08 != 0,
            }),
            1 => Ok(Datatype::FloatingPoint { size, byte_order }),
            other => Err(H5Error::UnsupportedDatatypeClass(other)),
        }
    }

    /// Element size in bytes.
    pub fn size(&self) -> u32 {
        match *self {
            Datatype::FixedPoint { size, .. } | Datatype::FloatingPoint { size, .. } => size,
        }
    }

    /// 0 for integers, 1 for floats (the plugin contract's type id).
    pub fn type_id(&self) -> u8 {
        match self {
            Datatype::FixedPoint { .. } => 0,
            Datatype::FloatingPoint { .. } => 1,
        }
    }

    /// Whether integer elements carry a sign; false for floats.
    pub fn is_signed(&self) -> bool {
        matches!(self, Datatype::FixedPoint { signed: true, .. })
    }
}
