//! Error types for HDF5 format parsing.

use core::fmt;

/// Coarse classification of a parse failure, used by callers that map
/// errors onto an external contract (the plugin shim's integer codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed bytes: bad signature, impossible size field, bad version.
    Format,
    /// Well-formed but outside the supported subset.
    Unsupported,
    /// A name, path, or chunk key that does not exist.
    NotFound,
    /// A read past the end of the file window.
    Io,
    /// The caller supplied a nonsensical argument.
    Argument,
}

/// Errors produced while parsing HDF5 structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H5Error {
    /// A read would cross the end of the file window.
    OutOfRange {
        /// End offset the read needed.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// The HDF5 magic signature was not found at any candidate offset.
    SignatureNotFound,
    /// A structure signature (TREE, HEAP, SNOD, ...) did not match.
    BadSignature(&'static str),
    /// A structure carried a version this reader cannot parse.
    BadVersion {
        /// Which structure.
        structure: &'static str,
        /// The version byte found.
        version: u8,
    },
    /// Superblock version other than 0, 2, or 3.
    UnsupportedSuperblockVersion(u8),
    /// Offset or length size that is not 1, 2, 4, or 8.
    BadSizeField(u8),
    /// Unknown header message marked must-understand.
    UnsupportedMessage(u16),
    /// Datatype class other than fixed-point or floating-point.
    UnsupportedDatatypeClass(u8),
    /// Data layout class this reader cannot serve reads from.
    UnsupportedLayoutClass(u8),
    /// Chunk index other than the v1 B-tree.
    UnsupportedChunkIndex(u8),
    /// Fractal heap id of huge or tiny type.
    UnsupportedHeapId(u8),
    /// Link type code other than hard, soft, or external.
    BadLinkType(u8),
    /// Invalid dataspace type byte (v2).
    BadDataspaceType(u8),
    /// B-tree node of an unexpected type for this traversal.
    BadNodeType(u8),
    /// A name missing from a group, or a path that does not resolve.
    NotFound(String),
    /// No chunk stored at the requested origin.
    ChunkNotFound,
    /// Soft-link expansion exceeded the resolver depth cap.
    LinkDepthExceeded,
    /// Decoded chunk length differs from the chunk's nominal size.
    ChunkSizeMismatch {
        /// Bytes the chunk shape requires.
        expected: usize,
        /// Bytes the decode pipeline produced.
        actual: usize,
    },
    /// A filter in the pipeline failed to decode.
    FilterFailed {
        /// Filter identification value.
        filter_id: u16,
        /// Decoder-provided reason.
        reason: String,
    },
    /// No decoder registered for a filter the chunk needs.
    UnsupportedFilter(u16),
    /// The caller asked for something structurally impossible.
    BadArgument(&'static str),
}

impl H5Error {
    /// The coarse kind of this error, per the failure-semantics contract.
    pub fn kind(&self) -> ErrorKind {
        match self {
            H5Error::OutOfRange { .. } => ErrorKind::Io,
            H5Error::SignatureNotFound
            | H5Error::BadSignature(_)
            | H5Error::BadVersion { .. }
            | H5Error::BadSizeField(_)
            | H5Error::BadLinkType(_)
            | H5Error::BadDataspaceType(_)
            | H5Error::BadNodeType(_)
            | H5Error::ChunkSizeMismatch { .. }
            | H5Error::FilterFailed { .. } => ErrorKind::Format,
            H5Error::UnsupportedSuperblockVersion(_)
            | H5Error::UnsupportedMessage(_)
            | H5Error::UnsupportedDatatypeClass(_)
            | H5Error::UnsupportedLayoutClass(_)
            | H5Error::UnsupportedChunkIndex(_)
            | H5Error::UnsupportedHeapId(_)
            | H5Error::UnsupportedFilter(_) => ErrorKind::Unsupported,
            H5Error::NotFound(_) | H5Error::ChunkNotFound | H5Error::LinkDepthExceeded => {
                ErrorKind::NotFound
            }
            H5Error::BadArgument(_) => ErrorKind::Argument,
        }
    }
}

impl fmt::Display for H5Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            H5Error::OutOfRange {
                expected,
                available,
            } => {
                write!(f, "read past end of window: need {expected} bytes, have {available}")
            }
            H5Error::SignatureNotFound => {
                write!(f, "HDF5 signature not found at any candidate offset")
            }
            H5Error::BadSignature(s) => write!(f, "bad {s} signature"),
            H5Error::BadVersion { structure, version } => {
                write!(f, "bad {structure} version: {version}")
            }
            H5Error::UnsupportedSuperblockVersion(v) => {
                write!(f, "unsupported superblock version: {v}")
            }
            H5Error::BadSizeField(s) => {
                write!(f, "bad offset/length size: {s} (must be 1, 2, 4, or 8)")
            }
            H5Error::UnsupportedMessage(id) => {
                write!(f, "unknown message type {id:#06x} marked must-understand")
            }
            H5Error::UnsupportedDatatypeClass(c) => {
                write!(f, "unsupported datatype class: {c}")
            }
            H5Error::UnsupportedLayoutClass(c) => {
                write!(f, "unsupported data layout class: {c}")
            }
            H5Error::UnsupportedChunkIndex(t) => {
                write!(f, "unsupported chunk index type: {t}")
            }
            H5Error::UnsupportedHeapId(t) => {
                write!(f, "unsupported fractal heap id type: {t}")
            }
            H5Error::BadLinkType(t) => write!(f, "bad link type: {t}"),
            H5Error::BadDataspaceType(t) => write!(f, "bad dataspace type: {t}"),
            H5Error::BadNodeType(t) => write!(f, "unexpected B-tree node type: {t}"),
            H5Error::NotFound(name) => write!(f, "not found: {name}"),
            H5Error::ChunkNotFound => write!(f, "no chunk stored at the requested origin"),
            H5Error::LinkDepthExceeded => {
                write!(f, "soft link expansion exceeded resolver depth cap")
            }
            H5Error::ChunkSizeMismatch { expected, actual } => {
                write!(f, "chunk size mismatch: expected {expected} bytes, got {actual}")
            }
            H5Error::FilterFailed { filter_id, reason } => {
                write!(f, "filter {filter_id} failed: {reason}")
            }
            H5Error::UnsupportedFilter(id) => write!(f, "no decoder for filter {id}"),
            H5Error::BadArgument(what) => write!(f, "bad argument: {what}"),
        }
    }
}

impl std::error::Error for H5Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_contract() {
        assert_eq!(
            H5Error::OutOfRange { expected: 8, available: 4 }.kind(),
            ErrorKind::Io
        );
        assert_eq!(H5Error::SignatureNotFound.kind(), ErrorKind::Format);
        assert_eq!(
            H5Error::UnsupportedDatatypeClass(6).kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(H5Error::ChunkNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            H5Error::NotFound("entry".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(H5Error::BadArgument("frame").kind(), ErrorKind::Argument);
    }

    #[test]
    fn display_mentions_the_interesting_number() {
        let msg = H5Error::UnsupportedSuperblockVersion(1).to_string();
        assert!(msg.contains('1'));
        let msg = H5Error::ChunkSizeMismatch { expected: 100, actual: 90 }.to_string();
        assert!(msg.contains("100") && msg.contains("90"));
    }
}
