//! Error type of the high-level API.

use std::fmt;

use frameh5_format::{ErrorKind, H5Error};

/// Errors from opening files and reading datasets.
#[derive(Debug)]
pub enum Error {
    /// Filesystem or mapping failure.
    Io(std::io::Error),
    /// Byte-level parse failure.
    Format(H5Error),
    /// The path resolved to a group, not a dataset.
    NotADataset(String),
    /// External links chained past the redirect cap.
    TooManyRedirects(String),
}

impl Error {
    /// Coarse failure kind, folding IO failures into the format crate's
    /// classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Format(e) => e.kind(),
            Error::NotADataset(_) => ErrorKind::NotFound,
            Error::TooManyRedirects(_) => ErrorKind::NotFound,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Format(e) => write!(f, "HDF5 format error: {e}"),
            Error::NotADataset(path) => write!(f, "not a dataset: {path}"),
            Error::TooManyRedirects(path) => {
                write!(f, "external links nested too deeply resolving {path}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<H5Error> for Error {
    fn from(e: H5Error) -> Self {
        Error::Format(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
