//! Error taxonomy for LFP containers.
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `Format` | framing is broken; the bytes are not an LFP container |
//! | `InvalidPictureFile` / `InvalidStorageFile` | framing is fine, the Meta JSON does not match the schema |
//! | `MissingCapability` | an optional collaborator (video splitter) is not available |
//! | `Lookup` | the caller asked for something the model does not have |

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LfpError {
    #[error("not a valid LFP file at offset {offset}: {reason}")]
    Format { offset: u64, reason: String },
    #[error("not a valid LFP picture file: {0}")]
    InvalidPictureFile(String),
    #[error("not a valid LFP storage file: {0}")]
    InvalidStorageFile(String),
    #[error("missing capability: {0}")]
    MissingCapability(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("meta section is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LfpError {
    pub(crate) fn format(offset: u64, reason: impl Into<String>) -> Self {
        LfpError::Format { offset, reason: reason.into() }
    }
}

/// Caller-side precondition failures. Never caused by the file contents.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("container has no {0}")]
    NotBuilt(&'static str),
    #[error("{0} is empty")]
    EmptyStack(&'static str),
    #[error("depth LUT cell ({i}, {j}) outside {width}x{height}")]
    CellOutOfRange { i: usize, j: usize, width: usize, height: usize },
    #[error("query coordinate is not a finite number")]
    NonFinite,
    #[error("no chunk with content id {0}")]
    UnknownChunk(String),
    #[error("no embedded file named {0}")]
    UnknownFile(String),
    #[error("container is a {actual} file, not a {wanted} file")]
    WrongKind { wanted: &'static str, actual: &'static str },
}

pub type Result<T> = std::result::Result<T, LfpError>;
