//! Error types for the lectern PDF engine.

use thiserror::Error;

/// Primary error type for reading, decoding and writing PDF structures.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("malformed token at byte {pos}: {msg}")]
    MalformedToken { pos: usize, msg: String },

    #[error("unexpected end of input at byte {pos}: {msg}")]
    UnexpectedEof { pos: usize, msg: &'static str },

    #[error("structural corruption: {0}")]
    StructuralCorruption(String),

    #[error("cyclic structure: {0}")]
    CyclicStructure(String),

    #[error("xref rebuild failed: {0}")]
    RebuildFailure(String),

    #[error("PDF header signature not found")]
    InvalidHeader,

    #[error("bad user password")]
    BadPassword,

    #[error("no recipient matches the supplied certificate")]
    NoMatchingRecipient,

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("illegal content stream syntax: {0}")]
    IllegalSyntax(String),

    #[error("{filter} decode error: {msg}")]
    Decode { filter: &'static str, msg: String },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("PDF object not found: {0}")]
    ObjectNotFound(u32),

    #[error("page {0} out of range")]
    PageOutOfRange(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Failures in the primary xref mechanism or document objects that the
    /// reader answers with one full-file rebuild before giving up.
    pub fn triggers_rebuild(&self) -> bool {
        matches!(
            self,
            PdfError::StructuralCorruption(_)
                | PdfError::MalformedToken { .. }
                | PdfError::UnexpectedEof { .. }
                | PdfError::ObjectNotFound(_)
                | PdfError::TypeError { .. }
                | PdfError::Decode { .. }
        )
    }

    /// True for errors that must abort the whole operation even in lenient mode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PdfError::RebuildFailure(_)
                | PdfError::InvalidHeader
                | PdfError::BadPassword
                | PdfError::NoMatchingRecipient
                | PdfError::UnsupportedFilter(_)
                | PdfError::UnsupportedEncryption(_)
                | PdfError::IllegalSyntax(_)
                | PdfError::CyclicStructure(_)
                | PdfError::Io(_)
        )
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        PdfError::StructuralCorruption(msg.into())
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
