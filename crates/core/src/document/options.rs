//! Options for opening and writing documents.
//!
//! # Example
//! ```ignore
//! use lectern_core::document::{PdfReader, ReaderOptions};
//!
//! let reader = PdfReader::open(
//!     data,
//!     ReaderOptions::new().password("secret").partial(true),
//! )?;
//! ```

use std::sync::Arc;

use crate::codec::filters::{FilterHandler, FilterRegistry};

use super::security::RecipientUnwrapper;

/// How a [`PdfReader`](super::PdfReader) opens a document.
#[derive(Clone, Default)]
pub struct ReaderOptions {
    pub(crate) password: Vec<u8>,
    pub(crate) partial: bool,
    pub(crate) lenient: bool,
    pub(crate) assume_owner_access: bool,
    pub(crate) recipient: Option<Arc<dyn RecipientUnwrapper>>,
    pub(crate) filters: FilterRegistry,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner or user password. Both are tried, owner first.
    pub fn password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.password = password.as_ref().to_vec();
        self
    }

    /// Reads objects on first access instead of at open time, and lets
    /// callers release them again.
    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Per-object read failures are logged and read as null instead of
    /// aborting.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Treat a document opened with the user password as if the owner
    /// password had been given.
    pub fn assume_owner_access(mut self, assume: bool) -> Self {
        self.assume_owner_access = assume;
        self
    }

    /// Recipient used for public-key encrypted documents.
    pub fn recipient(mut self, recipient: Arc<dyn RecipientUnwrapper>) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Registers a decoder, e.g. an image codec, for a filter name.
    pub fn filter(mut self, name: &str, handler: Arc<dyn FilterHandler>) -> Self {
        self.filters.register(name, handler);
        self
    }

    pub fn filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }
}

impl std::fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("partial", &self.partial)
            .field("lenient", &self.lenient)
            .field("assume_owner_access", &self.assume_owner_access)
            .field("recipient", &self.recipient.is_some())
            .field("filters", &self.filters)
            .finish()
    }
}

/// Output layout of [`PdfFileWriter`](super::PdfFileWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    /// Flate-compress streams that carry no filter.
    pub compress_streams: bool,
    /// Write the cross-reference section as a stream.
    pub xref_stream: bool,
    /// Pack non-stream objects into object streams. Implies `xref_stream`.
    pub object_streams: bool,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compress_streams(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }

    pub fn xref_stream(mut self, xref_stream: bool) -> Self {
        self.xref_stream = xref_stream;
        self
    }

    pub fn object_streams(mut self, object_streams: bool) -> Self {
        self.object_streams = object_streams;
        if object_streams {
            self.xref_stream = true;
        }
        self
    }

    /// Compressed streams, an xref stream and object streams.
    pub fn compact() -> Self {
        Self::new().compress_streams(true).object_streams(true)
    }
}
