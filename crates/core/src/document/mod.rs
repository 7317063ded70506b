//! Document layer - everything above single objects.
//!
//! This module contains:
//! - `xref` - cross-reference tables, xref streams and the rebuild scan
//! - `reader` - PdfReader: object loading, caching, decryption, object streams
//! - `pages` - page tree flattening, page access and page selection
//! - `outline` - bookmarks
//! - `writer` - PdfFileWriter, full-document output
//! - `options` - ReaderOptions and WriterOptions
//! - `security` - standard and public-key security handlers
//! - `saslprep` - RFC 4013 SASLprep for AES-256 passwords

pub mod options;
pub mod outline;
pub mod pages;
pub mod reader;
pub mod saslprep;
pub mod security;
pub mod writer;
pub mod xref;

pub use options::{ReaderOptions, WriterOptions};
pub use outline::OutlineItem;
pub use pages::{INHERITABLE, parse_page_ranges};
pub use reader::PdfReader;
pub use saslprep::saslprep;
pub use security::{
    CryptoMode, Decryptor, PASSWORD_PADDING, PublicKeySecurityHandler, RecipientUnwrapper,
    StandardSecurityHandler, Target, create_decryptor,
};
pub use writer::PdfFileWriter;
pub use xref::{XrefSlot, XrefTable};
