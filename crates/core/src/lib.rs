//! lectern - PDF object reader, cross-reference resolver and content
//! stream writer.
//!
//! [`PdfReader`] opens a document, repairs a broken cross-reference
//! section by scanning the file, decrypts and resolves objects on demand
//! and exposes the flattened page tree. [`PdfFileWriter`] writes a
//! document back out and [`ContentWriter`] produces page content.

pub mod codec;
pub mod content;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;
pub mod utils;

pub use content::ContentWriter;
pub use document::{PdfFileWriter, PdfReader, ReaderOptions, WriterOptions};
pub use error::{PdfError, Result};
pub use model::{ObjRef, PdfDict, PdfObject, PdfStream, PdfString};
