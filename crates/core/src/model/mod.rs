//! PDF object model.
//!
//! - `objects` - the object variants (PdfObject, PdfDict, PdfStream, ObjRef)
//! - `serialize` - writing objects back out as PDF syntax

pub mod objects;
pub mod serialize;

pub use objects::{ObjRef, ObjectSink, PdfDict, PdfObject, PdfStream, PdfString, TextEncoding};
