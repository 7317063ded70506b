//! PDF syntax parsing.
//!
//! - `lexer`: tokenizer over raw bytes
//! - `pdf_parser`: object reader, indirect objects and stream markers

pub mod lexer;
pub mod pdf_parser;

pub use lexer::{TokenType, Tokenizer};
pub use pdf_parser::{ObjectParser, RawIndirect, resolve_stream_length};
