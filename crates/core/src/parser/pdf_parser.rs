//! PDF object parser - builds objects from tokens.
//!
//! Arrays and dictionaries are assembled on an explicit frame stack rather
//! than by recursion, so hostile nesting depth costs heap, not call stack.

use super::lexer::{TokenType, Tokenizer};
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, PdfDict, PdfObject, PdfString};
use tracing::{debug, warn};

/// Bytes after `/Length` that may hold the `endstream` marker.
const ENDSTREAM_WINDOW: usize = 20;
/// How far back from `endobj` to look for a missed `endstream`.
const ENDOBJ_BACKTRACK: usize = 16;

/// Container under construction.
enum Frame {
    Array(Vec<PdfObject>),
    Dict { dict: PdfDict, key: Option<String> },
}

/// An indirect object as found in the file, before stream length resolution.
#[derive(Debug)]
pub struct RawIndirect {
    pub id: ObjRef,
    /// The object, or the stream dictionary when `stream_start` is set.
    pub object: PdfObject,
    /// Offset of the first stream payload byte.
    pub stream_start: Option<usize>,
}

/// PDF Parser - parses PDF object syntax
pub struct ObjectParser<'a> {
    tok: Tokenizer<'a>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            tok: Tokenizer::new(data),
        }
    }

    /// Parser positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        let mut parser = Self::new(data);
        parser.tok.seek(pos);
        parser
    }

    pub fn tokenizer(&mut self) -> &mut Tokenizer<'a> {
        &mut self.tok
    }

    pub fn tell(&self) -> usize {
        self.tok.tell()
    }

    pub fn seek(&mut self, pos: usize) {
        self.tok.seek(pos);
    }

    fn malformed(&self, msg: impl Into<String>) -> PdfError {
        PdfError::MalformedToken {
            pos: self.tok.token_start(),
            msg: msg.into(),
        }
    }

    /// Reads one complete object starting at the current position.
    pub fn read_object(&mut self) -> Result<PdfObject> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if !self.tok.next_valid_token()? {
                return Err(PdfError::UnexpectedEof {
                    pos: self.tok.tell(),
                    msg: if stack.is_empty() {
                        "expected an object"
                    } else {
                        "unterminated array or dictionary"
                    },
                });
            }

            let value = match self.tok.token_type() {
                TokenType::StartArray => {
                    stack.push(Frame::Array(Vec::new()));
                    continue;
                }
                TokenType::StartDict => {
                    stack.push(Frame::Dict {
                        dict: PdfDict::new(),
                        key: None,
                    });
                    continue;
                }
                TokenType::EndArray => match stack.pop() {
                    Some(Frame::Array(items)) => PdfObject::Array(items),
                    Some(frame) => {
                        debug!(pos = self.tok.token_start(), "stray ']' inside dictionary");
                        stack.push(frame);
                        continue;
                    }
                    None => return Err(self.malformed("unexpected ']'")),
                },
                TokenType::EndDict => match stack.pop() {
                    Some(Frame::Dict { dict, key }) => {
                        if let Some(k) = key {
                            debug!(key = %k, "dictionary key without value");
                        }
                        PdfObject::Dictionary(dict)
                    }
                    Some(frame) => {
                        debug!(pos = self.tok.token_start(), "stray '>>' inside array");
                        stack.push(frame);
                        continue;
                    }
                    None => return Err(self.malformed("unexpected '>>'")),
                },
                TokenType::Number => PdfObject::Number(self.tok.number_value()),
                TokenType::Ref => PdfObject::Reference(self.tok.reference()),
                TokenType::Name => PdfObject::Name(self.tok.string_value()),
                TokenType::String => {
                    let hex = self.tok.is_hex_string();
                    let bytes = self.tok.take_bytes();
                    let mut s = PdfString::new(bytes);
                    s.hex = hex;
                    PdfObject::String(s)
                }
                TokenType::Other => match self.tok.bytes() {
                    b"null" => PdfObject::Null,
                    b"true" => PdfObject::Boolean(true),
                    b"false" => PdfObject::Boolean(false),
                    kw => {
                        if stack.is_empty() {
                            return Err(self.malformed(format!(
                                "unexpected keyword '{}'",
                                String::from_utf8_lossy(kw)
                            )));
                        }
                        warn!(
                            pos = self.tok.token_start(),
                            keyword = %String::from_utf8_lossy(kw),
                            "skipping keyword inside container"
                        );
                        continue;
                    }
                },
                TokenType::Comment | TokenType::EndOfFile => continue,
            };

            match stack.last_mut() {
                None => return Ok(value),
                Some(Frame::Array(items)) => items.push(value),
                Some(Frame::Dict { dict, key }) => match key.take() {
                    None => match value {
                        PdfObject::Name(n) => *key = Some(n),
                        other => debug!(got = other.type_name(), "non-name dictionary key skipped"),
                    },
                    // a null value is the same as an absent entry
                    Some(k) if value.is_null() => {
                        dict.remove(&k);
                    }
                    Some(k) => {
                        dict.insert(k, value);
                    }
                },
            }
        }
    }

    /// Reads `N G obj` and returns the identifier.
    pub fn read_indirect_header(&mut self) -> Result<ObjRef> {
        if !self.tok.next_token()? || self.tok.token_type() != TokenType::Number {
            return Err(self.malformed("expected object number"));
        }
        let num = self.tok.number_value();
        if !self.tok.next_token()? || self.tok.token_type() != TokenType::Number {
            return Err(self.malformed("expected generation number"));
        }
        let generation = self.tok.number_value();
        if !self.tok.next_token()? || !self.tok.is_keyword(b"obj") {
            return Err(self.malformed("expected 'obj' keyword"));
        }
        if num < 0.0 || generation < 0.0 || generation > u16::MAX as f64 {
            return Err(self.malformed("object identifier out of range"));
        }
        Ok(ObjRef::new(num as u32, generation as u16))
    }

    /// Reads a whole indirect object: header, body and stream marker.
    pub fn read_indirect_object(&mut self) -> Result<RawIndirect> {
        let id = self.read_indirect_header()?;
        let object = self.read_object()?;
        let stream_start = match object {
            PdfObject::Dictionary(_) => self.stream_data_start()?,
            _ => None,
        };
        Ok(RawIndirect {
            id,
            object,
            stream_start,
        })
    }

    /// After a dictionary: consumes the `stream` keyword if present and
    /// returns the payload offset. Exactly one EOL (CR, LF or CRLF) is skipped.
    pub fn stream_data_start(&mut self) -> Result<Option<usize>> {
        let save = self.tok.tell();
        if !self.tok.next_token()? || !self.tok.is_keyword(b"stream") {
            self.tok.seek(save);
            return Ok(None);
        }
        let data = self.tok.data();
        let mut pos = self.tok.tell();
        match data.get(pos) {
            Some(b'\r') if data.get(pos + 1) == Some(&b'\n') => pos += 2,
            Some(b'\r') | Some(b'\n') => pos += 1,
            _ => {}
        }
        self.tok.seek(pos);
        Ok(Some(pos))
    }

    /// Reads one member of an object stream. A bare number is taken as is,
    /// without looking ahead for `G R` in the next member's bytes.
    pub fn read_object_stream_member(&mut self) -> Result<PdfObject> {
        let start = self.tok.tell();
        if self.tok.next_token()? && self.tok.token_type() == TokenType::Number {
            return Ok(PdfObject::Number(self.tok.number_value()));
        }
        self.tok.seek(start);
        self.read_object()
    }
}

const ENDSTREAM_MARKERS: [&[u8]; 4] = [b"\nendstream", b"\r\nendstream", b"\rendstream", b"endstream"];

fn starts_with_endstream(window: &[u8]) -> bool {
    ENDSTREAM_MARKERS.iter().any(|marker| window.starts_with(marker))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the stream payload that starts at `start`.
///
/// A declared length is accepted only when `endstream` follows it within a
/// few bytes. Otherwise the payload runs up to the first `endstream` (or,
/// failing that, the first `endobj`, checking just before it for a missed
/// `endstream`), minus one trailing EOL. The flag is true when the length
/// was recovered by scanning.
pub fn resolve_stream_length(data: &[u8], start: usize, declared: Option<usize>) -> (usize, bool) {
    if let Some(len) = declared
        && let Some(end) = start.checked_add(len)
        && end.saturating_add(ENDSTREAM_WINDOW) <= data.len()
        && starts_with_endstream(&data[end..end + ENDSTREAM_WINDOW])
    {
        return (len, false);
    }
    if let Some(len) = declared
        && let Some(end) = start.checked_add(len)
        && end <= data.len()
        && starts_with_endstream(&data[end..])
    {
        return (len, false);
    }

    let body = &data[start.min(data.len())..];
    let endstream = find(body, b"endstream");
    let endobj = find(body, b"endobj");
    let mut end = match (endstream, endobj) {
        (Some(s), Some(o)) if o < s => backtrack_endobj(body, o),
        (Some(s), _) => s,
        (None, Some(o)) => backtrack_endobj(body, o),
        (None, None) => body.len(),
    };
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && body[end - 1] == b'\r' {
        end -= 1;
    }
    debug!(start, declared = ?declared, recovered = end, "stream length recovered by scan");
    (end, true)
}

fn backtrack_endobj(body: &[u8], endobj: usize) -> usize {
    let from = endobj.saturating_sub(ENDOBJ_BACKTRACK);
    match find(&body[from..endobj], b"endstream") {
        Some(i) => from + i,
        None => endobj,
    }
}
