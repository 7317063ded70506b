//! PDF tokenizer.
//!
//! Splits a byte slice into syntax tokens. Whitespace and comments are
//! skipped unless comment-awareness is requested. Malformed numbers and
//! names degrade to best-effort values; only unterminated strings are fatal.

use crate::error::{PdfError, Result};
use crate::model::objects::ObjRef;

/// Kind of the token most recently read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Number,
    String,
    Name,
    Comment,
    StartDict,
    EndDict,
    StartArray,
    EndArray,
    /// `N G R`, produced only by [`Tokenizer::next_valid_token`].
    Ref,
    /// Any keyword or stray delimiter (`obj`, `stream`, `R`, `{`, ...).
    Other,
    EndOfFile,
}

pub struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    token_start: usize,
    token_type: TokenType,
    value: Vec<u8>,
    hex: bool,
    integer: bool,
    reference: ObjRef,
    comments: bool,
}

/// Check if byte is whitespace
#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

/// Check if byte is delimiter
#[inline]
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Interprets name bytes as Latin-1 so every byte survives a round trip.
pub(crate) fn name_from_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.is_ascii() => s.to_string(),
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Best-effort numeric value of a permissive number token.
///
/// Handles repeated signs, a missing integer or fraction part, stray extra
/// dots, and malformed exponents; anything unparseable counts as zero.
pub fn parse_number_lenient(text: &[u8]) -> f64 {
    let mut i = 0;
    let mut minuses = 0;
    while i < text.len() && matches!(text[i], b'-' | b'+') {
        if text[i] == b'-' {
            minuses += 1;
        }
        i += 1;
    }
    let mut mantissa = String::new();
    let mut seen_dot = false;
    while i < text.len() {
        match text[i] {
            c @ b'0'..=b'9' => mantissa.push(c as char),
            b'.' if !seen_dot => {
                seen_dot = true;
                mantissa.push('.');
            }
            b'.' => {}
            _ => break,
        }
        i += 1;
    }
    let mut value = match mantissa.as_str() {
        "" | "." => 0.0,
        m => m.parse::<f64>().unwrap_or(0.0),
    };
    if i < text.len() && matches!(text[i], b'e' | b'E') {
        let exp: String = text[i + 1..]
            .iter()
            .enumerate()
            .take_while(|&(k, &c)| c.is_ascii_digit() || (k == 0 && matches!(c, b'-' | b'+')))
            .map(|(_, &c)| c as char)
            .collect();
        if let Ok(e) = exp.parse::<i32>() {
            value *= 10f64.powi(e);
        }
    }
    // "--5" reads as 5 for integers; a real keeps its sign
    let negative = minuses == 1 || (minuses > 1 && seen_dot);
    if negative { -value } else { value }
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            token_start: 0,
            token_type: TokenType::EndOfFile,
            value: Vec::new(),
            hex: false,
            integer: false,
            reference: ObjRef::new(0, 0),
            comments: false,
        }
    }

    /// Report comments as [`TokenType::Comment`] instead of skipping them.
    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position in stream
    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Offset of the first byte of the last token.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Decoded bytes of the last string, name, keyword, number or comment token.
    pub fn bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.value)
    }

    pub fn string_value(&self) -> String {
        name_from_bytes(&self.value)
    }

    pub fn is_hex_string(&self) -> bool {
        self.hex
    }

    /// True when the last number token had no fraction or exponent.
    pub fn is_integer(&self) -> bool {
        self.integer
    }

    pub fn number_value(&self) -> f64 {
        parse_number_lenient(&self.value)
    }

    pub fn int_value(&self) -> i64 {
        self.number_value() as i64
    }

    pub fn reference(&self) -> ObjRef {
        self.reference
    }

    /// Is the last token the keyword `kw`?
    pub fn is_keyword(&self, kw: &[u8]) -> bool {
        self.token_type == TokenType::Other && self.value == kw
    }

    /// Peek at current byte without advancing
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Peek at byte at offset from current position
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Advance position by one
    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    fn read_comment(&mut self) {
        self.advance(); // Skip '%'
        while let Some(b) = self.peek() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            self.value.push(b);
            self.pos += 1;
        }
    }

    /// Reads the next raw token. Returns `false` at end of input.
    pub fn next_token(&mut self) -> Result<bool> {
        self.value.clear();
        self.hex = false;
        self.integer = false;
        loop {
            self.skip_whitespace();
            self.token_start = self.pos;
            let Some(b) = self.peek() else {
                self.token_type = TokenType::EndOfFile;
                return Ok(false);
            };
            match b {
                b'%' => {
                    self.read_comment();
                    if self.comments {
                        self.token_type = TokenType::Comment;
                        return Ok(true);
                    }
                    self.value.clear();
                    continue;
                }
                b'[' => {
                    self.pos += 1;
                    self.token_type = TokenType::StartArray;
                }
                b']' => {
                    self.pos += 1;
                    self.token_type = TokenType::EndArray;
                }
                b'<' if self.peek_at(1) == Some(b'<') => {
                    self.pos += 2;
                    self.token_type = TokenType::StartDict;
                }
                b'<' => self.parse_hex_string()?,
                b'>' if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    self.token_type = TokenType::EndDict;
                }
                b'>' | b'{' | b'}' | b')' => {
                    self.pos += 1;
                    self.value.push(b);
                    self.token_type = TokenType::Other;
                }
                b'(' => self.parse_string()?,
                b'/' => self.parse_name(),
                b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number(),
                _ => self.parse_keyword(),
            }
            return Ok(true);
        }
    }

    /// Like [`next_token`](Self::next_token) but folds `N G R` into one
    /// [`TokenType::Ref`] token.
    pub fn next_valid_token(&mut self) -> Result<bool> {
        if !self.next_token()? {
            return Ok(false);
        }
        if self.token_type != TokenType::Number || !self.is_integer() {
            return Ok(true);
        }
        let start = self.token_start;
        let end = self.pos;
        let first = std::mem::take(&mut self.value);
        match self.lookahead_generation() {
            Ok(Some(generation)) => {
                self.reference = ObjRef::new(parse_number_lenient(&first) as u32, generation);
                self.token_type = TokenType::Ref;
                self.token_start = start;
                self.value = first;
            }
            _ => {
                self.pos = end;
                self.token_start = start;
                self.token_type = TokenType::Number;
                self.integer = true;
                self.value = first;
            }
        }
        Ok(true)
    }

    fn lookahead_generation(&mut self) -> Result<Option<u16>> {
        if self.value_is_negative_start() {
            return Ok(None);
        }
        if !self.next_token()? || self.token_type != TokenType::Number || !self.integer {
            return Ok(None);
        }
        let generation = self.number_value();
        if !(0.0..=65535.0).contains(&generation) {
            return Ok(None);
        }
        if !self.next_token()? || !self.is_keyword(b"R") {
            return Ok(None);
        }
        Ok(Some(generation as u16))
    }

    fn value_is_negative_start(&self) -> bool {
        matches!(self.data.get(self.token_start), Some(b'-' | b'+'))
    }

    /// Parse a name (/Name), decoding `#XX` escapes
    fn parse_name(&mut self) {
        self.advance(); // Skip '/'
        self.token_type = TokenType::Name;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' {
                let escaped = self
                    .peek_at(1)
                    .and_then(hex_value)
                    .zip(self.peek_at(2).and_then(hex_value));
                if let Some((hi, lo)) = escaped {
                    self.pos += 3;
                    self.value.push((hi << 4) | lo);
                    continue;
                }
                // invalid escape: drop the '#', keep what follows
                self.pos += 1;
            } else {
                self.value.push(b);
                self.pos += 1;
            }
        }
    }

    /// Parse a number permissively: signs, digits, dots and an optional exponent
    fn parse_number(&mut self) {
        self.token_type = TokenType::Number;
        let mut integer = true;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'+' | b'-' => {}
                b'.' => integer = false,
                b'e' | b'E' if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'-' || c == b'+') =>
                {
                    integer = false;
                    self.value.push(b);
                    self.pos += 1;
                    if let Some(sign @ (b'-' | b'+')) = self.peek() {
                        self.value.push(sign);
                        self.pos += 1;
                    }
                    while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
                        self.value.push(d);
                        self.pos += 1;
                    }
                    break;
                }
                _ => break,
            }
            self.value.push(b);
            self.pos += 1;
        }
        self.integer = integer;
    }

    /// Parse a literal string (...)
    fn parse_string(&mut self) -> Result<()> {
        let start = self.pos;
        self.advance(); // Skip '('
        self.token_type = TokenType::String;
        let mut depth = 1;
        let eof = |pos| PdfError::UnexpectedEof {
            pos,
            msg: "unterminated string",
        };

        while depth > 0 {
            match self.advance() {
                Some(b'(') => {
                    depth += 1;
                    self.value.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    if depth > 0 {
                        self.value.push(b')');
                    }
                }
                Some(b'\r') => {
                    // an unescaped end-of-line is read as a single LF
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    self.value.push(b'\n');
                }
                Some(b'\\') => match self.advance() {
                    Some(b'n') => self.value.push(b'\n'),
                    Some(b'r') => self.value.push(b'\r'),
                    Some(b't') => self.value.push(b'\t'),
                    Some(b'b') => self.value.push(0x08),
                    Some(b'f') => self.value.push(0x0c),
                    Some(b'\r') => {
                        // Line continuation - skip \r and optional \n
                        if self.peek() == Some(b'\n') {
                            self.pos += 1;
                        }
                    }
                    Some(b'\n') => {}
                    Some(c @ b'0'..=b'7') => {
                        let mut octal = (c - b'0') as u32;
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d @ b'0'..=b'7') => {
                                    self.pos += 1;
                                    octal = octal * 8 + (d - b'0') as u32;
                                }
                                _ => break,
                            }
                        }
                        self.value.push((octal & 0xFF) as u8);
                    }
                    // Unknown escape, just keep the character
                    Some(c) => self.value.push(c),
                    None => return Err(eof(start)),
                },
                Some(c) => self.value.push(c),
                None => return Err(eof(start)),
            }
        }
        Ok(())
    }

    /// Parse a hex string <...>; characters that are not hex digits are skipped
    fn parse_hex_string(&mut self) -> Result<()> {
        let start = self.pos;
        self.advance(); // Skip '<'
        self.token_type = TokenType::String;
        self.hex = true;
        let mut pending: Option<u8> = None;

        loop {
            match self.advance() {
                Some(b'>') => break,
                Some(c) => {
                    let Some(nibble) = hex_value(c) else {
                        continue;
                    };
                    match pending.take() {
                        Some(high) => self.value.push((high << 4) | nibble),
                        None => pending = Some(nibble),
                    }
                }
                None => {
                    return Err(PdfError::UnexpectedEof {
                        pos: start,
                        msg: "unterminated hex string",
                    });
                }
            }
        }

        // odd digit count: the last nibble is followed by an implied 0
        if let Some(high) = pending {
            self.value.push(high << 4);
        }
        Ok(())
    }

    /// Parse a keyword
    fn parse_keyword(&mut self) {
        self.token_type = TokenType::Other;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.value.push(b);
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<(TokenType, Vec<u8>)> {
        let mut tok = Tokenizer::new(data);
        let mut out = Vec::new();
        while tok.next_valid_token().unwrap() {
            out.push((tok.token_type(), tok.bytes().to_vec()));
        }
        out
    }

    #[test]
    fn dictionary_tokens() {
        let got = tokens(b"<< /Type /Page /Count 3 >>");
        let kinds: Vec<TokenType> = got.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            [
                TokenType::StartDict,
                TokenType::Name,
                TokenType::Name,
                TokenType::Name,
                TokenType::Number,
                TokenType::EndDict
            ]
        );
        assert_eq!(got[2].1, b"Page");
    }

    #[test]
    fn reference_folding() {
        let mut tok = Tokenizer::new(b"12 0 R 5 6");
        assert!(tok.next_valid_token().unwrap());
        assert_eq!(tok.token_type(), TokenType::Ref);
        assert_eq!(tok.reference(), ObjRef::new(12, 0));
        assert!(tok.next_valid_token().unwrap());
        assert_eq!(tok.token_type(), TokenType::Number);
        assert_eq!(tok.int_value(), 5);
        assert!(tok.next_valid_token().unwrap());
        assert_eq!(tok.int_value(), 6);
        assert!(!tok.next_valid_token().unwrap());
        assert_eq!(tok.token_type(), TokenType::EndOfFile);
    }

    #[test]
    fn permissive_numbers() {
        assert_eq!(parse_number_lenient(b"-.5"), -0.5);
        assert_eq!(parse_number_lenient(b"4."), 4.0);
        assert_eq!(parse_number_lenient(b"--234"), 234.0);
        assert_eq!(parse_number_lenient(b"--2.5"), -2.5);
        assert_eq!(parse_number_lenient(b"1.2.3"), 1.23);
        assert_eq!(parse_number_lenient(b"-"), 0.0);
        assert_eq!(parse_number_lenient(b"1e"), 1.0);
        assert_eq!(parse_number_lenient(b"1.5e2"), 150.0);
    }

    #[test]
    fn malformed_exponent_is_not_fatal() {
        let got = tokens(b"[1e 2E+]");
        assert_eq!(got.len(), 5);
        assert_eq!(got[1].0, TokenType::Number);
    }

    #[test]
    fn literal_string_escapes_and_nesting() {
        let mut tok = Tokenizer::new(b"(a(b)c\\n\\101\\\r\nd\r\ne)");
        assert!(tok.next_token().unwrap());
        assert_eq!(tok.token_type(), TokenType::String);
        assert!(!tok.is_hex_string());
        assert_eq!(tok.bytes(), b"a(b)c\nAd\ne");
    }

    #[test]
    fn hex_string_flag_and_odd_digits() {
        let mut tok = Tokenizer::new(b"<48 65 6C 6C 6F 7>");
        assert!(tok.next_token().unwrap());
        assert!(tok.is_hex_string());
        assert_eq!(tok.bytes(), b"Hello\x70");
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let mut tok = Tokenizer::new(b"(never closed");
        assert!(matches!(
            tok.next_token(),
            Err(PdfError::UnexpectedEof { .. })
        ));
        let mut tok = Tokenizer::new(b"<414243");
        assert!(tok.next_token().is_err());
    }

    #[test]
    fn name_escapes() {
        let mut tok = Tokenizer::new(b"/A#20B /Bad#zz");
        tok.next_token().unwrap();
        assert_eq!(tok.bytes(), b"A B");
        tok.next_token().unwrap();
        assert_eq!(tok.bytes(), b"Badzz");
    }

    #[test]
    fn comments_skipped_unless_requested() {
        assert_eq!(tokens(b"% hello\n1").len(), 1);
        let mut tok = Tokenizer::new(b"% hello\n1").with_comments(true);
        tok.next_token().unwrap();
        assert_eq!(tok.token_type(), TokenType::Comment);
        assert_eq!(tok.bytes(), b" hello");
    }
}
