//! PDF object types.
//!
//! Objects are plain values. An indirect reference is only a lookup key: it
//! never owns its referent, and resolution always goes through the reader
//! that produced it (`PdfReader::get_pdf_object`).

use crate::error::{PdfError, Result};
use crate::utils::decode_text;
use bytes::Bytes;
use indexmap::IndexMap;
use indexmap::map::{Iter, Keys};

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Numeric value (PDF does not distinguish integers at this level)
    Number(f64),
    /// Name object (e.g., /Type, /Font), stored without the leading slash
    Name(String),
    /// String with its original syntax recorded
    String(PdfString),
    /// Array of objects
    Array(Vec<PdfObject>),
    /// Dictionary (name -> object mapping)
    Dictionary(PdfDict),
    /// Stream (dictionary + byte payload)
    Stream(Box<PdfStream>),
    /// Indirect object reference
    Reference(ObjRef),
}

impl PdfObject {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::String(PdfString::new(bytes))
    }

    /// Builds a numeric array, as used for rectangles and matrices.
    pub fn numbers(values: &[f64]) -> Self {
        Self::Array(values.iter().map(|&v| Self::Number(v)).collect())
    }

    /// Check if this is a null object
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Get as boolean
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            _ => Err(PdfError::TypeError {
                expected: "boolean",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value
    pub const fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value truncated to an integer
    pub const fn as_i64(&self) -> Result<i64> {
        match self {
            Self::Number(n) => Ok(*n as i64),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name string
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as string object
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Result<&[PdfObject]> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(PdfError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<PdfObject>> {
        match self {
            Self::Array(arr) => Ok(arr),
            other => Err(PdfError::TypeError {
                expected: "array",
                got: other.type_name(),
            }),
        }
    }

    /// Get as dictionary. A stream answers with its own dictionary.
    pub fn as_dict(&self) -> Result<&PdfDict> {
        match self {
            Self::Dictionary(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(PdfError::TypeError {
                expected: "dictionary",
                got: self.type_name(),
            }),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut PdfDict> {
        match self {
            Self::Dictionary(d) => Ok(d),
            Self::Stream(s) => Ok(&mut s.dict),
            other => Err(PdfError::TypeError {
                expected: "dictionary",
                got: other.type_name(),
            }),
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut PdfStream> {
        match self {
            Self::Stream(s) => Ok(s),
            other => Err(PdfError::TypeError {
                expected: "stream",
                got: other.type_name(),
            }),
        }
    }

    /// Get as object reference
    pub const fn as_reference(&self) -> Result<ObjRef> {
        match self {
            Self::Reference(r) => Ok(*r),
            _ => Err(PdfError::TypeError {
                expected: "reference",
                got: self.type_name(),
            }),
        }
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "reference",
        }
    }

    /// Direct children, in order. References are returned, not followed.
    pub fn children(&self) -> Vec<&PdfObject> {
        match self {
            Self::Array(items) => items.iter().collect(),
            Self::Dictionary(d) => d.values().collect(),
            Self::Stream(s) => s.dict.values().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for PdfObject {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<f64> for PdfObject {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for PdfObject {
    fn from(v: i32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i64> for PdfObject {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u32> for PdfObject {
    fn from(v: u32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<usize> for PdfObject {
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<ObjRef> for PdfObject {
    fn from(r: ObjRef) -> Self {
        Self::Reference(r)
    }
}

impl From<PdfDict> for PdfObject {
    fn from(d: PdfDict) -> Self {
        Self::Dictionary(d)
    }
}

impl From<PdfString> for PdfObject {
    fn from(s: PdfString) -> Self {
        Self::String(s)
    }
}

impl From<PdfStream> for PdfObject {
    fn from(s: PdfStream) -> Self {
        Self::Stream(Box::new(s))
    }
}

impl From<Vec<PdfObject>> for PdfObject {
    fn from(v: Vec<PdfObject>) -> Self {
        Self::Array(v)
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    /// Object number
    pub num: u32,
    /// Generation number
    pub generation: u16,
}

impl ObjRef {
    pub const fn new(num: u32, generation: u16) -> Self {
        Self { num, generation }
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Something that can take ownership of a new indirect object.
pub trait ObjectSink {
    fn add_object(&mut self, obj: PdfObject) -> ObjRef;
}

/// Text encoding hint of a string, taken from its byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    PdfDoc,
    Utf16Be,
    Utf8,
}

impl TextEncoding {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xFE, 0xFF]) {
            Self::Utf16Be
        } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            Self::Utf8
        } else {
            Self::PdfDoc
        }
    }
}

/// A PDF string: raw bytes plus the syntax it was written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    pub bytes: Vec<u8>,
    /// Written as `<...>` rather than `(...)`.
    pub hex: bool,
    pub encoding: TextEncoding,
}

impl PdfString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let encoding = TextEncoding::detect(&bytes);
        Self {
            bytes,
            hex: false,
            encoding,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            hex: true,
            ..Self::new(bytes)
        }
    }

    /// Encodes text as PDFDocEncoding when possible, UTF-16BE otherwise.
    pub fn from_text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) < 0x7F) {
            return Self::new(text.as_bytes());
        }
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replaces the payload (after decryption, say) and re-detects the encoding.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.encoding = TextEncoding::detect(&bytes);
        self.bytes = bytes;
    }

    /// Decodes the string as text according to its encoding hint.
    pub fn to_text(&self) -> String {
        match self.encoding {
            TextEncoding::Utf8 => {
                String::from_utf8_lossy(self.bytes.get(3..).unwrap_or_default()).into_owned()
            }
            _ => decode_text(&self.bytes),
        }
    }
}

/// Dictionary keyed by name (without the slash), in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDict(IndexMap<String, PdfObject>);

impl PdfDict {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn with_type(type_name: &str) -> Self {
        let mut d = Self::new();
        d.insert("Type", PdfObject::name(type_name));
        d
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfObject> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PdfObject>) -> Option<PdfObject> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> Iter<'_, String, PdfObject> {
        self.0.iter()
    }

    pub fn keys(&self) -> Keys<'_, String, PdfObject> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &PdfObject> {
        self.0.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut PdfObject> {
        self.0.values_mut()
    }

    /// Value of a name entry, if present and a name.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PdfObject::Name(n)) => Some(n),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(PdfObject::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_f64(key).map(|n| n as i64)
    }

    pub fn get_dict(&self, key: &str) -> Option<&PdfDict> {
        match self.0.get(key) {
            Some(PdfObject::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    pub fn get_array(&self, key: &str) -> Option<&[PdfObject]> {
        match self.0.get(key) {
            Some(PdfObject::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub fn get_reference(&self, key: &str) -> Option<ObjRef> {
        match self.0.get(key) {
            Some(PdfObject::Reference(r)) => Some(*r),
            _ => None,
        }
    }

    /// The `/Type` discriminator, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.type_name() == Some(name)
    }
}

impl FromIterator<(String, PdfObject)> for PdfDict {
    fn from_iter<I: IntoIterator<Item = (String, PdfObject)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PdfDict {
    type Item = (String, PdfObject);
    type IntoIter = indexmap::map::IntoIter<String, PdfObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PdfDict {
    type Item = (&'a String, &'a PdfObject);
    type IntoIter = Iter<'a, String, PdfObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// PDF Stream - dictionary attributes + byte payload.
///
/// The payload is kept exactly as stored in the file (filters applied),
/// decrypted in place once the security handler is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    /// Stream dictionary
    pub dict: PdfDict,
    raw: Bytes,
    decrypted: bool,
    /// File offset of the first payload byte, for streams read from a file.
    pub(crate) data_offset: Option<usize>,
}

impl PdfStream {
    /// Creates a stream from caller-supplied (already encoded) bytes.
    pub fn new(dict: PdfDict, raw: impl Into<Bytes>) -> Self {
        Self {
            dict,
            raw: raw.into(),
            decrypted: true,
            data_offset: None,
        }
    }

    pub(crate) fn from_file(dict: PdfDict, raw: Bytes, data_offset: usize) -> Self {
        Self {
            dict,
            raw,
            decrypted: false,
            data_offset: Some(data_offset),
        }
    }

    /// Raw payload, still filter-encoded.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw
    }

    pub fn data_offset(&self) -> Option<usize> {
        self.data_offset
    }

    pub(crate) fn is_decrypted(&self) -> bool {
        self.decrypted
    }

    pub(crate) fn set_decrypted(&mut self, raw: Bytes) {
        self.raw = raw;
        self.decrypted = true;
        self.dict.insert("Length", self.raw.len());
    }

    /// Replaces the payload and keeps `/Length` in step with it.
    pub fn set_raw(&mut self, raw: impl Into<Bytes>) {
        self.raw = raw.into();
        self.decrypted = true;
        self.dict.insert("Length", self.raw.len());
    }

    /// Filter names in application order (`/Filter` may be a name or array).
    pub fn filter_names(&self) -> Vec<String> {
        match self.dict.get("Filter") {
            Some(PdfObject::Name(n)) => vec![n.clone()],
            Some(PdfObject::Array(items)) => items
                .iter()
                .filter_map(|o| o.as_name().ok().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Streams with an explicit `/Crypt` filter manage their own encryption.
    pub fn has_crypt_filter(&self) -> bool {
        self.filter_names().iter().any(|f| f == "Crypt")
    }
}
