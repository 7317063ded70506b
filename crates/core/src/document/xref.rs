//! Cross-reference loading: classic tables, xref streams, hybrid files,
//! the `/Prev` chain, and the full-file rebuild scan.

use crate::codec::filters::{FilterRegistry, decode_stream_data, filter_chain};
use crate::error::{PdfError, Result};
use crate::model::objects::{PdfDict, PdfObject};
use crate::parser::lexer::TokenType;
use crate::parser::pdf_parser::{ObjectParser, resolve_stream_length};
use regex::bytes::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 1024;

/// Trailer keys that describe an xref stream rather than the document.
const XREF_STREAM_KEYS: [&str; 7] = ["Length", "Filter", "DecodeParms", "W", "Index", "Type", "XRefStm"];

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefSlot {
    Free,
    Offset { offset: usize, generation: u16 },
    InObjectStream { container: u32, index: u32 },
}

/// Object number to location. Slot 0 is always free.
#[derive(Debug, Clone)]
pub struct XrefTable {
    slots: Vec<Option<XrefSlot>>,
}

impl Default for XrefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl XrefTable {
    pub fn new() -> Self {
        Self {
            slots: vec![Some(XrefSlot::Free)],
        }
    }

    /// One past the highest object number with a slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    pub fn get(&self, num: u32) -> Option<XrefSlot> {
        self.slots.get(num as usize).copied().flatten()
    }

    fn grow(&mut self, num: u32) {
        let needed = num as usize + 1;
        if self.slots.len() < needed {
            self.slots.resize(needed, None);
        }
    }

    /// Records `slot` unless a newer section already did.
    pub fn set_if_absent(&mut self, num: u32, slot: XrefSlot) -> bool {
        if num == 0 {
            return false;
        }
        self.grow(num);
        let entry = &mut self.slots[num as usize];
        if entry.is_some() {
            return false;
        }
        *entry = Some(slot);
        true
    }

    /// Overwrites the slot of `num`.
    pub fn set(&mut self, num: u32, slot: XrefSlot) {
        if num == 0 {
            return;
        }
        self.grow(num);
        self.slots[num as usize] = Some(slot);
    }

    pub fn free(&mut self, num: u32) {
        self.set(num, XrefSlot::Free);
    }

    /// Object numbers whose slot is not free.
    pub fn live(&self) -> impl Iterator<Item = (u32, XrefSlot)> + '_ {
        self.slots.iter().enumerate().filter_map(|(num, slot)| match slot {
            Some(XrefSlot::Free) | None => None,
            Some(slot) => Some((num as u32, *slot)),
        })
    }

    pub fn ensure_len(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize(len, None);
        }
    }
}

/// Outcome of reading the cross-reference information of a file.
#[derive(Debug, Clone, Default)]
pub struct XrefLoad {
    pub table: XrefTable,
    pub trailer: PdfDict,
    /// The newest section is an xref stream.
    pub new_xref_type: bool,
    /// A classic section pointed at an `/XRefStm`.
    pub hybrid: bool,
    pub rebuilt: bool,
    /// Object streams spotted by the rebuild scan, whose members have no
    /// slots yet.
    pub object_streams: Vec<u32>,
}

/// Offset named by the last `startxref` in the final kilobyte.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let needle = b"startxref";
    let from = data.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &data[from..];
    let at = tail
        .windows(needle.len())
        .rposition(|w| w == needle)
        .ok_or_else(|| PdfError::corrupt("startxref not found"))?;
    let mut parser = ObjectParser::at(data, from + at + needle.len());
    match parser.read_object()? {
        PdfObject::Number(n) if n >= 0.0 && (n as usize) < data.len() => Ok(n as usize),
        other => Err(PdfError::corrupt(format!(
            "startxref points outside the file: {other:?}"
        ))),
    }
}

/// One section of the chain.
struct Section {
    entries: Vec<(u32, XrefSlot)>,
    trailer: PdfDict,
}

/// Walks the chain from `startxref`, newest section first.
pub fn load_xref_chain(data: &[u8], startxref: usize) -> Result<XrefLoad> {
    let mut load = XrefLoad::default();
    let mut visited = FxHashSet::default();
    let mut next = Some(startxref);
    let mut first = true;

    while let Some(pos) = next {
        if !visited.insert(pos) {
            return Err(PdfError::corrupt(format!("/Prev chain revisits offset {pos}")));
        }
        if pos >= data.len() {
            return Err(PdfError::corrupt(format!("xref offset {pos} beyond end of file")));
        }

        let (section, is_stream) = match parse_xref_stream(data, pos) {
            Ok(section) => (section, true),
            Err(stream_err) => match parse_classic_section(data, pos) {
                Ok(section) => (section, false),
                Err(err) => {
                    debug!(pos, %stream_err, "not an xref stream either");
                    return Err(err);
                }
            },
        };
        if first {
            load.new_xref_type = is_stream;
        }

        let mut entries = section.entries;
        if !is_stream && let Some(stm) = section.trailer.get_i64("XRefStm") {
            let stm = stm as usize;
            if visited.insert(stm) {
                let hybrid = parse_xref_stream(data, stm)?;
                load.hybrid = true;
                entries = merge_hybrid(entries, hybrid.entries);
            }
        }
        for (num, slot) in entries {
            load.table.set_if_absent(num, slot);
        }

        next = section
            .trailer
            .get_i64("Prev")
            .filter(|&p| p >= 0)
            .map(|p| p as usize);
        absorb_trailer(&mut load.trailer, section.trailer, first);
        first = false;
    }

    if let Some(size) = load.trailer.get_i64("Size")
        && size > 0
    {
        load.table.ensure_len(size as usize);
    }
    if !load.trailer.contains_key("Root") {
        return Err(PdfError::corrupt("trailer has no /Root"));
    }
    Ok(load)
}

/// The newest trailer wins; older ones only fill in missing keys.
fn absorb_trailer(into: &mut PdfDict, trailer: PdfDict, newest: bool) {
    for (key, value) in trailer {
        if XREF_STREAM_KEYS.contains(&key.as_str()) || key == "Prev" {
            continue;
        }
        if newest || !into.contains_key(&key) {
            into.insert(key, value);
        }
    }
}

/// In a hybrid section the classic table marks compressed objects free;
/// the xref stream's record replaces those and fills the gaps.
fn merge_hybrid(classic: Vec<(u32, XrefSlot)>, stream: Vec<(u32, XrefSlot)>) -> Vec<(u32, XrefSlot)> {
    let mut by_num: FxHashMap<u32, XrefSlot> = FxHashMap::default();
    let mut order = Vec::with_capacity(classic.len() + stream.len());
    for (num, slot) in classic {
        if by_num.insert(num, slot).is_none() {
            order.push(num);
        }
    }
    for (num, slot) in stream {
        match by_num.get(&num) {
            Some(XrefSlot::Free) => {
                by_num.insert(num, slot);
            }
            Some(_) => {}
            None => {
                by_num.insert(num, slot);
                order.push(num);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|num| by_num.get(&num).map(|slot| (num, *slot)))
        .collect()
}

fn parse_classic_section(data: &[u8], pos: usize) -> Result<Section> {
    let mut parser = ObjectParser::at(data, pos);
    let tok = parser.tokenizer();
    if !tok.next_token()? || !tok.is_keyword(b"xref") {
        return Err(PdfError::corrupt(format!("no xref table at offset {pos}")));
    }

    let mut entries = Vec::new();
    loop {
        if !tok.next_token()? {
            return Err(PdfError::corrupt("xref table without trailer"));
        }
        if tok.is_keyword(b"trailer") {
            break;
        }
        if tok.token_type() != TokenType::Number {
            return Err(PdfError::corrupt("expected xref subsection start"));
        }
        let mut base = tok.int_value();
        if !tok.next_token()? || tok.token_type() != TokenType::Number {
            return Err(PdfError::corrupt("expected xref subsection count"));
        }
        let count = tok.int_value();
        if base < 0 || count < 0 {
            return Err(PdfError::corrupt("negative xref subsection bounds"));
        }

        for i in 0..count {
            let mut fields = [0i64; 2];
            for field in &mut fields {
                if !tok.next_token()? || tok.token_type() != TokenType::Number {
                    return Err(PdfError::corrupt("truncated xref entry"));
                }
                *field = tok.int_value();
            }
            if !tok.next_token()? {
                return Err(PdfError::corrupt("truncated xref entry"));
            }
            let in_use = tok.is_keyword(b"n");
            if !in_use && !tok.is_keyword(b"f") {
                return Err(PdfError::corrupt("xref entry marker is neither n nor f"));
            }
            let [offset, generation] = fields;
            // Some writers start the first subsection at 1 yet still list
            // the free head of object 0.
            if i == 0 && base == 1 && !in_use && offset == 0 && generation == 65535 {
                base = 0;
            }
            let num = (base + i) as u32;
            let slot = if in_use && offset > 0 {
                XrefSlot::Offset {
                    offset: offset as usize,
                    generation: generation.clamp(0, u16::MAX as i64) as u16,
                }
            } else {
                XrefSlot::Free
            };
            entries.push((num, slot));
        }
    }

    let trailer = match parser.read_object()? {
        PdfObject::Dictionary(d) => d,
        other => {
            return Err(PdfError::corrupt(format!(
                "trailer is a {}",
                other.type_name()
            )));
        }
    };
    Ok(Section { entries, trailer })
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn parse_xref_stream(data: &[u8], pos: usize) -> Result<Section> {
    let raw = ObjectParser::at(data, pos).read_indirect_object()?;
    let (PdfObject::Dictionary(dict), Some(start)) = (raw.object, raw.stream_start) else {
        return Err(PdfError::corrupt(format!("no xref stream at offset {pos}")));
    };
    if !dict.is_type("XRef") && !dict.contains_key("W") {
        return Err(PdfError::corrupt(format!("object at {pos} is not an xref stream")));
    }

    let declared = dict.get_i64("Length").filter(|&l| l >= 0).map(|l| l as usize);
    let (len, _) = resolve_stream_length(data, start, declared);
    let (filters, params) = filter_chain(&dict);
    let body = decode_stream_data(&data[start..start + len], &filters, &params, &FilterRegistry::default())?;

    let widths: Vec<usize> = dict
        .get_array("W")
        .ok_or_else(|| PdfError::corrupt("xref stream without /W"))?
        .iter()
        .map(|w| w.as_i64().map(|v| v.clamp(0, 8) as usize))
        .collect::<Result<_>>()?;
    let [w0, w1, w2] = widths[..] else {
        return Err(PdfError::corrupt("xref stream /W must have three entries"));
    };
    let entry_len = w0 + w1 + w2;
    if entry_len == 0 {
        return Err(PdfError::corrupt("xref stream /W is all zeros"));
    }

    let size = dict.get_i64("Size").unwrap_or(0).max(0) as u64;
    let index: Vec<(u64, u64)> = match dict.get_array("Index") {
        Some(items) => items
            .chunks_exact(2)
            .map(|pair| Ok((pair[0].as_i64()?.max(0) as u64, pair[1].as_i64()?.max(0) as u64)))
            .collect::<Result<_>>()?,
        None => vec![(0, size)],
    };

    let mut entries = Vec::new();
    let mut rows = body.chunks_exact(entry_len);
    'subsections: for (first, count) in index {
        for i in 0..count {
            let Some(row) = rows.next() else {
                warn!(pos, "xref stream data ends before its index");
                break 'subsections;
            };
            let kind = if w0 == 0 { 1 } else { read_field(&row[..w0]) };
            let f1 = read_field(&row[w0..w0 + w1]);
            let f2 = read_field(&row[w0 + w1..]);
            let Ok(num) = u32::try_from(first + i) else {
                break 'subsections;
            };
            let slot = match kind {
                0 => XrefSlot::Free,
                1 => XrefSlot::Offset {
                    offset: f1 as usize,
                    generation: f2.min(u16::MAX as u64) as u16,
                },
                2 => XrefSlot::InObjectStream {
                    container: f1 as u32,
                    index: f2 as u32,
                },
                // unknown types are references to the null object
                _ => continue,
            };
            entries.push((num, slot));
        }
    }
    Ok(Section {
        entries,
        trailer: dict,
    })
}

/// Recovers the table by scanning the whole file for `N G obj`.
///
/// The highest generation of each number wins, a later occurrence winning
/// ties. The trailer is the first `trailer` dictionary holding `/Root`,
/// else the first xref stream dictionary holding `/Root`.
pub fn rebuild(data: &[u8]) -> Result<XrefLoad> {
    let obj_re = Regex::new(r"(?-u)\b(\d{1,10})[\x00\t\n\x0c\r ]+(\d{1,5})[\x00\t\n\x0c\r ]+obj\b")
        .map_err(|e| PdfError::RebuildFailure(e.to_string()))?;

    let mut load = XrefLoad {
        rebuilt: true,
        ..XrefLoad::default()
    };
    let mut generations: FxHashMap<u32, u16> = FxHashMap::default();
    let mut starts: Vec<(usize, u32)> = Vec::new();
    for cap in obj_re.captures_iter(data) {
        let (Some(num_m), Some(gen_m)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let Some(num) = ascii_number(num_m.as_bytes()).and_then(|n| u32::try_from(n).ok()) else {
            continue;
        };
        let Some(generation) = ascii_number(gen_m.as_bytes()).and_then(|g| u16::try_from(g).ok())
        else {
            continue;
        };
        if num == 0 {
            continue;
        }
        let offset = num_m.start();
        starts.push((offset, num));
        match generations.get(&num) {
            Some(&seen) if seen > generation => {}
            _ => {
                generations.insert(num, generation);
                load.table.set(num, XrefSlot::Offset { offset, generation });
            }
        }
    }
    if generations.is_empty() {
        return Err(PdfError::RebuildFailure("no objects found".into()));
    }

    load.trailer = match find_trailer_keyword(data) {
        Some(trailer) => trailer,
        None => find_xref_stream_trailer(data, &starts).ok_or_else(|| {
            PdfError::RebuildFailure("no trailer with /Root found".into())
        })?,
    };
    load.object_streams = find_object_streams(data, &starts);
    warn!(
        objects = generations.len(),
        object_streams = load.object_streams.len(),
        "cross-reference table rebuilt by scanning"
    );
    Ok(load)
}

fn ascii_number(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn find_all<'a>(data: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    data.windows(needle.len())
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

fn find_trailer_keyword(data: &[u8]) -> Option<PdfDict> {
    find_all(data, b"trailer").find_map(|at| {
        let mut parser = ObjectParser::at(data, at + b"trailer".len());
        match parser.read_object() {
            Ok(PdfObject::Dictionary(d)) if d.contains_key("Root") => Some(d),
            _ => None,
        }
    })
}

/// Object start that contains byte `pos`: the last `N G obj` before it.
fn enclosing_object(starts: &[(usize, u32)], pos: usize) -> Option<usize> {
    let idx = starts.partition_point(|&(offset, _)| offset <= pos);
    idx.checked_sub(1).map(|i| starts[i].0)
}

fn dict_at(data: &[u8], offset: usize) -> Option<PdfDict> {
    match ObjectParser::at(data, offset).read_indirect_object() {
        Ok(raw) => match raw.object {
            PdfObject::Dictionary(d) => Some(d),
            _ => None,
        },
        Err(_) => None,
    }
}

fn type_name_positions<'a>(data: &'a [u8], type_name: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    find_all(data, b"/Type").filter(move |&at| {
        let rest = &data[at + 5..];
        let skip = rest
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\x00'))
            .count();
        let rest = &rest[skip..];
        rest.starts_with(type_name)
            && !rest
                .get(type_name.len())
                .is_some_and(|b| b.is_ascii_alphanumeric())
    })
}

fn find_xref_stream_trailer(data: &[u8], starts: &[(usize, u32)]) -> Option<PdfDict> {
    type_name_positions(data, b"/XRef").find_map(|at| {
        let dict = dict_at(data, enclosing_object(starts, at)?)?;
        if !(dict.is_type("XRef") && dict.contains_key("Root")) {
            return None;
        }
        Some(
            dict.into_iter()
                .filter(|(k, _)| !XREF_STREAM_KEYS.contains(&k.as_str()) && k != "Prev")
                .collect(),
        )
    })
}

fn find_object_streams(data: &[u8], starts: &[(usize, u32)]) -> Vec<u32> {
    let mut found: Vec<u32> = type_name_positions(data, b"/ObjStm")
        .filter_map(|at| {
            let idx = starts.partition_point(|&(offset, _)| offset <= at);
            idx.checked_sub(1).map(|i| starts[i].1)
        })
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}
