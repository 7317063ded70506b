//! PdfReader - opens a document and resolves its objects.
//!
//! Objects are read through the cross-reference table, decrypted as they
//! are loaded, and cached by object number. In full mode everything is
//! read at open time; in partial mode objects are read on first access and
//! may be released again to bound memory.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::codec::filters::{decode_stream_data, filter_chain};
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, ObjectSink, PdfDict, PdfObject, PdfStream};
use crate::parser::lexer::{TokenType, Tokenizer};
use crate::parser::pdf_parser::{ObjectParser, resolve_stream_length};

use super::options::{ReaderOptions, WriterOptions};
use super::pages::PageTree;
use super::security::{CryptoMode, Decryptor, Target, create_decryptor};
use super::writer::PdfFileWriter;
use super::xref::{XrefLoad, XrefSlot, XrefTable, find_startxref, load_xref_chain, rebuild};

/// Bytes searched for `%PDF-` at the start of the file.
const HEADER_WINDOW: usize = 1024;
/// Longest chain of references to references followed by `resolve`.
const MAX_REFERENCE_CHAIN: usize = 32;

/// A decoded object stream.
struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    /// (object number, offset relative to `first`) in stream order.
    members: Vec<(u32, usize)>,
}

/// A PDF document opened for reading and in-memory editing.
pub struct PdfReader {
    data: Bytes,
    header_offset: usize,
    version: String,
    xref: XrefTable,
    trailer: PdfDict,
    objects: Vec<Option<Arc<PdfObject>>>,
    /// Objects changed in memory; never released.
    dirty: FxHashSet<u32>,
    object_streams: FxHashMap<u32, Arc<ObjectStream>>,
    decryptor: Option<Arc<dyn Decryptor>>,
    encrypt_ref: Option<ObjRef>,
    options: ReaderOptions,
    rebuilt: bool,
    new_xref_type: bool,
    hybrid: bool,
    /// Objects whose bytes are being parsed, guarding indirect `/Length`.
    reading: FxHashSet<u32>,
    /// Object streams being expanded.
    expanding: FxHashSet<u32>,
    last_partial: Option<u32>,
    pub(crate) pages: PageTree,
}

impl std::fmt::Debug for PdfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfReader")
            .field("version", &self.version)
            .field("size", &self.xref.len())
            .field("pages", &self.pages.len())
            .field("rebuilt", &self.rebuilt)
            .field("encrypted", &self.decryptor.is_some())
            .finish()
    }
}

/// Locates `%PDF-x.y`; junk before it is tolerated.
fn find_header(data: &[u8]) -> Result<(usize, String)> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let at = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or(PdfError::InvalidHeader)?;
    let version = data[at + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .take(4)
        .map(|&b| b as char)
        .collect();
    Ok((at, version))
}

/// References held directly by `obj`, in any nesting of arrays and
/// dictionaries.
pub(crate) fn collect_references(obj: &PdfObject) -> Vec<ObjRef> {
    let mut refs = Vec::new();
    let mut pending = vec![obj];
    while let Some(obj) = pending.pop() {
        match obj {
            PdfObject::Reference(r) => refs.push(*r),
            other => pending.extend(other.children()),
        }
    }
    refs
}

impl PdfReader {
    /// Opens a document held in memory.
    ///
    /// A damaged cross-reference section, or a document structure that does
    /// not hold together, is answered with one rebuild scan of the whole
    /// file; a second failure is returned as is.
    pub fn open(data: impl Into<Bytes>, options: ReaderOptions) -> Result<Self> {
        let data = data.into();
        let (header_offset, version) = find_header(&data)?;
        let data = data.slice(header_offset..);

        match Self::load(data.clone(), header_offset, &version, options.clone(), None) {
            Ok(reader) => Ok(reader),
            Err(err) if err.triggers_rebuild() => {
                warn!(%err, "falling back to a rebuild of the cross-reference table");
                let load = rebuild(&data)?;
                Self::load(data, header_offset, &version, options, Some(load))
            }
            Err(err) => Err(err),
        }
    }

    /// Opens a memory-mapped file without copying it.
    pub fn open_mmap(mmap: Mmap, options: ReaderOptions) -> Result<Self> {
        Self::open(Bytes::from_owner(mmap), options)
    }

    fn load(
        data: Bytes,
        header_offset: usize,
        version: &str,
        options: ReaderOptions,
        rebuilt: Option<XrefLoad>,
    ) -> Result<Self> {
        let load = match rebuilt {
            Some(load) => load,
            None => {
                let startxref = find_startxref(&data)?;
                load_xref_chain(&data, startxref)?
            }
        };
        let XrefLoad {
            table,
            trailer,
            new_xref_type,
            hybrid,
            rebuilt,
            object_streams,
        } = load;

        let mut reader = Self {
            data,
            header_offset,
            version: version.to_string(),
            xref: table,
            trailer,
            objects: Vec::new(),
            dirty: FxHashSet::default(),
            object_streams: FxHashMap::default(),
            decryptor: None,
            encrypt_ref: None,
            options,
            rebuilt,
            new_xref_type,
            hybrid,
            reading: FxHashSet::default(),
            expanding: FxHashSet::default(),
            last_partial: None,
            pages: PageTree::default(),
        };

        reader.setup_encryption()?;
        reader.index_object_streams(&object_streams);
        reader.check_root()?;
        if !reader.options.partial {
            reader.read_all()?;
        }
        reader.pages = PageTree::build(&mut reader)?;
        debug!(
            version = %reader.version,
            objects = reader.xref.len(),
            pages = reader.pages.len(),
            rebuilt = reader.rebuilt,
            "document opened"
        );
        Ok(reader)
    }

    fn setup_encryption(&mut self) -> Result<()> {
        let Some(entry) = self.trailer.get("Encrypt").cloned() else {
            return Ok(());
        };
        let mut encrypt = match entry {
            PdfObject::Reference(r) => {
                self.encrypt_ref = Some(r);
                self.get_pdf_object(r)?.as_dict()?.clone()
            }
            PdfObject::Dictionary(d) => d,
            other => {
                return Err(PdfError::TypeError {
                    expected: "dictionary",
                    got: other.type_name(),
                });
            }
        };
        // entries of the encryption dictionary are never encrypted
        for value in encrypt.values_mut() {
            if let PdfObject::Reference(r) = value {
                let resolved = self.get_pdf_object(*r)?;
                *value = (*resolved).clone();
            }
        }

        let doc_id = self.document_id();
        let decryptor = create_decryptor(
            &encrypt,
            &doc_id,
            &self.options.password,
            self.options.recipient.as_ref(),
        )?;
        debug!(mode = ?decryptor.crypto_mode(), owner = decryptor.owner_access(), "security handler ready");
        self.decryptor = Some(decryptor);
        // whatever was read so far was read in clear
        self.objects.clear();
        Ok(())
    }

    /// First string of the trailer `/ID`.
    fn document_id(&mut self) -> Vec<u8> {
        let id = match self.trailer.get("ID").cloned() {
            Some(PdfObject::Reference(r)) => self.get_pdf_object(r).ok().map(|o| (*o).clone()),
            other => other,
        };
        match id {
            Some(PdfObject::Array(items)) => items
                .first()
                .and_then(|o| o.as_string().ok())
                .map(|s| s.bytes.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Object streams found by a rebuild scan contribute the members the
    /// scan could not see.
    fn index_object_streams(&mut self, containers: &[u32]) {
        for &container in containers {
            let stream = match self.object_stream(container) {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(container, %err, "skipping unreadable object stream");
                    continue;
                }
            };
            let mut added = 0;
            for (index, &(num, _)) in stream.members.iter().enumerate() {
                let slot = XrefSlot::InObjectStream {
                    container,
                    index: index as u32,
                };
                if self.xref.set_if_absent(num, slot) {
                    added += 1;
                }
            }
            trace!(container, added, "object stream members indexed");
        }
    }

    fn check_root(&mut self) -> Result<()> {
        let root = self.trailer.get("Root").cloned().unwrap_or(PdfObject::Null);
        if matches!(&*self.resolve(&root)?, PdfObject::Dictionary(_)) {
            return Ok(());
        }
        if self.rebuilt {
            Err(PdfError::RebuildFailure("/Root is not a dictionary".into()))
        } else {
            Err(PdfError::corrupt("/Root is not a dictionary"))
        }
    }

    /// Reads every object. Each object stream is decoded once and all its
    /// members are extracted before moving on.
    fn read_all(&mut self) -> Result<()> {
        let mut by_container: IndexMap<u32, Vec<u32>> = IndexMap::new();
        let live: Vec<(u32, XrefSlot)> = self.xref.live().collect();
        for (num, slot) in live {
            match slot {
                XrefSlot::Offset { generation, .. } => {
                    self.get_pdf_object(ObjRef::new(num, generation))?;
                }
                XrefSlot::InObjectStream { container, .. } => {
                    by_container.entry(container).or_default().push(num);
                }
                XrefSlot::Free => {}
            }
        }
        for (container, members) in by_container {
            for num in members {
                self.get_pdf_object(ObjRef::new(num, 0))?;
            }
            self.object_streams.remove(&container);
        }
        Ok(())
    }

    /// Returns object `r`, reading it if needed. Free and missing objects
    /// read as null.
    pub fn get_pdf_object(&mut self, r: ObjRef) -> Result<Arc<PdfObject>> {
        let num = r.num;
        if let Some(Some(obj)) = self.objects.get(num as usize) {
            return Ok(obj.clone());
        }
        match self.read_object(num) {
            Ok(Some(obj)) => {
                let obj = Arc::new(obj);
                self.store(num, obj.clone());
                if self.options.partial {
                    self.last_partial = Some(num);
                }
                Ok(obj)
            }
            Ok(None) => Ok(Arc::new(PdfObject::Null)),
            Err(err) if self.options.lenient && !err.is_fatal() => {
                warn!(object = num, %err, "unreadable object read as null");
                Ok(Arc::new(PdfObject::Null))
            }
            Err(err) => Err(err),
        }
    }

    /// Mutable access to object `r`. The object is copied if shared and is
    /// kept in memory from now on.
    pub fn get_pdf_object_mut(&mut self, r: ObjRef) -> Result<&mut PdfObject> {
        self.get_pdf_object(r)?;
        let num = r.num as usize;
        self.ensure_slot(num);
        self.dirty.insert(r.num);
        let slot = self.objects[num].get_or_insert_with(|| Arc::new(PdfObject::Null));
        Ok(Arc::make_mut(slot))
    }

    /// Replaces object `r`.
    pub fn set_pdf_object(&mut self, r: ObjRef, obj: PdfObject) {
        self.store(r.num, Arc::new(obj));
        self.dirty.insert(r.num);
    }

    /// Adds a new indirect object under the next free number.
    pub fn add_pdf_object(&mut self, obj: PdfObject) -> ObjRef {
        let num = self.xref.len().max(self.objects.len()).max(1) as u32;
        self.set_pdf_object(ObjRef::new(num, 0), obj);
        ObjRef::new(num, 0)
    }

    /// Follows references until a direct object is reached.
    pub fn resolve(&mut self, obj: &PdfObject) -> Result<Arc<PdfObject>> {
        let PdfObject::Reference(r) = obj else {
            return Ok(Arc::new(obj.clone()));
        };
        let mut current = self.get_pdf_object(*r)?;
        for _ in 0..MAX_REFERENCE_CHAIN {
            let next = match &*current {
                PdfObject::Reference(next) => *next,
                _ => return Ok(current),
            };
            current = self.get_pdf_object(next)?;
        }
        Err(PdfError::CyclicStructure(format!("reference chain from {r} does not end")))
    }

    /// Drops a cached object so the next access reads it again. Only
    /// partial readers release, and never objects changed in memory.
    pub fn release_object(&mut self, num: u32) -> bool {
        if !self.options.partial || self.dirty.contains(&num) {
            return false;
        }
        match self.objects.get_mut(num as usize) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Releases the object read most recently in partial mode.
    pub fn release_last_xref_partial(&mut self) {
        if let Some(num) = self.last_partial.take() {
            self.release_object(num);
        }
    }

    /// Deletes `obj` and everything reachable from it.
    pub fn kill_xref(&mut self, obj: &PdfObject) -> Result<()> {
        let mut visited = FxHashSet::default();
        let mut pending = collect_references(obj);
        while let Some(r) = pending.pop() {
            if !visited.insert(r.num) {
                continue;
            }
            let target = self.get_pdf_object(r)?;
            self.free_object(r.num);
            pending.extend(collect_references(&target));
        }
        debug!(killed = visited.len(), "objects removed from the cross-reference table");
        Ok(())
    }

    /// Frees every object not reachable from the trailer. Returns how many
    /// were removed.
    pub fn remove_unused_objects(&mut self) -> Result<usize> {
        let mut reachable = FxHashSet::default();
        let mut pending = collect_references(&PdfObject::Dictionary(self.trailer.clone()));
        while let Some(r) = pending.pop() {
            if !reachable.insert(r.num) {
                continue;
            }
            let target = self.get_pdf_object(r)?;
            pending.extend(collect_references(&target));
            if self.options.partial {
                self.release_object(r.num);
            }
        }
        // containers of reachable members stay
        let containers: Vec<u32> = reachable
            .iter()
            .filter_map(|&num| match self.xref.get(num) {
                Some(XrefSlot::InObjectStream { container, .. }) => Some(container),
                _ => None,
            })
            .collect();
        reachable.extend(containers);

        let mut removed = 0;
        for num in self.live_numbers() {
            if !reachable.contains(&num) {
                self.free_object(num);
                removed += 1;
            }
        }
        debug!(removed, "unused objects removed");
        Ok(removed)
    }

    /// Decodes a stream's payload through its filter chain.
    pub fn get_stream_bytes(&mut self, stream: &PdfStream) -> Result<Vec<u8>> {
        let mut dict = PdfDict::new();
        for key in ["Filter", "DecodeParms", "DP"] {
            let Some(value) = stream.dict.get(key) else {
                continue;
            };
            let value = match &*self.resolve(value)? {
                PdfObject::Array(items) => PdfObject::Array(
                    items
                        .iter()
                        .map(|item| self.resolve(item).map(|o| (*o).clone()))
                        .collect::<Result<_>>()?,
                ),
                other => other.clone(),
            };
            dict.insert(key, value);
        }
        let (filters, params) = filter_chain(&dict);
        decode_stream_data(stream.raw_bytes(), &filters, &params, &self.options.filters)
    }

    /// The stream payload as stored, after decryption.
    pub fn get_stream_bytes_raw(&self, stream: &PdfStream) -> Bytes {
        stream.raw_bytes().clone()
    }

    /// The `/Root` dictionary.
    pub fn catalog(&mut self) -> Result<PdfDict> {
        let root = self.trailer.get("Root").cloned().unwrap_or(PdfObject::Null);
        Ok(self.resolve(&root)?.as_dict()?.clone())
    }

    /// Text entries of the `/Info` dictionary.
    pub fn info(&mut self) -> Result<IndexMap<String, String>> {
        let mut out = IndexMap::new();
        let Some(info) = self.trailer.get("Info").cloned() else {
            return Ok(out);
        };
        let info = self.resolve(&info)?;
        let Ok(dict) = info.as_dict() else {
            return Ok(out);
        };
        for (key, value) in dict {
            match &*self.resolve(value)? {
                PdfObject::String(s) => {
                    out.insert(key.clone(), s.to_text());
                }
                PdfObject::Name(n) => {
                    out.insert(key.clone(), n.clone());
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Writes all live objects into a new file, decrypted.
    pub fn save(&mut self, options: WriterOptions) -> Result<Vec<u8>> {
        PdfFileWriter::from_reader(self, options)?.write()
    }

    pub fn trailer(&self) -> &PdfDict {
        &self.trailer
    }

    /// Version from the file header.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Junk bytes before `%PDF-`.
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// One past the highest object number in use.
    pub fn xref_size(&self) -> usize {
        self.xref.len().max(self.objects.len())
    }

    pub fn is_rebuilt(&self) -> bool {
        self.rebuilt
    }

    pub fn is_new_xref_type(&self) -> bool {
        self.new_xref_type
    }

    pub fn is_hybrid_xref(&self) -> bool {
        self.hybrid
    }

    pub fn is_partial(&self) -> bool {
        self.options.partial
    }

    pub fn is_encrypted(&self) -> bool {
        self.decryptor.is_some()
    }

    pub fn crypto_mode(&self) -> Option<CryptoMode> {
        self.decryptor.as_ref().map(|d| d.crypto_mode())
    }

    /// The `/P` flags; all bits set for documents without encryption.
    pub fn permissions(&self) -> i32 {
        self.decryptor.as_ref().map_or(-1, |d| d.permissions())
    }

    pub fn is_opened_with_full_permissions(&self) -> bool {
        match &self.decryptor {
            None => true,
            Some(d) => d.owner_access() || self.options.assume_owner_access,
        }
    }

    /// Live object numbers in ascending order, new objects included.
    pub fn live_numbers(&self) -> Vec<u32> {
        let mut nums: Vec<u32> = self.xref.live().map(|(num, _)| num).collect();
        nums.extend(self.dirty.iter().copied());
        nums.sort_unstable();
        nums.dedup();
        nums
    }

    pub(crate) fn encrypt_ref(&self) -> Option<ObjRef> {
        self.encrypt_ref
    }

    pub(crate) fn generation_of(&self, num: u32) -> u16 {
        match self.xref.get(num) {
            Some(XrefSlot::Offset { generation, .. }) => generation,
            _ => 0,
        }
    }

    pub(crate) fn free_object(&mut self, num: u32) {
        if num == 0 {
            return;
        }
        self.xref.free(num);
        self.dirty.remove(&num);
        if let Some(slot) = self.objects.get_mut(num as usize) {
            *slot = None;
        }
    }

    fn ensure_slot(&mut self, num: usize) {
        if self.objects.len() <= num {
            self.objects.resize(num + 1, None);
        }
    }

    fn store(&mut self, num: u32, obj: Arc<PdfObject>) {
        self.ensure_slot(num as usize);
        self.objects[num as usize] = Some(obj);
    }

    fn read_object(&mut self, num: u32) -> Result<Option<PdfObject>> {
        match self.xref.get(num) {
            None | Some(XrefSlot::Free) => Ok(None),
            Some(XrefSlot::Offset { offset, generation }) => {
                if !self.reading.insert(num) {
                    return Err(PdfError::corrupt(format!(
                        "object {num} is needed to read itself"
                    )));
                }
                let result = self.parse_at(num, offset, generation);
                self.reading.remove(&num);
                result.map(Some)
            }
            Some(XrefSlot::InObjectStream { container, index }) => {
                self.read_from_object_stream(num, container, index).map(Some)
            }
        }
    }

    fn parse_at(&mut self, num: u32, offset: usize, generation: u16) -> Result<PdfObject> {
        let data = self.data.clone();
        if offset >= data.len() {
            return Err(PdfError::corrupt(format!(
                "object {num} offset {offset} is beyond the end of the file"
            )));
        }
        let raw = ObjectParser::at(&data, offset).read_indirect_object()?;
        if raw.id.num != num {
            return Err(PdfError::corrupt(format!(
                "expected object {num} at offset {offset}, found {}",
                raw.id
            )));
        }
        if raw.id.generation != generation {
            debug!(num, expected = generation, found = raw.id.generation, "generation mismatch");
        }

        let mut object = match (raw.object, raw.stream_start) {
            (PdfObject::Dictionary(dict), Some(start)) => {
                let declared = self.declared_length(&dict);
                let (len, _) = resolve_stream_length(&data, start, declared);
                let payload = data.slice(start..start + len);
                PdfObject::Stream(Box::new(PdfStream::from_file(dict, payload, start)))
            }
            (object, _) => object,
        };
        self.decrypt_object(raw.id, &mut object)?;
        Ok(object)
    }

    fn declared_length(&mut self, dict: &PdfDict) -> Option<usize> {
        let length = match dict.get("Length")? {
            PdfObject::Reference(r) => {
                if self.reading.contains(&r.num) {
                    return None;
                }
                match self.get_pdf_object(*r) {
                    Ok(obj) => obj.as_i64().ok()?,
                    Err(err) => {
                        debug!(length = %r, %err, "indirect /Length unreadable");
                        return None;
                    }
                }
            }
            other => other.as_i64().ok()?,
        };
        usize::try_from(length).ok()
    }

    fn decrypt_object(&self, id: ObjRef, object: &mut PdfObject) -> Result<()> {
        let Some(decryptor) = &self.decryptor else {
            return Ok(());
        };
        if self.encrypt_ref.is_some_and(|r| r.num == id.num) {
            return Ok(());
        }
        if let PdfObject::Stream(stream) = object {
            if stream.dict.is_type("XRef") {
                return Ok(());
            }
            if !stream.has_crypt_filter() && !stream.is_decrypted() {
                let plain =
                    decryptor.decrypt(id, stream.raw_bytes(), Target::Stream(&stream.dict))?;
                stream.set_decrypted(Bytes::from(plain));
            }
        }
        let mut pending: Vec<&mut PdfObject> = vec![object];
        while let Some(obj) = pending.pop() {
            match obj {
                PdfObject::String(s) => {
                    let plain = decryptor.decrypt(id, &s.bytes, Target::String)?;
                    s.set_bytes(plain);
                }
                PdfObject::Array(items) => pending.extend(items.iter_mut()),
                PdfObject::Dictionary(d) => pending.extend(d.values_mut()),
                PdfObject::Stream(s) => pending.extend(s.dict.values_mut()),
                _ => {}
            }
        }
        Ok(())
    }

    fn read_from_object_stream(&mut self, num: u32, container: u32, index: u32) -> Result<PdfObject> {
        let stream = self.object_stream(container)?;
        let offset = match stream.members.get(index as usize) {
            Some(&(member, offset)) if member == num => offset,
            _ => stream
                .members
                .iter()
                .find(|(member, _)| *member == num)
                .map(|&(_, offset)| offset)
                .ok_or_else(|| {
                    PdfError::corrupt(format!("object {num} is not in object stream {container}"))
                })?,
        };
        let start = stream
            .first
            .checked_add(offset)
            .filter(|&start| start <= stream.data.len())
            .ok_or_else(|| {
                PdfError::corrupt(format!("object {num} lies outside object stream {container}"))
            })?;
        ObjectParser::at(&stream.data, start).read_object_stream_member()
    }

    fn object_stream(&mut self, container: u32) -> Result<Arc<ObjectStream>> {
        if let Some(stream) = self.object_streams.get(&container) {
            return Ok(stream.clone());
        }
        if !self.expanding.insert(container) {
            return Err(PdfError::corrupt(format!(
                "object stream {container} contains itself"
            )));
        }
        let result = self.decode_object_stream(container);
        self.expanding.remove(&container);
        let stream = Arc::new(result?);
        if self.options.partial {
            self.object_streams.clear();
        }
        self.object_streams.insert(container, stream.clone());
        Ok(stream)
    }

    fn decode_object_stream(&mut self, container: u32) -> Result<ObjectStream> {
        let obj = self.get_pdf_object(ObjRef::new(container, 0))?;
        let stream = obj.as_stream()?;
        if !stream.dict.is_type("ObjStm") {
            debug!(container, "object stream without /Type /ObjStm");
        }
        let count = stream
            .dict
            .get_i64("N")
            .filter(|&n| n >= 0)
            .ok_or_else(|| PdfError::corrupt(format!("object stream {container} has no /N")))?
            as usize;
        let first = stream
            .dict
            .get_i64("First")
            .filter(|&f| f >= 0)
            .ok_or_else(|| PdfError::corrupt(format!("object stream {container} has no /First")))?
            as usize;
        let data = self.get_stream_bytes(stream)?;

        let mut tok = Tokenizer::new(&data[..first.min(data.len())]);
        let mut members = Vec::with_capacity(count.min(data.len()));
        for _ in 0..count {
            let mut pair = [0i64; 2];
            for value in &mut pair {
                if !tok.next_token()? || tok.token_type() != TokenType::Number {
                    warn!(container, read = members.len(), count, "object stream header ends early");
                    return Ok(ObjectStream {
                        data,
                        first,
                        members,
                    });
                }
                *value = tok.int_value();
            }
            let [num, offset] = pair;
            if num > 0 && offset >= 0 {
                members.push((num as u32, offset as usize));
            }
        }
        Ok(ObjectStream {
            data,
            first,
            members,
        })
    }
}

impl ObjectSink for PdfReader {
    fn add_object(&mut self, obj: PdfObject) -> ObjRef {
        self.add_pdf_object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::PdfString;

    /// Lays out `bodies` as objects 1..=n with a classic table.
    fn classic_pdf(bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let startxref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {trailer_extra}>>\nstartxref\n{startxref}\n%%EOF\n",
                bodies.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    const MINIMAL: [&str; 3] = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R >>",
    ];

    #[test]
    fn header_after_junk() {
        let mut data = b"garbage bytes\n".to_vec();
        data.extend(classic_pdf(&MINIMAL, ""));
        let reader = PdfReader::open(data, ReaderOptions::new()).unwrap();
        assert_eq!(reader.header_offset(), 14);
        assert_eq!(reader.version(), "1.4");
        assert!(!reader.is_rebuilt());
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = PdfReader::open(b"not a pdf".to_vec(), ReaderOptions::new()).unwrap_err();
        assert!(matches!(err, PdfError::InvalidHeader));
    }

    #[test]
    fn wrong_object_at_offset_forces_rebuild() {
        let mut data = classic_pdf(&MINIMAL, "");
        // point object 2 at object 1
        let entry = b"0000000009 00000 n \n";
        let table = data.windows(5).position(|w| w == b"xref\n").unwrap();
        let second = table + b"xref\n0 4\n".len() + 2 * 20;
        data[second..second + 20].copy_from_slice(entry);
        let reader = PdfReader::open(data, ReaderOptions::new()).unwrap();
        assert!(reader.is_rebuilt());
        assert_eq!(reader.number_of_pages(), 1);
    }

    #[test]
    fn indirect_length_and_wrong_length() {
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
            "<< /Length 5 0 R >>\nstream\nBT ET\nendstream",
            "5",
            "<< /Length 99 >>\nstream\n0 0 m\nendstream",
        ];
        let mut reader = PdfReader::open(classic_pdf(&bodies, ""), ReaderOptions::new()).unwrap();
        let content = reader.get_pdf_object(ObjRef::new(4, 0)).unwrap();
        assert_eq!(content.as_stream().unwrap().raw_bytes().as_ref(), b"BT ET");
        let recovered = reader.get_pdf_object(ObjRef::new(6, 0)).unwrap();
        assert_eq!(recovered.as_stream().unwrap().raw_bytes().as_ref(), b"0 0 m");
    }

    #[test]
    fn lenient_reads_broken_object_as_null() {
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R /Extra 4 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "(unterminated",
        ];
        let data = classic_pdf(&bodies, "");
        let strict = PdfReader::open(data.clone(), ReaderOptions::new());
        assert!(strict.is_err());
        let mut lenient = PdfReader::open(data, ReaderOptions::new().lenient(true)).unwrap();
        assert!(lenient.get_pdf_object(ObjRef::new(4, 0)).unwrap().is_null());
    }

    #[test]
    fn copy_on_write_and_new_objects() {
        let mut reader = PdfReader::open(classic_pdf(&MINIMAL, ""), ReaderOptions::new()).unwrap();
        let before = reader.get_pdf_object(ObjRef::new(3, 0)).unwrap();
        reader
            .get_pdf_object_mut(ObjRef::new(3, 0))
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .insert("Rotate", 90);
        assert!(!before.as_dict().unwrap().contains_key("Rotate"));
        let after = reader.get_pdf_object(ObjRef::new(3, 0)).unwrap();
        assert_eq!(after.as_dict().unwrap().get_i64("Rotate"), Some(90));

        let added = reader.add_pdf_object(PdfObject::String(PdfString::new("note")));
        assert_eq!(added.num, 4);
        assert!(reader.live_numbers().contains(&4));
    }

    #[test]
    fn partial_mode_releases_and_rereads() {
        let mut reader = PdfReader::open(
            classic_pdf(&MINIMAL, ""),
            ReaderOptions::new().partial(true),
        )
        .unwrap();
        let first = reader.get_pdf_object(ObjRef::new(3, 0)).unwrap();
        reader.release_last_xref_partial();
        let again = reader.get_pdf_object(ObjRef::new(3, 0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(first, again);
    }

    #[test]
    fn unused_objects_are_removed() {
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "(orphan)",
        ];
        let mut reader = PdfReader::open(classic_pdf(&bodies, ""), ReaderOptions::new()).unwrap();
        assert_eq!(reader.remove_unused_objects().unwrap(), 1);
        assert!(reader.get_pdf_object(ObjRef::new(4, 0)).unwrap().is_null());
        assert_eq!(reader.live_numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn kill_xref_follows_references() {
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "[5 0 R 5 0 R]",
            "<< /Back 4 0 R >>",
        ];
        let mut reader = PdfReader::open(classic_pdf(&bodies, ""), ReaderOptions::new()).unwrap();
        reader.kill_xref(&PdfObject::Reference(ObjRef::new(4, 0))).unwrap();
        assert_eq!(reader.live_numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn info_strings_are_decoded() {
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "<< /Title <FEFF00480069> /Producer (lectern) >>",
        ];
        let mut reader =
            PdfReader::open(classic_pdf(&bodies, "/Info 4 0 R "), ReaderOptions::new()).unwrap();
        let info = reader.info().unwrap();
        assert_eq!(info["Title"], "Hi");
        assert_eq!(info["Producer"], "lectern");
    }
}
