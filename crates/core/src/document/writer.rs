//! PdfFileWriter - writes a complete document from a set of objects.
//!
//! Objects keep the numbers they are given; the cross-reference section is
//! a classic table or an xref stream, optionally with object streams.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::debug;

use crate::codec::flate::flate_encode;
use crate::error::Result;
use crate::model::objects::{ObjRef, ObjectSink, PdfDict, PdfObject, PdfStream};
use crate::model::serialize::write_object;

use super::options::WriterOptions;
use super::reader::PdfReader;

/// Objects per object stream.
const OBJECTS_PER_STREAM: usize = 100;

/// Binary marker comment written after the header.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Where an object ended up in the output.
#[derive(Debug, Clone, Copy)]
enum Location {
    Offset { offset: usize, generation: u16 },
    Packed { container: u32, index: u32 },
}

/// Collects objects and writes them as a PDF file.
#[derive(Debug, Clone)]
pub struct PdfFileWriter {
    objects: BTreeMap<u32, (u16, PdfObject)>,
    next_num: u32,
    options: WriterOptions,
    version: String,
    trailer: PdfDict,
}

impl PdfFileWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_num: 1,
            options,
            version: "1.7".to_string(),
            trailer: PdfDict::new(),
        }
    }

    /// Copies the live objects of `reader`, decrypted, keeping their
    /// numbers. The encryption dictionary and any xref or object streams
    /// of the source are left out.
    pub fn from_reader(reader: &mut PdfReader, options: WriterOptions) -> Result<Self> {
        let mut writer = Self::new(options);
        writer.version = reader.version().to_string();
        let encrypt = reader.encrypt_ref();
        for num in reader.live_numbers() {
            if encrypt.is_some_and(|r| r.num == num) {
                continue;
            }
            let generation = reader.generation_of(num);
            let obj = reader.get_pdf_object(ObjRef::new(num, generation))?;
            let skip = matches!(&*obj, PdfObject::Stream(s)
                if s.dict.is_type("XRef") || s.dict.is_type("ObjStm"));
            if !skip {
                writer.set_object(ObjRef::new(num, generation), (*obj).clone());
            }
            reader.release_object(num);
        }
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = reader.trailer().get(key) {
                writer.trailer.insert(key, value.clone());
            }
        }
        Ok(writer)
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    /// Puts `obj` under the number and generation of `r`.
    pub fn set_object(&mut self, r: ObjRef, obj: PdfObject) {
        self.objects.insert(r.num, (r.generation, obj));
        self.next_num = self.next_num.max(r.num + 1);
    }

    pub fn add_object(&mut self, obj: PdfObject) -> ObjRef {
        let r = ObjRef::new(self.next_num, 0);
        self.set_object(r, obj);
        r
    }

    pub fn set_root(&mut self, root: ObjRef) {
        self.trailer.insert("Root", root);
    }

    pub fn set_info(&mut self, info: ObjRef) {
        self.trailer.insert("Info", info);
    }

    /// Trailer entries besides `/Size`.
    pub fn trailer_mut(&mut self) -> &mut PdfDict {
        &mut self.trailer
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serializes the document.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn write_to(&self, sink: &mut impl Write) -> Result<()> {
        let mut out = Vec::new();
        let version = if self.options.xref_stream && self.version.as_str() < "1.5" {
            "1.5"
        } else {
            self.version.as_str()
        };
        out.extend_from_slice(format!("%PDF-{version}\n").as_bytes());
        out.extend_from_slice(BINARY_MARKER);

        let mut locations: BTreeMap<u32, Location> = BTreeMap::new();
        let mut packable = Vec::new();
        for (&num, (generation, obj)) in &self.objects {
            let obj = self.prepare(obj)?;
            if self.options.object_streams && *generation == 0 && !matches!(obj, PdfObject::Stream(_)) {
                packable.push((num, obj));
                continue;
            }
            let offset = out.len();
            write_indirect(&mut out, num, *generation, &obj);
            locations.insert(
                num,
                Location::Offset {
                    offset,
                    generation: *generation,
                },
            );
        }

        let mut next_num = self.next_num;
        for batch in packable.chunks(OBJECTS_PER_STREAM) {
            let container = next_num;
            next_num += 1;
            let stream = pack_object_stream(batch)?;
            for (index, (num, _)) in batch.iter().enumerate() {
                locations.insert(
                    *num,
                    Location::Packed {
                        container,
                        index: index as u32,
                    },
                );
            }
            let offset = out.len();
            write_indirect(&mut out, container, 0, &PdfObject::Stream(Box::new(stream)));
            locations.insert(container, Location::Offset { offset, generation: 0 });
        }

        if self.options.xref_stream {
            self.write_xref_stream(&mut out, &locations, next_num)?;
        } else {
            self.write_xref_table(&mut out, &locations, next_num);
        }
        debug!(objects = locations.len(), bytes = out.len(), "document written");
        sink.write_all(&out)?;
        Ok(())
    }

    /// Keeps `/Length` honest and compresses bare streams when asked.
    fn prepare(&self, obj: &PdfObject) -> Result<PdfObject> {
        let PdfObject::Stream(stream) = obj else {
            return Ok(obj.clone());
        };
        let mut stream = stream.as_ref().clone();
        if self.options.compress_streams && !stream.dict.contains_key("Filter") {
            let packed = flate_encode(stream.raw_bytes())?;
            stream.dict.insert("Filter", PdfObject::name("FlateDecode"));
            stream.set_raw(packed);
        } else {
            let raw = stream.raw_bytes().clone();
            stream.set_raw(raw);
        }
        Ok(PdfObject::Stream(Box::new(stream)))
    }

    fn write_xref_table(&self, out: &mut Vec<u8>, locations: &BTreeMap<u32, Location>, size: u32) {
        let start = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for num in 1..size {
            match locations.get(&num) {
                Some(Location::Offset { offset, generation }) => {
                    out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes())
                }
                _ => out.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }
        let mut trailer = self.trailer.clone();
        trailer.insert("Size", size);
        out.extend_from_slice(b"trailer\n");
        write_object(&PdfObject::Dictionary(trailer), out);
        out.extend_from_slice(format!("\nstartxref\n{start}\n%%EOF\n").as_bytes());
    }

    fn write_xref_stream(
        &self,
        out: &mut Vec<u8>,
        locations: &BTreeMap<u32, Location>,
        xref_num: u32,
    ) -> Result<()> {
        let start = out.len();
        let size = xref_num + 1;
        let widest = locations
            .values()
            .map(|loc| match loc {
                Location::Offset { offset, .. } => *offset as u64,
                Location::Packed { container, .. } => *container as u64,
            })
            .chain([start as u64])
            .max()
            .unwrap_or(0);
        let width = (1..8usize).find(|&w| widest < 1u64 << (8 * w)).unwrap_or(8);

        let mut rows = Vec::with_capacity(size as usize * (width + 3));
        let mut push = |kind: u8, field: u64, extra: u16| {
            rows.push(kind);
            rows.extend_from_slice(&field.to_be_bytes()[8 - width..]);
            rows.extend_from_slice(&extra.to_be_bytes());
        };
        push(0, 0, 65535);
        for num in 1..xref_num {
            match locations.get(&num) {
                Some(Location::Offset { offset, generation }) => push(1, *offset as u64, *generation),
                Some(Location::Packed { container, index }) => {
                    push(2, *container as u64, *index as u16)
                }
                None => push(0, 0, 0),
            }
        }
        push(1, start as u64, 0);

        let mut dict = self.trailer.clone();
        dict.insert("Type", PdfObject::name("XRef"));
        dict.insert("Size", size);
        dict.insert("W", PdfObject::numbers(&[1.0, width as f64, 2.0]));
        let payload = if self.options.compress_streams {
            dict.insert("Filter", PdfObject::name("FlateDecode"));
            flate_encode(&rows)?
        } else {
            rows
        };
        let mut stream = PdfStream::new(dict, Vec::new());
        stream.set_raw(payload);
        write_indirect(out, xref_num, 0, &PdfObject::Stream(Box::new(stream)));
        out.extend_from_slice(format!("startxref\n{start}\n%%EOF\n").as_bytes());
        Ok(())
    }
}

fn write_indirect(out: &mut Vec<u8>, num: u32, generation: u16, obj: &PdfObject) {
    out.extend_from_slice(format!("{num} {generation} obj\n").as_bytes());
    write_object(obj, out);
    out.extend_from_slice(b"\nendobj\n");
}

/// Packs non-stream objects into one compressed object stream.
fn pack_object_stream(batch: &[(u32, PdfObject)]) -> Result<PdfStream> {
    let mut header = Vec::new();
    let mut body = Vec::new();
    for (num, obj) in batch {
        header.extend_from_slice(format!("{num} {} ", body.len()).as_bytes());
        write_object(obj, &mut body);
        body.push(b'\n');
    }
    let first = header.len();
    header.extend_from_slice(&body);

    let mut dict = PdfDict::with_type("ObjStm");
    dict.insert("N", batch.len());
    dict.insert("First", first);
    dict.insert("Filter", PdfObject::name("FlateDecode"));
    let mut stream = PdfStream::new(dict, Vec::new());
    stream.set_raw(flate_encode(&header)?);
    Ok(stream)
}

impl ObjectSink for PdfFileWriter {
    fn add_object(&mut self, obj: PdfObject) -> ObjRef {
        PdfFileWriter::add_object(self, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PdfReader, ReaderOptions};
    use crate::model::objects::PdfString;

    fn one_page(writer: &mut PdfFileWriter) {
        let mut catalog = PdfDict::with_type("Catalog");
        catalog.insert("Pages", ObjRef::new(2, 0));
        writer.set_object(ObjRef::new(1, 0), catalog.into());
        let mut pages = PdfDict::with_type("Pages");
        pages.insert("Kids", vec![PdfObject::Reference(ObjRef::new(3, 0))]);
        pages.insert("Count", 1);
        writer.set_object(ObjRef::new(2, 0), pages.into());
        let mut page = PdfDict::with_type("Page");
        page.insert("Parent", ObjRef::new(2, 0));
        page.insert("Contents", ObjRef::new(4, 0));
        writer.set_object(ObjRef::new(3, 0), page.into());
        writer.set_object(
            ObjRef::new(4, 0),
            PdfStream::new(PdfDict::new(), b"0 0 10 10 re f".to_vec()).into(),
        );
        writer.set_object(ObjRef::new(5, 0), PdfString::new("title").into());
        writer.set_root(ObjRef::new(1, 0));
    }

    #[test]
    fn every_layout_reads_back() {
        let layouts = [
            WriterOptions::new(),
            WriterOptions::new().compress_streams(true),
            WriterOptions::new().xref_stream(true),
            WriterOptions::compact(),
        ];
        for options in layouts {
            let mut writer = PdfFileWriter::new(options);
            one_page(&mut writer);
            let bytes = writer.write().unwrap();
            let mut reader = PdfReader::open(bytes, ReaderOptions::new()).unwrap();
            assert!(!reader.is_rebuilt(), "{options:?}");
            assert_eq!(reader.is_new_xref_type(), options.xref_stream);
            assert_eq!(reader.number_of_pages(), 1);
            assert_eq!(reader.page_content(1).unwrap(), b"0 0 10 10 re f");
            let title = reader.get_pdf_object(ObjRef::new(5, 0)).unwrap();
            assert_eq!(title.as_string().unwrap().as_bytes(), b"title");
        }
    }

    #[test]
    fn generations_survive() {
        let mut writer = PdfFileWriter::new(WriterOptions::new());
        one_page(&mut writer);
        writer.set_object(ObjRef::new(6, 3), PdfObject::from(42));
        let bytes = writer.write().unwrap();
        assert!(bytes.windows(9).any(|w| w == b"6 3 obj\n4"));
        let mut reader = PdfReader::open(bytes, ReaderOptions::new()).unwrap();
        assert_eq!(reader.get_pdf_object(ObjRef::new(6, 3)).unwrap().as_i64().unwrap(), 42);
    }

    #[test]
    fn added_objects_take_fresh_numbers() {
        let mut writer = PdfFileWriter::new(WriterOptions::new());
        one_page(&mut writer);
        let r = writer.add_object(PdfObject::Null);
        assert_eq!(r, ObjRef::new(6, 0));
        assert_eq!(writer.len(), 6);
    }
}
