//! Small byte-level PDF builders shared by the integration tests.

#![allow(dead_code)]

/// Objects numbered from 1 in the order given, a classic xref table and a
/// trailer with `/Root 1 0 R` plus `trailer_extra`.
pub fn classic_pdf(bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
    let bodies: Vec<Vec<u8>> = bodies.iter().map(|b| b.as_bytes().to_vec()).collect();
    classic_pdf_bytes(&bodies, trailer_extra)
}

pub fn classic_pdf_bytes(bodies: &[Vec<u8>], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let startxref = out.len();
    out.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes(),
    );
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

/// A stream object body with a correct `/Length`.
pub fn stream_body(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< /Length {} {dict_extra}>>\nstream\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

/// One `/W [1 4 2]` xref stream row.
fn xref_row(kind: u8, field: u32, extra: u16) -> Vec<u8> {
    let mut row = vec![kind];
    row.extend_from_slice(&field.to_be_bytes());
    row.extend_from_slice(&extra.to_be_bytes());
    row
}

fn write_object(out: &mut Vec<u8>, num: u32, body: &[u8]) -> usize {
    let offset = out.len();
    out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
    offset
}

/// Objects numbered from 1, with the ones listed in `packed` stored in an
/// object stream numbered right after them.
pub struct PackedBody {
    pub data: Vec<u8>,
    /// Offset of each object written directly, `None` for packed ones.
    pub offsets: Vec<Option<usize>>,
    pub container: u32,
    pub container_offset: usize,
}

impl PackedBody {
    pub fn new(bodies: &[&str], packed: &[u32]) -> Self {
        let mut data = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            let num = i as u32 + 1;
            if packed.contains(&num) {
                offsets.push(None);
            } else {
                offsets.push(Some(write_object(&mut data, num, body.as_bytes())));
            }
        }

        let mut header = String::new();
        let mut members = String::new();
        for &num in packed {
            header.push_str(&format!("{num} {} ", members.len()));
            members.push_str(bodies[num as usize - 1]);
            members.push('\n');
        }
        let container = bodies.len() as u32 + 1;
        let dict = format!("/Type /ObjStm /N {} /First {} ", packed.len(), header.len());
        let stream = stream_body(&dict, format!("{header}{members}").as_bytes());
        let container_offset = write_object(&mut data, container, &stream);
        PackedBody {
            data,
            offsets,
            container,
            container_offset,
        }
    }

    /// Index of `num` inside the object stream.
    fn slot(&self, packed: &[u32], num: u32) -> u16 {
        packed.iter().position(|&p| p == num).expect("packed member") as u16
    }
}

/// A file whose only cross-reference section is an uncompressed xref
/// stream. The stream is object `container + 1`.
pub fn xref_stream_pdf(bodies: &[&str], packed: &[u32], trailer_extra: &str) -> Vec<u8> {
    let body = PackedBody::new(bodies, packed);
    let xref_num = body.container + 1;
    let mut out = body.data.clone();
    let xref_offset = out.len();

    let mut rows = xref_row(0, 0, 65535);
    for (i, offset) in body.offsets.iter().enumerate() {
        let num = i as u32 + 1;
        rows.extend(match offset {
            Some(offset) => xref_row(1, *offset as u32, 0),
            None => xref_row(2, body.container, body.slot(packed, num)),
        });
    }
    rows.extend(xref_row(1, body.container_offset as u32, 0));
    rows.extend(xref_row(1, xref_offset as u32, 0));

    let dict = format!(
        "/Type /XRef /Size {} /W [1 4 2] /Root 1 0 R {trailer_extra}",
        xref_num + 1
    );
    write_object(&mut out, xref_num, &stream_body(&dict, &rows));
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}

/// Appends an update whose cross-reference section is an xref stream
/// numbered `size`, pointing back with `/Prev`.
pub fn append_stream_update(base: &[u8], updates: &[Update<'_>], size: u32) -> Vec<u8> {
    let prev = last_startxref(base);
    let mut out = base.to_vec();
    let mut rows = Vec::new();
    let mut index = Vec::new();
    for update in updates {
        match update {
            Update::Object(num, body) => {
                let offset = write_object(&mut out, *num, body.as_bytes());
                rows.extend(xref_row(1, offset as u32, 0));
                index.push(format!("{num} 1"));
            }
            Update::Free(num) => {
                rows.extend(xref_row(0, 0, 1));
                index.push(format!("{num} 1"));
            }
        }
    }
    let xref_offset = out.len();
    rows.extend(xref_row(1, xref_offset as u32, 0));
    index.push(format!("{size} 1"));

    let dict = format!(
        "/Type /XRef /Size {} /W [1 4 2] /Index [{}] /Root 1 0 R /Prev {prev} ",
        size + 1,
        index.join(" ")
    );
    write_object(&mut out, size, &stream_body(&dict, &rows));
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}

/// A classic table that lists packed objects as free, plus an `/XRefStm`
/// xref stream giving their real location.
pub fn hybrid_pdf(bodies: &[&str], packed: &[u32]) -> Vec<u8> {
    let body = PackedBody::new(bodies, packed);
    let stm_num = body.container + 1;
    let size = stm_num + 1;
    let mut out = body.data.clone();

    let mut rows = Vec::new();
    let mut index = Vec::new();
    for &num in packed {
        rows.extend(xref_row(2, body.container, body.slot(packed, num)));
        index.push(format!("{num} 1"));
    }
    let dict = format!(
        "/Type /XRef /Size {size} /W [1 4 2] /Index [{}] ",
        index.join(" ")
    );
    let stm_offset = write_object(&mut out, stm_num, &stream_body(&dict, &rows));

    let startxref = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in &body.offsets {
        let row = match offset {
            Some(offset) => format!("{offset:010} 00000 n \n"),
            None => "0000000000 00000 f \n".to_string(),
        };
        out.extend_from_slice(row.as_bytes());
    }
    for offset in [body.container_offset, stm_offset] {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Root 1 0 R /XRefStm {stm_offset} >>\nstartxref\n{startxref}\n%%EOF\n"
        )
        .as_bytes(),
    );
    out
}

/// Object number and body for one incremental update.
pub enum Update<'a> {
    Object(u32, &'a str),
    Free(u32),
}

/// Appends an update section to `base`. Each entry gets its own xref
/// subsection; the new trailer points back with `/Prev`.
pub fn append_update(base: &[u8], updates: &[Update<'_>], size: u32) -> Vec<u8> {
    let prev = last_startxref(base);
    let mut out = base.to_vec();
    let mut rows = Vec::new();
    for update in updates {
        match update {
            Update::Object(num, body) => {
                rows.push(format!("{num} 1\n{:010} 00000 n \n", out.len()));
                out.extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
            }
            Update::Free(num) => rows.push(format!("{num} 1\n0000000000 00001 f \n")),
        }
    }
    let startxref = out.len();
    out.extend_from_slice(b"xref\n");
    for row in rows {
        out.extend_from_slice(row.as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Root 1 0 R /Prev {prev} >>\nstartxref\n{startxref}\n%%EOF\n"
        )
        .as_bytes(),
    );
    out
}

pub fn last_startxref(data: &[u8]) -> usize {
    let text = String::from_utf8_lossy(data);
    let at = text.rfind("startxref").expect("startxref present");
    text[at + "startxref".len()..]
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .expect("startxref offset")
}

/// Catalog, a `/Pages` node carrying `/MediaBox`, and `count` leaf pages.
pub fn pages_pdf(count: usize, media_box: &str) -> Vec<u8> {
    let kids: Vec<String> = (0..count).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut bodies = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {count} /MediaBox {media_box} >>",
            kids.join(" ")
        ),
    ];
    for _ in 0..count {
        bodies.push("<< /Type /Page /Parent 2 0 R >>".to_string());
    }
    let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
    classic_pdf(&refs, "")
}

/// Replaces the first occurrence of `from` with `to`.
pub fn replace_bytes(data: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let at = data
        .windows(from.len())
        .position(|w| w == from)
        .expect("pattern present");
    let mut out = data[..at].to_vec();
    out.extend_from_slice(to);
    out.extend_from_slice(&data[at + from.len()..]);
    out
}

pub fn find_bytes(data: &[u8], needle: &[u8]) -> usize {
    data.windows(needle.len())
        .position(|w| w == needle)
        .expect("pattern present")
}
