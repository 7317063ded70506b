//! PDF syntax output for objects and numbers.

use super::objects::{PdfObject, PdfStream, PdfString};

/// Pending output while walking an object graph without recursion.
enum Piece<'a> {
    Object(&'a PdfObject),
    Key(&'a str),
    Literal(&'static [u8]),
    StreamBody(&'a PdfStream),
}

/// Formats a number for object syntax: integers without a fraction,
/// everything else with the shortest exact decimal form.
pub fn format_number(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        let i = v as i64;
        return i.to_string();
    }
    format!("{v}")
}

/// Formats a number for content streams.
///
/// Below 1 the value keeps five decimals, up to 32767 it keeps two, and
/// above that it is rounded to an integer. Trailing zeros are dropped and
/// anything within 0.000015 of zero prints as `0`.
pub fn format_content_number(v: f64) -> String {
    if !v.is_finite() || v.abs() < 0.000015 {
        return "0".to_string();
    }
    let negative = v < 0.0;
    let d = v.abs();
    let body = if d < 1.0 {
        let scaled = ((d + 0.000005) * 100_000.0) as u64;
        if scaled >= 100_000 {
            "1".to_string()
        } else {
            let frac = format!("{scaled:05}");
            format!("0.{}", frac.trim_end_matches('0'))
        }
    } else if d <= 32767.0 {
        let scaled = ((d + 0.005) * 100.0) as u64;
        let (int, frac) = (scaled / 100, scaled % 100);
        if frac == 0 {
            int.to_string()
        } else {
            let frac = format!("{frac:02}");
            format!("{int}.{}", frac.trim_end_matches('0'))
        }
    } else {
        ((d + 0.5) as u64).to_string()
    };
    if negative { format!("-{body}") } else { body }
}

fn name_needs_escape(b: u8) -> bool {
    !(0x21..=0x7E).contains(&b)
        || matches!(
            b,
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
}

/// Writes `/Name`, escaping delimiters and non-printable bytes as `#XX`.
pub fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    let mut buf = [0u8; 4];
    for c in name.chars() {
        let bytes: &[u8] = if (c as u32) <= 0xFF {
            buf[0] = c as u32 as u8;
            &buf[..1]
        } else {
            c.encode_utf8(&mut buf).as_bytes()
        };
        for &b in bytes {
            if name_needs_escape(b) {
                out.extend_from_slice(format!("#{b:02X}").as_bytes());
            } else {
                out.push(b);
            }
        }
    }
}

/// Writes a string in the syntax it was read with.
pub fn write_string(s: &PdfString, out: &mut Vec<u8>) {
    if s.hex {
        out.push(b'<');
        for b in &s.bytes {
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        out.push(b'>');
        return;
    }
    out.push(b'(');
    for &b in &s.bytes {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            _ => out.push(b),
        }
    }
    out.push(b')');
}

/// Appends the PDF syntax of `obj` to `out`.
pub fn write_object(obj: &PdfObject, out: &mut Vec<u8>) {
    let mut pending = vec![Piece::Object(obj)];
    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Literal(bytes) => out.extend_from_slice(bytes),
            Piece::Key(name) => write_name(name, out),
            Piece::StreamBody(stream) => {
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(stream.raw_bytes());
                out.extend_from_slice(b"\nendstream");
            }
            Piece::Object(obj) => match obj {
                PdfObject::Null => out.extend_from_slice(b"null"),
                PdfObject::Boolean(true) => out.extend_from_slice(b"true"),
                PdfObject::Boolean(false) => out.extend_from_slice(b"false"),
                PdfObject::Number(n) => out.extend_from_slice(format_number(*n).as_bytes()),
                PdfObject::Name(n) => write_name(n, out),
                PdfObject::String(s) => write_string(s, out),
                PdfObject::Reference(r) => {
                    out.extend_from_slice(format!("{} {} R", r.num, r.generation).as_bytes())
                }
                PdfObject::Array(items) => {
                    out.push(b'[');
                    pending.push(Piece::Literal(b"]"));
                    for (i, item) in items.iter().enumerate().rev() {
                        pending.push(Piece::Object(item));
                        if i > 0 {
                            pending.push(Piece::Literal(b" "));
                        }
                    }
                }
                PdfObject::Dictionary(dict) => {
                    out.extend_from_slice(b"<<");
                    pending.push(Piece::Literal(b">>"));
                    for (key, value) in dict.iter().rev() {
                        pending.push(Piece::Object(value));
                        pending.push(Piece::Literal(b" "));
                        pending.push(Piece::Key(key));
                    }
                }
                PdfObject::Stream(stream) => {
                    pending.push(Piece::StreamBody(stream));
                    out.extend_from_slice(b"<<");
                    pending.push(Piece::Literal(b">>"));
                    for (key, value) in stream.dict.iter().rev() {
                        pending.push(Piece::Object(value));
                        pending.push(Piece::Literal(b" "));
                        pending.push(Piece::Key(key));
                    }
                }
            },
        }
    }
}

/// Serializes an object into a fresh buffer.
pub fn to_bytes(obj: &PdfObject) -> Vec<u8> {
    let mut out = Vec::new();
    write_object(obj, &mut out);
    out
}
