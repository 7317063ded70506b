//! Geometry and text helpers shared by the reader and the content writer.

/// A rectangle (llx, lly, urx, ury).
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
/// Transforms point (x, y) to (ax + cy + e, bx + dy + f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// US Letter, the media box given to pages that inherit none.
pub const LETTER: Rect = (0.0, 0.0, 612.0, 792.0);

/// Multiplies two matrices: result = m1 * m0 (row-vector convention).
/// The result applies m1 first, then m0, so `cm` is `mult_matrix(m, ctm)`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, (x, y): (f64, f64)) -> (f64, f64) {
    let (a, b, c, d, e, f) = m;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Bounding box of a rectangle after transformation.
pub fn apply_matrix_rect(m: Matrix, (x0, y0, x1, y1): Rect) -> Rect {
    let corners = [
        apply_matrix_pt(m, (x0, y0)),
        apply_matrix_pt(m, (x1, y0)),
        apply_matrix_pt(m, (x1, y1)),
        apply_matrix_pt(m, (x0, y1)),
    ];
    corners.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(l, b, r, t), &(x, y)| (l.min(x), b.min(y), r.max(x), t.max(y)),
    )
}

/// Orders the corners so that llx <= urx and lly <= ury.
pub fn normalize_rect((x0, y0, x1, y1): Rect) -> Rect {
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// PDFDocEncoding code points for 0x18..=0x1F.
const PDF_DOC_LOW: [u16; 8] = [
    0x02D8, 0x02C7, 0x02C6, 0x02D9, 0x02DD, 0x02DB, 0x02DA, 0x02DC,
];

/// PDFDocEncoding code points for 0x80..=0xA0 (0 marks an undefined code).
const PDF_DOC_HIGH: [u16; 33] = [
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203A, 0x2212,
    0x2030, 0x201E, 0x201C, 0x201D, 0x2018, 0x2019, 0x201A, 0x2122, 0xFB01, 0xFB02, 0x0141,
    0x0152, 0x0160, 0x0178, 0x017D, 0x0131, 0x0142, 0x0153, 0x0161, 0x017E, 0x0000, 0x20AC,
];

fn pdf_doc_char(byte: u8) -> Option<char> {
    let cp = match byte {
        0x18..=0x1F => PDF_DOC_LOW[(byte - 0x18) as usize] as u32,
        0x7F | 0xAD => return None,
        0x80..=0xA0 => PDF_DOC_HIGH[(byte - 0x80) as usize] as u32,
        _ => byte as u32,
    };
    if cp == 0 { None } else { char::from_u32(cp) }
}

/// Decodes a text string: UTF-16BE when it carries a BOM, PDFDocEncoding otherwise.
pub fn decode_text(s: &[u8]) -> String {
    if let Some(body) = s.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        s.iter().filter_map(|&b| pdf_doc_char(b)).collect()
    }
}
