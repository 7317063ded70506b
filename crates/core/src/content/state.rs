//! Graphics state mirrored by the content writer.

use std::sync::Arc;

use crate::model::objects::ObjRef;
use crate::utils::{MATRIX_IDENTITY, Matrix, mult_matrix};

/// Glyph metrics the writer needs to track the text position.
pub trait FontMetrics: Send + Sync {
    /// Font dictionary registered in the page resources.
    fn font_ref(&self) -> ObjRef;

    /// Advance width of `c` in thousandths of text space.
    fn char_width(&self, c: char) -> f64;

    /// Pair adjustment in thousandths of text space; negative pulls the
    /// pair together.
    fn kerning(&self, _left: char, _right: char) -> f64 {
        0.0
    }

    /// Bytes shown for `text`.
    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
            .collect()
    }

    /// Composite fonts ignore word spacing.
    fn is_composite(&self) -> bool {
        false
    }

    /// Width of `text` at `size`, without spacing.
    fn width_point(&self, text: &str, size: f64) -> f64 {
        text.chars().map(|c| self.char_width(c)).sum::<f64>() * size / 1000.0
    }

    /// Width of `text` at `size` with kerning applied.
    fn width_point_kerned(&self, text: &str, size: f64) -> f64 {
        let chars: Vec<char> = text.chars().collect();
        let kern: f64 = chars.windows(2).map(|p| self.kerning(p[0], p[1])).sum();
        self.width_point(text, size) + kern * size / 1000.0
    }
}

/// A fill or stroke colour.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Tint in a Separation or DeviceN colour space object.
    Spot { colorspace: ObjRef, tint: f64 },
    /// A tiling or shading pattern.
    Pattern(ObjRef),
}

impl Default for Color {
    fn default() -> Self {
        Color::Gray(0.0)
    }
}

impl Color {
    /// RGB from 0-255 components.
    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt = 0,
    Round = 1,
    Square = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

/// The state `q` saves and `Q` restores.
#[derive(Clone)]
pub struct GraphicState {
    pub font: Option<Arc<dyn FontMetrics>>,
    /// Resource name of `font`.
    pub font_name: Option<String>,
    pub size: f64,
    pub fill: Color,
    pub stroke: Color,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scaling in percent.
    pub scale: f64,
    pub leading: f64,
    pub rise: f64,
    pub render_mode: i64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    /// Dash array and phase; an empty array draws solid lines.
    pub dash: (Vec<f64>, f64),
    pub ctm: Matrix,
    /// Text line matrix.
    pub tlm: Matrix,
    /// Horizontal text position after the last glyph shown.
    pub tx: f64,
    /// Resource name of the active ExtGState.
    pub ext_gstate: Option<String>,
}

impl Default for GraphicState {
    fn default() -> Self {
        Self {
            font: None,
            font_name: None,
            size: 0.0,
            fill: Color::default(),
            stroke: Color::default(),
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 100.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: (Vec::new(), 0.0),
            ctm: MATRIX_IDENTITY,
            tlm: MATRIX_IDENTITY,
            tx: 0.0,
            ext_gstate: None,
        }
    }
}

impl PartialEq for GraphicState {
    fn eq(&self, other: &Self) -> bool {
        let same_font = match (&self.font, &other.font) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_font
            && self.font_name == other.font_name
            && self.size == other.size
            && self.fill == other.fill
            && self.stroke == other.stroke
            && self.char_spacing == other.char_spacing
            && self.word_spacing == other.word_spacing
            && self.scale == other.scale
            && self.leading == other.leading
            && self.rise == other.rise
            && self.render_mode == other.render_mode
            && self.line_width == other.line_width
            && self.line_cap == other.line_cap
            && self.line_join == other.line_join
            && self.miter_limit == other.miter_limit
            && self.dash == other.dash
            && self.ctm == other.ctm
            && self.tlm == other.tlm
            && self.tx == other.tx
            && self.ext_gstate == other.ext_gstate
    }
}

impl std::fmt::Debug for GraphicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicState")
            .field("font", &self.font_name)
            .field("size", &self.size)
            .field("fill", &self.fill)
            .field("stroke", &self.stroke)
            .field("ctm", &self.ctm)
            .field("tlm", &self.tlm)
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

impl GraphicState {
    /// Moves the text line start by (x, y) in text space (`Td`).
    pub fn move_text(&mut self, x: f64, y: f64) {
        self.tlm = mult_matrix((1.0, 0.0, 0.0, 1.0, x, y), self.tlm);
        self.tx = self.tlm.4;
    }

    pub fn set_text_matrix(&mut self, m: Matrix) {
        self.tlm = m;
        self.tx = m.4;
    }

    /// Horizontal advance of showing `text`: glyph widths, character
    /// spacing between glyphs, word spacing on spaces, then scaling.
    pub fn effective_width(&self, text: &str, kerned: bool) -> f64 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        let mut w = if kerned {
            font.width_point_kerned(text, self.size)
        } else {
            font.width_point(text, self.size)
        };
        let count = text.chars().count();
        if self.char_spacing != 0.0 && count > 1 {
            w += self.char_spacing * (count - 1) as f64;
        }
        if self.word_spacing != 0.0 && !font.is_composite() {
            w += self.word_spacing * text.chars().filter(|&c| c == ' ').count() as f64;
        }
        w * self.scale / 100.0
    }

    /// Horizontal shift of a `TJ` adjustment.
    pub fn adjustment_width(&self, thousandths: f64) -> f64 {
        -thousandths / 1000.0 * self.size * self.scale / 100.0
    }
}
