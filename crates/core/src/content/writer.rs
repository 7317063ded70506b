//! Content stream writer.
//!
//! [`ContentWriter`] appends operators to a byte buffer and keeps a
//! [`GraphicState`] mirror in step with them. Every method that emits a
//! state operator updates the mirror in the same call.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::codec::flate_encode;
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, ObjectSink, PdfDict, PdfObject, PdfStream, PdfString};
use crate::model::serialize::{format_content_number, write_name, write_object, write_string};
use crate::utils::{Matrix, Rect, apply_matrix_rect, mult_matrix};

use super::image::{
    AnnotationFactory, Image, ImageCodec, UriLinkFactory, image_xobject, inline_header,
};
use super::resources::{PageResources, ResourceKind};
use super::state::{Color, FontMetrics, GraphicState, LineCap, LineJoin};

/// Control points of a quarter circle of radius 1.
const KAPPA: f64 = 0.552_284_749_8;

/// One element of a `TJ` array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextArrayItem {
    Text(String),
    /// Adjustment in thousandths of text space, subtracted from the
    /// position.
    Adjust(f64),
}

/// Property list of a `BDC` operator.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkedProperties {
    Inline(PdfDict),
    /// Registered under `/Properties` in the resources.
    Indirect(ObjRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

pub struct ContentWriter {
    content: Vec<u8>,
    state: GraphicState,
    saved: Vec<GraphicState>,
    in_text: bool,
    marked_depth: usize,
    tagged: bool,
    resources: Rc<RefCell<PageResources>>,
    annotation_factory: Arc<dyn AnnotationFactory>,
    annotations: Vec<PdfDict>,
}

impl Default for ContentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentWriter")
            .field("len", &self.content.len())
            .field("state", &self.state)
            .field("depth", &self.saved.len())
            .field("in_text", &self.in_text)
            .field("marked_depth", &self.marked_depth)
            .field("tagged", &self.tagged)
            .finish()
    }
}

impl ContentWriter {
    pub fn new() -> Self {
        Self::with_resources(PageResources::new())
    }

    /// A writer for tagged content: text objects are closed and opened
    /// automatically around operators that need it.
    pub fn tagged() -> Self {
        Self {
            tagged: true,
            ..Self::new()
        }
    }

    /// Writes into a page that already has `/Resources`.
    pub fn with_resources(resources: PageResources) -> Self {
        Self {
            content: Vec::new(),
            state: GraphicState::default(),
            saved: Vec::new(),
            in_text: false,
            marked_depth: 0,
            tagged: false,
            resources: Rc::new(RefCell::new(resources)),
            annotation_factory: Arc::new(UriLinkFactory),
            annotations: Vec::new(),
        }
    }

    pub fn set_annotation_factory(&mut self, factory: Arc<dyn AnnotationFactory>) {
        self.annotation_factory = factory;
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    pub fn is_in_text(&self) -> bool {
        self.in_text
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn state(&self) -> &GraphicState {
        &self.state
    }

    /// Depth of the `q` stack.
    pub fn state_depth(&self) -> usize {
        self.saved.len()
    }

    pub fn marked_depth(&self) -> usize {
        self.marked_depth
    }

    /// The `/Resources` dictionary for the names used so far.
    pub fn resources(&self) -> PdfDict {
        self.resources.borrow().to_dict()
    }

    /// Link annotations created for placed images.
    pub fn annotations(&self) -> &[PdfDict] {
        &self.annotations
    }

    pub fn take_annotations(&mut self) -> Vec<PdfDict> {
        std::mem::take(&mut self.annotations)
    }

    /// An empty writer with the same resources and mode and a fresh
    /// graphics state.
    pub fn duplicate(&self) -> Self {
        Self {
            content: Vec::new(),
            state: GraphicState::default(),
            saved: Vec::new(),
            in_text: false,
            marked_depth: 0,
            tagged: self.tagged,
            resources: Rc::clone(&self.resources),
            annotation_factory: Arc::clone(&self.annotation_factory),
            annotations: Vec::new(),
        }
    }

    /// Takes over the graphics state and the `q` stack of `other`.
    pub fn inherit_graphic_state(&mut self, other: &ContentWriter) {
        self.state = other.state.clone();
        self.saved = other.saved.clone();
    }

    /// Appends the content of a writer sharing these resources.
    pub fn add_content(&mut self, other: &ContentWriter) -> Result<()> {
        if !Rc::ptr_eq(&self.resources, &other.resources) {
            return Err(PdfError::InvalidArgument(
                "content comes from a writer with different resources".into(),
            ));
        }
        self.content.extend_from_slice(&other.content);
        self.annotations.extend(other.annotations.iter().cloned());
        Ok(())
    }

    /// Clears the buffer and the state, checking balance first if
    /// `validate` is set.
    pub fn reset(&mut self, validate: bool) -> Result<()> {
        if validate {
            self.sanity_check()?;
        }
        self.content.clear();
        self.state = GraphicState::default();
        self.saved.clear();
        self.in_text = false;
        self.marked_depth = 0;
        Ok(())
    }

    /// Fails unless text objects, `q`/`Q` and marked content are all
    /// balanced. A tagged writer closes an open text object instead.
    pub fn sanity_check(&mut self) -> Result<()> {
        if self.marked_depth != 0 {
            return Err(PdfError::IllegalSyntax(
                "unbalanced marked content operators".into(),
            ));
        }
        if self.in_text {
            if self.tagged {
                self.end_text()?;
            } else {
                return Err(PdfError::IllegalSyntax(
                    "unbalanced begin/end text operators".into(),
                ));
            }
        }
        if !self.saved.is_empty() {
            return Err(PdfError::IllegalSyntax(
                "unbalanced save/restore state operators".into(),
            ));
        }
        Ok(())
    }

    /// The buffer as a content stream, Flate-compressed if asked.
    pub fn to_stream(&self, compress: bool) -> Result<PdfStream> {
        let mut dict = PdfDict::new();
        let data = if compress {
            dict.insert("Filter", PdfObject::name("FlateDecode"));
            flate_encode(&self.content)?
        } else {
            self.content.clone()
        };
        let mut stream = PdfStream::new(dict, Vec::new());
        stream.set_raw(data);
        Ok(stream)
    }

    /// The buffer as a form XObject with its resources inlined.
    pub fn to_form_xobject(&self, bbox: Rect, compress: bool) -> Result<PdfStream> {
        let mut stream = self.to_stream(compress)?;
        let (x0, y0, x1, y1) = bbox;
        stream.dict.insert("Type", PdfObject::name("XObject"));
        stream.dict.insert("Subtype", PdfObject::name("Form"));
        stream.dict.insert("BBox", PdfObject::numbers(&[x0, y0, x1, y1]));
        stream.dict.insert("Resources", self.resources());
        Ok(stream)
    }

    /// Appends raw operator text.
    pub fn set_literal(&mut self, literal: &str) {
        self.content.extend_from_slice(literal.as_bytes());
    }

    fn num(&mut self, v: f64) {
        self.content
            .extend_from_slice(format_content_number(v).as_bytes());
        self.content.push(b' ');
    }

    fn op(&mut self, operands: &[f64], operator: &str) {
        for &v in operands {
            self.num(v);
        }
        self.content.extend_from_slice(operator.as_bytes());
        self.content.push(b'\n');
    }

    fn name(&mut self, name: &str) {
        write_name(name, &mut self.content);
        self.content.push(b' ');
    }

    /// Path operators and XObjects may not appear inside `BT`/`ET`.
    fn leave_text(&mut self, operator: &str) -> Result<()> {
        if !self.in_text {
            return Ok(());
        }
        if self.tagged {
            debug!(operator, "closing text object in tagged content");
            return self.end_text();
        }
        Err(PdfError::IllegalSyntax(format!(
            "path operator {operator} inside a text object"
        )))
    }

    fn enter_text(&mut self) -> Result<()> {
        if !self.in_text && self.tagged {
            self.begin_text()?;
        }
        Ok(())
    }

    // graphics state

    pub fn save_state(&mut self) -> Result<()> {
        if self.in_text && self.tagged {
            self.end_text()?;
        }
        self.saved.push(self.state.clone());
        self.op(&[], "q");
        Ok(())
    }

    pub fn restore_state(&mut self) -> Result<()> {
        if self.in_text && self.tagged {
            self.end_text()?;
        }
        let Some(state) = self.saved.pop() else {
            return Err(PdfError::IllegalSyntax(
                "unbalanced save/restore state operators".into(),
            ));
        };
        self.state = state;
        self.op(&[], "Q");
        Ok(())
    }

    pub fn concat_ctm(&mut self, m: Matrix) {
        let (a, b, c, d, e, f) = m;
        self.state.ctm = mult_matrix(m, self.state.ctm);
        self.op(&[a, b, c, d, e, f], "cm");
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width;
        self.op(&[width], "w");
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
        self.op(&[cap as i32 as f64], "J");
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
        self.op(&[join as i32 as f64], "j");
    }

    pub fn set_miter_limit(&mut self, limit: f64) {
        self.state.miter_limit = limit;
        self.op(&[limit], "M");
    }

    pub fn set_line_dash(&mut self, dashes: &[f64], phase: f64) {
        self.content.push(b'[');
        for (i, &d) in dashes.iter().enumerate() {
            if i > 0 {
                self.content.push(b' ');
            }
            self.content
                .extend_from_slice(format_content_number(d).as_bytes());
        }
        self.content.extend_from_slice(b"] ");
        self.op(&[phase], "d");
        self.state.dash = (dashes.to_vec(), phase);
    }

    pub fn set_flatness(&mut self, flatness: f64) {
        if (0.0..=100.0).contains(&flatness) {
            self.op(&[flatness], "i");
        }
    }

    pub fn set_rendering_intent(&mut self, intent: &str) {
        self.name(intent);
        self.op(&[], "ri");
    }

    /// Selects an ExtGState dictionary (`gs`).
    pub fn set_gstate(&mut self, ext_gstate: ObjRef) {
        let name = self.resources.borrow_mut().add(ResourceKind::ExtGState, ext_gstate);
        self.name(&name);
        self.op(&[], "gs");
        self.state.ext_gstate = Some(name);
    }

    // colour

    pub fn set_fill_color(&mut self, color: Color) {
        self.write_color(&color, false);
        self.state.fill = color;
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.write_color(&color, true);
        self.state.stroke = color;
    }

    fn write_color(&mut self, color: &Color, stroke: bool) {
        let pick = |fill: &'static str, stroke_op: &'static str| if stroke { stroke_op } else { fill };
        match *color {
            Color::Gray(g) => self.op(&[g], pick("g", "G")),
            Color::Rgb(r, g, b) => self.op(&[r, g, b], pick("rg", "RG")),
            Color::Cmyk(c, m, y, k) => self.op(&[c, m, y, k], pick("k", "K")),
            Color::Spot { colorspace, tint } => {
                let name = self
                    .resources
                    .borrow_mut()
                    .add(ResourceKind::ColorSpace, colorspace);
                self.name(&name);
                self.content.extend_from_slice(pick("cs ", "CS ").as_bytes());
                self.op(&[tint], pick("scn", "SCN"));
            }
            Color::Pattern(pattern) => {
                let name = self.resources.borrow_mut().add(ResourceKind::Pattern, pattern);
                self.name("Pattern");
                self.content.extend_from_slice(pick("cs ", "CS ").as_bytes());
                self.name(&name);
                self.op(&[], pick("scn", "SCN"));
            }
        }
    }

    // path construction and painting

    pub fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.leave_text("m")?;
        self.op(&[x, y], "m");
        Ok(())
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.leave_text("l")?;
        self.op(&[x, y], "l");
        Ok(())
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> Result<()> {
        self.leave_text("c")?;
        self.op(&[x1, y1, x2, y2, x3, y3], "c");
        Ok(())
    }

    /// Bezier curve whose first control point is the current point (`v`).
    pub fn curve_from_current(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) -> Result<()> {
        self.leave_text("v")?;
        self.op(&[x2, y2, x3, y3], "v");
        Ok(())
    }

    /// Bezier curve whose second control point is the end point (`y`).
    pub fn curve_to_end(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) -> Result<()> {
        self.leave_text("y")?;
        self.op(&[x1, y1, x3, y3], "y");
        Ok(())
    }

    pub fn rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.leave_text("re")?;
        self.op(&[x, y, w, h], "re");
        Ok(())
    }

    /// Four Bezier arcs approximating a circle.
    pub fn circle(&mut self, x: f64, y: f64, r: f64) -> Result<()> {
        let k = r * KAPPA;
        self.move_to(x + r, y)?;
        self.curve_to(x + r, y + k, x + k, y + r, x, y + r)?;
        self.curve_to(x - k, y + r, x - r, y + k, x - r, y)?;
        self.curve_to(x - r, y - k, x - k, y - r, x, y - r)?;
        self.curve_to(x + k, y - r, x + r, y - k, x + r, y)
    }

    fn paint(&mut self, operator: &str) -> Result<()> {
        self.leave_text(operator)?;
        self.op(&[], operator);
        Ok(())
    }

    pub fn close_path(&mut self) -> Result<()> {
        self.paint("h")
    }

    pub fn new_path(&mut self) -> Result<()> {
        self.paint("n")
    }

    pub fn stroke(&mut self) -> Result<()> {
        self.paint("S")
    }

    pub fn close_path_stroke(&mut self) -> Result<()> {
        self.paint("s")
    }

    pub fn fill(&mut self) -> Result<()> {
        self.paint("f")
    }

    pub fn eo_fill(&mut self) -> Result<()> {
        self.paint("f*")
    }

    pub fn fill_stroke(&mut self) -> Result<()> {
        self.paint("B")
    }

    pub fn eo_fill_stroke(&mut self) -> Result<()> {
        self.paint("B*")
    }

    pub fn close_path_fill_stroke(&mut self) -> Result<()> {
        self.paint("b")
    }

    pub fn close_path_eo_fill_stroke(&mut self) -> Result<()> {
        self.paint("b*")
    }

    pub fn clip(&mut self) -> Result<()> {
        self.paint("W")
    }

    pub fn eo_clip(&mut self) -> Result<()> {
        self.paint("W*")
    }

    /// Paints a shading over the current clip (`sh`).
    pub fn paint_shading(&mut self, shading: ObjRef) -> Result<()> {
        self.leave_text("sh")?;
        let name = self.resources.borrow_mut().add(ResourceKind::Shading, shading);
        self.name(&name);
        self.op(&[], "sh");
        Ok(())
    }

    // text objects

    pub fn begin_text(&mut self) -> Result<()> {
        if self.in_text {
            if self.tagged {
                return Ok(());
            }
            return Err(PdfError::IllegalSyntax(
                "unbalanced begin/end text operators".into(),
            ));
        }
        self.in_text = true;
        self.state.set_text_matrix(crate::utils::MATRIX_IDENTITY);
        self.op(&[], "BT");
        Ok(())
    }

    pub fn end_text(&mut self) -> Result<()> {
        if !self.in_text {
            if self.tagged {
                return Ok(());
            }
            return Err(PdfError::IllegalSyntax(
                "unbalanced begin/end text operators".into(),
            ));
        }
        self.in_text = false;
        self.op(&[], "ET");
        Ok(())
    }

    // text state

    pub fn set_font_and_size(&mut self, font: Arc<dyn FontMetrics>, size: f64) -> Result<()> {
        if size.abs() < 0.0001 {
            return Err(PdfError::InvalidArgument(format!("font size {size} too small")));
        }
        self.enter_text()?;
        let name = self
            .resources
            .borrow_mut()
            .add(ResourceKind::Font, font.font_ref());
        self.name(&name);
        self.op(&[size], "Tf");
        self.state.font = Some(font);
        self.state.font_name = Some(name);
        self.state.size = size;
        Ok(())
    }

    pub fn set_character_spacing(&mut self, spacing: f64) {
        self.state.char_spacing = spacing;
        self.op(&[spacing], "Tc");
    }

    pub fn set_word_spacing(&mut self, spacing: f64) {
        self.state.word_spacing = spacing;
        self.op(&[spacing], "Tw");
    }

    /// Horizontal scaling in percent (`Tz`).
    pub fn set_horizontal_scaling(&mut self, scale: f64) {
        self.state.scale = scale;
        self.op(&[scale], "Tz");
    }

    pub fn set_leading(&mut self, leading: f64) {
        self.state.leading = leading;
        self.op(&[leading], "TL");
    }

    pub fn set_text_rise(&mut self, rise: f64) {
        self.state.rise = rise;
        self.op(&[rise], "Ts");
    }

    pub fn set_text_render_mode(&mut self, mode: i64) {
        self.state.render_mode = mode;
        self.op(&[mode as f64], "Tr");
    }

    // text positioning

    pub fn move_text(&mut self, x: f64, y: f64) -> Result<()> {
        self.enter_text()?;
        self.state.move_text(x, y);
        self.op(&[x, y], "Td");
        Ok(())
    }

    /// `TD`: moves like `Td` and sets the leading to `-y`.
    pub fn move_text_with_leading(&mut self, x: f64, y: f64) -> Result<()> {
        self.enter_text()?;
        self.state.leading = -y;
        self.state.move_text(x, y);
        self.op(&[x, y], "TD");
        Ok(())
    }

    pub fn set_text_matrix(&mut self, m: Matrix) -> Result<()> {
        self.enter_text()?;
        let (a, b, c, d, e, f) = m;
        self.state.set_text_matrix(m);
        self.op(&[a, b, c, d, e, f], "Tm");
        Ok(())
    }

    /// `T*`
    pub fn new_line(&mut self) -> Result<()> {
        self.enter_text()?;
        let leading = self.state.leading;
        self.state.move_text(0.0, -leading);
        self.op(&[], "T*");
        Ok(())
    }

    // text showing

    fn current_font(&self) -> Result<Arc<dyn FontMetrics>> {
        self.state.font.clone().ok_or_else(|| {
            PdfError::IllegalSyntax("font and size must be set before writing any text".into())
        })
    }

    fn text_string(&mut self, font: &dyn FontMetrics, text: &str) {
        write_string(&PdfString::new(font.encode(text)), &mut self.content);
    }

    pub fn show_text(&mut self, text: &str) -> Result<()> {
        let font = self.current_font()?;
        self.enter_text()?;
        self.text_string(font.as_ref(), text);
        self.op(&[], " Tj");
        self.state.tx += self.state.effective_width(text, false);
        Ok(())
    }

    /// `'`: next line, then show.
    pub fn new_line_show_text(&mut self, text: &str) -> Result<()> {
        let font = self.current_font()?;
        self.enter_text()?;
        let leading = self.state.leading;
        self.state.move_text(0.0, -leading);
        self.text_string(font.as_ref(), text);
        self.op(&[], " '");
        self.state.tx += self.state.effective_width(text, false);
        Ok(())
    }

    /// `"`: sets word and character spacing, next line, then show.
    pub fn new_line_show_text_spacing(
        &mut self,
        word_spacing: f64,
        char_spacing: f64,
        text: &str,
    ) -> Result<()> {
        let font = self.current_font()?;
        self.enter_text()?;
        self.state.word_spacing = word_spacing;
        self.state.char_spacing = char_spacing;
        let leading = self.state.leading;
        self.state.move_text(0.0, -leading);
        self.num(word_spacing);
        self.num(char_spacing);
        self.text_string(font.as_ref(), text);
        self.op(&[], " \"");
        self.state.tx += self.state.effective_width(text, false);
        Ok(())
    }

    /// `TJ` with explicit adjustments.
    pub fn show_text_array(&mut self, items: &[TextArrayItem]) -> Result<()> {
        let font = self.current_font()?;
        self.enter_text()?;
        self.content.push(b'[');
        let mut advance = 0.0;
        for (i, item) in items.iter().enumerate() {
            match item {
                TextArrayItem::Text(text) => {
                    self.text_string(font.as_ref(), text);
                    advance += self.state.effective_width(text, false);
                }
                TextArrayItem::Adjust(n) => {
                    if i > 0 {
                        self.content.push(b' ');
                    }
                    self.content
                        .extend_from_slice(format_content_number(*n).as_bytes());
                    if i + 1 < items.len() {
                        self.content.push(b' ');
                    }
                    advance += self.state.adjustment_width(*n);
                }
            }
        }
        self.op(&[], "]TJ");
        self.state.tx += advance;
        Ok(())
    }

    /// Shows `text` with the font's pair kerning as a `TJ` array.
    pub fn show_text_kerned(&mut self, text: &str) -> Result<()> {
        let font = self.current_font()?;
        let items = kern_array(font.as_ref(), text);
        self.show_text_array(&items)
    }

    /// Positions and shows one line of text aligned on (x, y), rotated by
    /// `rotation` degrees. The text matrix is reset afterwards.
    pub fn show_text_aligned(
        &mut self,
        align: TextAlign,
        text: &str,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> Result<()> {
        self.current_font()?;
        let width = self.state.effective_width(text, false);
        let shift = match align {
            TextAlign::Left => 0.0,
            TextAlign::Center => width / 2.0,
            TextAlign::Right => width,
        };
        if rotation == 0.0 {
            self.set_text_matrix((1.0, 0.0, 0.0, 1.0, x - shift, y))?;
        } else {
            let (sin, cos) = rotation.to_radians().sin_cos();
            self.set_text_matrix((cos, sin, -sin, cos, x - shift * cos, y - shift * sin))?;
        }
        self.show_text(text)?;
        self.set_text_matrix(crate::utils::MATRIX_IDENTITY)
    }

    // marked content

    pub fn begin_marked_content(
        &mut self,
        tag: &str,
        properties: Option<MarkedProperties>,
    ) -> Result<()> {
        self.name(tag);
        match properties {
            None => self.op(&[], "BMC"),
            Some(MarkedProperties::Inline(dict)) => {
                write_object(&PdfObject::Dictionary(dict), &mut self.content);
                self.op(&[], " BDC");
            }
            Some(MarkedProperties::Indirect(props)) => {
                let name = self.resources.borrow_mut().add(ResourceKind::Properties, props);
                self.name(&name);
                self.op(&[], "BDC");
            }
        }
        self.marked_depth += 1;
        Ok(())
    }

    /// `BDC` with a marked-content identifier for the structure tree.
    pub fn begin_marked_content_mcid(&mut self, tag: &str, mcid: u32) -> Result<()> {
        let mut dict = PdfDict::new();
        dict.insert("MCID", mcid);
        self.begin_marked_content(tag, Some(MarkedProperties::Inline(dict)))
    }

    pub fn end_marked_content(&mut self) -> Result<()> {
        if self.marked_depth == 0 {
            return Err(PdfError::IllegalSyntax(
                "unbalanced marked content operators".into(),
            ));
        }
        self.marked_depth -= 1;
        self.op(&[], "EMC");
        Ok(())
    }

    // external objects

    /// Paints a form or image XObject mapped by `matrix` (`Do`).
    pub fn add_xobject(&mut self, kind: ResourceKind, xobject: ObjRef, matrix: Matrix) -> Result<()> {
        if !matches!(kind, ResourceKind::Form | ResourceKind::Image) {
            return Err(PdfError::InvalidArgument(format!(
                "{kind:?} resources cannot be painted with Do"
            )));
        }
        self.leave_text("Do")?;
        let name = self.resources.borrow_mut().add(kind, xobject);
        self.save_state()?;
        self.concat_ctm(matrix);
        self.name(&name);
        self.op(&[], "Do");
        self.restore_state()
    }

    /// Adds `image` as an XObject created in `sink` and paints it over
    /// the unit square mapped by `matrix`.
    pub fn add_image(
        &mut self,
        image: &Image,
        matrix: Matrix,
        codec: &dyn ImageCodec,
        sink: &mut dyn ObjectSink,
    ) -> Result<ObjRef> {
        let encoded = codec.encode(image)?;
        let xobject = sink.add_object(PdfObject::Stream(Box::new(image_xobject(image, encoded))));
        self.link_image(image, matrix);
        self.add_xobject(ResourceKind::Image, xobject, matrix)?;
        Ok(xobject)
    }

    /// Writes `image` in-line with `BI`/`ID`/`EI`.
    pub fn add_inline_image(
        &mut self,
        image: &Image,
        matrix: Matrix,
        codec: &dyn ImageCodec,
    ) -> Result<()> {
        self.leave_text("BI")?;
        let encoded = codec.encode(image)?;
        let header = inline_header(image, &encoded);
        self.link_image(image, matrix);
        self.save_state()?;
        self.concat_ctm(matrix);
        self.op(&[], "BI");
        for (key, value) in &header {
            write_name(key, &mut self.content);
            self.content.push(b' ');
            write_object(value, &mut self.content);
            self.content.push(b'\n');
        }
        self.op(&[], "ID");
        self.content.extend_from_slice(&encoded.data);
        self.content.push(b'\n');
        self.op(&[], "EI");
        self.restore_state()
    }

    fn link_image(&mut self, image: &Image, matrix: Matrix) {
        if let Some(uri) = &image.link {
            let rect = apply_matrix_rect(mult_matrix(matrix, self.state.ctm), (0.0, 0.0, 1.0, 1.0));
            let annotation = self.annotation_factory.link(rect, uri);
            self.annotations.push(annotation);
        }
    }
}

/// Splits `text` where the font kerns, with the negated kerning between
/// the pieces.
fn kern_array(font: &dyn FontMetrics, text: &str) -> Vec<TextArrayItem> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if let Some(&next) = chars.peek() {
            let kern = font.kerning(c, next);
            if kern != 0.0 {
                items.push(TextArrayItem::Text(std::mem::take(&mut current)));
                items.push(TextArrayItem::Adjust(-kern));
            }
        }
    }
    if !current.is_empty() {
        items.push(TextArrayItem::Text(current));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::image::{FlateImageCodec, PassThroughCodec};
    use crate::content::state::test_fonts::Fixed;

    fn text(w: &ContentWriter) -> String {
        String::from_utf8_lossy(w.content()).into_owned()
    }

    fn font() -> Arc<dyn FontMetrics> {
        Arc::new(Fixed(ObjRef::new(7, 0)))
    }

    #[derive(Default)]
    struct Sink(Vec<PdfObject>);

    impl ObjectSink for Sink {
        fn add_object(&mut self, obj: PdfObject) -> ObjRef {
            self.0.push(obj);
            ObjRef::new(self.0.len() as u32 + 100, 0)
        }
    }

    #[test]
    fn path_and_colour() {
        let mut w = ContentWriter::new();
        w.save_state().unwrap();
        w.set_fill_color(Color::Rgb(1.0, 0.5, 0.0));
        w.set_stroke_color(Color::Cmyk(0.0, 0.0, 0.0, 1.0));
        w.set_line_width(2.5);
        w.set_line_dash(&[3.0, 1.0], 0.0);
        w.rectangle(10.0, 20.0, 100.0, 50.0).unwrap();
        w.fill_stroke().unwrap();
        w.restore_state().unwrap();
        w.sanity_check().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        q
        1 0.5 0 rg
        0 0 0 1 K
        2.5 w
        [3 1] 0 d
        10 20 100 50 re
        B
        Q
        ");
    }

    #[test]
    fn text_object() {
        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        w.set_font_and_size(font(), 12.0).unwrap();
        w.set_leading(14.0);
        w.move_text(72.0, 700.0).unwrap();
        w.show_text("Hi (there)").unwrap();
        w.new_line_show_text("next").unwrap();
        w.end_text().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        BT
        /F1 12 Tf
        14 TL
        72 700 Td
        (Hi \(there\)) Tj
        (next) '
        ET
        ");
        assert_eq!(w.state().font_name.as_deref(), Some("F1"));
        assert_eq!(w.state().tlm.5, 686.0);
        // 4 glyphs of 6 points after the line start
        assert_eq!(w.state().tx, 72.0 + 24.0);
    }

    #[test]
    fn show_text_advances_position() {
        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        w.set_font_and_size(font(), 10.0).unwrap();
        w.move_text(100.0, 0.0).unwrap();
        w.show_text("abc").unwrap();
        assert_eq!(w.state().tx, 115.0);
        w.set_horizontal_scaling(200.0);
        w.show_text("a").unwrap();
        assert_eq!(w.state().tx, 125.0);
    }

    #[test]
    fn kerned_text_builds_tj() {
        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        w.set_font_and_size(font(), 10.0).unwrap();
        w.show_text_kerned("WAVE").unwrap();
        w.end_text().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        BT
        /F1 10 Tf
        [(WA) 80 (VE)]TJ
        ET
        ");
        // 4 glyphs of 5 points, the pair pulled together by 0.8
        assert!((w.state().tx - 19.2).abs() < 1e-9);
    }

    #[test]
    fn fill_inside_text_is_illegal() {
        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        w.set_fill_color(Color::Rgb(1.0, 0.0, 0.0));
        let err = w.fill().unwrap_err();
        assert!(matches!(err, PdfError::IllegalSyntax(_)));
    }

    #[test]
    fn tagged_writer_closes_text_for_paths() {
        let mut w = ContentWriter::tagged();
        w.set_font_and_size(font(), 9.0).unwrap();
        w.show_text("a").unwrap();
        w.move_to(0.0, 0.0).unwrap();
        w.line_to(5.0, 5.0).unwrap();
        w.stroke().unwrap();
        w.show_text("b").unwrap();
        w.sanity_check().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        BT
        /F1 9 Tf
        (a) Tj
        ET
        0 0 m
        5 5 l
        S
        BT
        (b) Tj
        ET
        ");
    }

    #[test]
    fn unbalanced_restore_fails() {
        let mut w = ContentWriter::new();
        w.save_state().unwrap();
        w.restore_state().unwrap();
        assert!(matches!(
            w.restore_state(),
            Err(PdfError::IllegalSyntax(_))
        ));
    }

    #[test]
    fn restore_brings_back_every_field() {
        let mut w = ContentWriter::new();
        w.set_fill_color(Color::Gray(0.3));
        let before = w.state().clone();
        w.save_state().unwrap();
        w.set_fill_color(Color::Rgb(0.0, 1.0, 0.0));
        w.concat_ctm((2.0, 0.0, 0.0, 2.0, 5.0, 5.0));
        w.set_line_width(4.0);
        w.begin_text().unwrap();
        w.set_font_and_size(font(), 20.0).unwrap();
        w.set_character_spacing(1.5);
        w.end_text().unwrap();
        w.restore_state().unwrap();
        assert_eq!(w.state(), &before);
    }

    #[test]
    fn sanity_check_reports_imbalance() {
        let mut w = ContentWriter::new();
        w.save_state().unwrap();
        assert!(w.sanity_check().is_err());

        let mut w = ContentWriter::new();
        w.begin_marked_content("Span", None).unwrap();
        assert!(w.sanity_check().is_err());
        w.end_marked_content().unwrap();
        w.sanity_check().unwrap();
        assert!(w.end_marked_content().is_err());

        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        assert!(w.sanity_check().is_err());
    }

    #[test]
    fn marked_content_and_resources() {
        let mut w = ContentWriter::new();
        w.begin_marked_content_mcid("P", 3).unwrap();
        w.end_marked_content().unwrap();
        w.begin_marked_content("OC", Some(MarkedProperties::Indirect(ObjRef::new(12, 0))))
            .unwrap();
        w.set_gstate(ObjRef::new(13, 0));
        w.set_fill_color(Color::Spot {
            colorspace: ObjRef::new(14, 0),
            tint: 0.4,
        });
        w.set_stroke_color(Color::Pattern(ObjRef::new(15, 0)));
        w.end_marked_content().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        /P <</MCID 3>> BDC
        EMC
        /OC /Pr1 BDC
        /GS1 gs
        /CS1 cs 0.4 scn
        /Pattern CS /P1 SCN
        EMC
        ");
        let res = w.resources();
        assert_eq!(
            res.get_dict("Properties").unwrap().get_reference("Pr1"),
            Some(ObjRef::new(12, 0))
        );
        assert!(res.get_dict("ExtGState").unwrap().contains_key("GS1"));
        assert!(res.get_dict("ColorSpace").unwrap().contains_key("CS1"));
        assert!(res.get_dict("Pattern").unwrap().contains_key("P1"));
        assert_eq!(w.state().ext_gstate.as_deref(), Some("GS1"));
    }

    #[test]
    fn image_as_xobject_with_link() {
        let mut w = ContentWriter::new();
        let mut sink = Sink::default();
        let image = Image::new(2, 1, "DeviceGray", vec![0, 255]).with_link("https://example.com");
        let xobject = w
            .add_image(
                &image,
                (20.0, 0.0, 0.0, 10.0, 5.0, 5.0),
                &FlateImageCodec::default(),
                &mut sink,
            )
            .unwrap();
        assert_eq!(xobject, ObjRef::new(101, 0));
        insta::assert_snapshot!(text(&w), @r"
        q
        20 0 0 10 5 5 cm
        /Im1 Do
        Q
        ");
        let stream = sink.0[0].as_stream().unwrap();
        assert_eq!(stream.dict.get_name("Subtype"), Some("Image"));
        assert_eq!(stream.dict.get_i64("Width"), Some(2));
        let annots = w.take_annotations();
        assert_eq!(annots.len(), 1);
        assert_eq!(
            annots[0].get("Rect"),
            Some(&PdfObject::numbers(&[5.0, 5.0, 25.0, 15.0]))
        );
    }

    #[test]
    fn inline_image() {
        let mut w = ContentWriter::new();
        let image = Image::new(1, 1, "DeviceRGB", b"JPG".to_vec());
        w.add_inline_image(&image, (3.0, 0.0, 0.0, 3.0, 0.0, 0.0), &PassThroughCodec::dct())
            .unwrap();
        insta::assert_snapshot!(text(&w), @r"
        q
        3 0 0 3 0 0 cm
        BI
        /W 1
        /H 1
        /BPC 8
        /CS /RGB
        /F /DCT
        ID
        JPG
        EI
        Q
        ");
        assert_eq!(w.state_depth(), 0);
    }

    #[test]
    fn duplicate_shares_resources() {
        let mut page = ContentWriter::new();
        page.set_gstate(ObjRef::new(1, 0));
        let mut overlay = page.duplicate();
        overlay.set_gstate(ObjRef::new(2, 0));
        overlay.set_gstate(ObjRef::new(1, 0));
        page.add_content(&overlay).unwrap();
        insta::assert_snapshot!(text(&page), @r"
        /GS1 gs
        /GS2 gs
        /GS1 gs
        ");
        assert!(page.add_content(&ContentWriter::new()).is_err());
    }

    #[test]
    fn inherit_and_reset() {
        let mut a = ContentWriter::new();
        a.save_state().unwrap();
        a.set_line_width(3.0);
        let mut b = a.duplicate();
        b.inherit_graphic_state(&a);
        assert_eq!(b.state().line_width, 3.0);
        assert_eq!(b.state_depth(), 1);
        b.restore_state().unwrap();
        assert_eq!(b.state().line_width, 1.0);

        assert!(a.reset(true).is_err());
        a.reset(false).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.state_depth(), 0);
    }

    #[test]
    fn line_style_is_saved_and_inherited() {
        let mut a = ContentWriter::new();
        a.save_state().unwrap();
        a.set_line_cap(LineCap::Round);
        a.set_line_join(LineJoin::Bevel);
        a.set_miter_limit(4.0);
        a.set_line_dash(&[3.0, 1.0], 0.5);

        let mut b = a.duplicate();
        b.inherit_graphic_state(&a);
        assert_eq!(b.state().line_cap, LineCap::Round);
        assert_eq!(b.state().line_join, LineJoin::Bevel);
        assert_eq!(b.state().miter_limit, 4.0);
        assert_eq!(b.state().dash, (vec![3.0, 1.0], 0.5));

        a.restore_state().unwrap();
        assert_eq!(a.state(), &GraphicState::default());
        insta::assert_snapshot!(text(&a), @r"
        q
        1 J
        2 j
        4 M
        [3 1] 0.5 d
        Q
        ");
    }

    #[test]
    fn compressed_stream_inflates_to_content() {
        let mut w = ContentWriter::new();
        w.rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        w.fill().unwrap();
        let stream = w.to_stream(true).unwrap();
        assert_eq!(stream.dict.get_name("Filter"), Some("FlateDecode"));
        let data = crate::codec::flate_decode(stream.raw_bytes()).unwrap();
        assert_eq!(data, w.content());

        let form = w.to_form_xobject((0.0, 0.0, 10.0, 10.0), false).unwrap();
        assert_eq!(form.dict.get_name("Subtype"), Some("Form"));
        assert_eq!(&form.raw_bytes()[..], w.content());
    }

    #[test]
    fn aligned_text_is_positioned() {
        let mut w = ContentWriter::new();
        w.begin_text().unwrap();
        w.set_font_and_size(font(), 10.0).unwrap();
        w.show_text_aligned(TextAlign::Center, "abcd", 100.0, 50.0, 0.0)
            .unwrap();
        w.end_text().unwrap();
        insta::assert_snapshot!(text(&w), @r"
        BT
        /F1 10 Tf
        1 0 0 1 90 50 Tm
        (abcd) Tj
        1 0 0 1 0 0 Tm
        ET
        ");
    }

    #[test]
    fn font_size_must_be_usable() {
        let mut w = ContentWriter::new();
        assert!(matches!(
            w.set_font_and_size(font(), 0.0),
            Err(PdfError::InvalidArgument(_))
        ));
        w.begin_text().unwrap();
        assert!(matches!(w.show_text("x"), Err(PdfError::IllegalSyntax(_))));
    }
}
