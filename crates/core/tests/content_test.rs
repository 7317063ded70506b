//! Content streams built with the writer and read back through a document.

use std::sync::Arc;

use lectern_core::content::{Color, ContentWriter, FlateImageCodec, FontMetrics, Image, TextAlign};
use lectern_core::document::{PdfFileWriter, PdfReader, ReaderOptions, WriterOptions};
use lectern_core::error::PdfError;
use lectern_core::model::{ObjRef, PdfDict, PdfObject};

struct Mono(ObjRef);

impl FontMetrics for Mono {
    fn font_ref(&self) -> ObjRef {
        self.0
    }

    fn char_width(&self, _c: char) -> f64 {
        600.0
    }
}

fn mono() -> Arc<dyn FontMetrics> {
    Arc::new(Mono(ObjRef::new(1, 0)))
}

#[test]
fn fill_inside_text_object() {
    let mut plain = ContentWriter::new();
    plain.begin_text().unwrap();
    plain.set_font_and_size(mono(), 12.0).unwrap();
    plain.show_text("x").unwrap();
    let before = plain.len();
    for result in [plain.rectangle(0.0, 0.0, 1.0, 1.0), plain.fill()] {
        assert!(matches!(result, Err(PdfError::IllegalSyntax(_))));
    }
    assert_eq!(plain.len(), before);

    let mut tagged = ContentWriter::tagged();
    tagged.begin_text().unwrap();
    tagged.set_font_and_size(mono(), 12.0).unwrap();
    tagged.show_text("x").unwrap();
    tagged.rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
    tagged.fill().unwrap();
    assert!(!tagged.is_in_text());
    tagged.sanity_check().unwrap();
    assert_eq!(
        tagged.content(),
        b"BT\n/F1 12 Tf\n(x) Tj\nET\n0 0 1 1 re\nf\n"
    );
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Save,
    Restore,
    Begin,
    End,
    Mark,
    Unmark,
}

const OPS: [Op; 6] = [Op::Save, Op::Restore, Op::Begin, Op::End, Op::Mark, Op::Unmark];

#[derive(Default)]
struct Model {
    saved: usize,
    in_text: bool,
    marked: usize,
}

impl Model {
    /// Applies `op`; false when the writer must refuse it.
    fn apply(&mut self, op: Op, tagged: bool) -> bool {
        match op {
            Op::Save => {
                if tagged {
                    self.in_text = false;
                }
                self.saved += 1;
            }
            Op::Restore => {
                if tagged {
                    self.in_text = false;
                }
                if self.saved == 0 {
                    return false;
                }
                self.saved -= 1;
            }
            Op::Begin => {
                if self.in_text && !tagged {
                    return false;
                }
                self.in_text = true;
            }
            Op::End => {
                if !self.in_text && !tagged {
                    return false;
                }
                self.in_text = false;
            }
            Op::Mark => self.marked += 1,
            Op::Unmark => {
                if self.marked == 0 {
                    return false;
                }
                self.marked -= 1;
            }
        }
        true
    }

    fn balanced(&self, tagged: bool) -> bool {
        self.saved == 0 && self.marked == 0 && (tagged || !self.in_text)
    }
}

fn run(w: &mut ContentWriter, op: Op) -> bool {
    let result = match op {
        Op::Save => w.save_state(),
        Op::Restore => w.restore_state(),
        Op::Begin => w.begin_text(),
        Op::End => w.end_text(),
        Op::Mark => w.begin_marked_content("Span", None),
        Op::Unmark => w.end_marked_content(),
    };
    match result {
        Ok(()) => true,
        Err(PdfError::IllegalSyntax(_)) => false,
        Err(other) => panic!("unexpected error {other}"),
    }
}

/// Every operator sequence up to length five, run against a model of the
/// nesting rules.
#[test]
fn balance_follows_nesting_rules() {
    for tagged in [false, true] {
        for len in 0..=5u32 {
            for code in 0..6usize.pow(len) {
                let mut seq = Vec::new();
                let mut rest = code;
                for _ in 0..len {
                    seq.push(OPS[rest % 6]);
                    rest /= 6;
                }

                let mut w = if tagged {
                    ContentWriter::tagged()
                } else {
                    ContentWriter::new()
                };
                let mut model = Model::default();
                let mut refused = false;
                for &op in &seq {
                    let expected = model.apply(op, tagged);
                    assert_eq!(run(&mut w, op), expected, "{seq:?} tagged={tagged}");
                    if !expected {
                        refused = true;
                        break;
                    }
                }
                if refused {
                    continue;
                }
                assert_eq!(w.state_depth(), model.saved, "{seq:?}");
                assert_eq!(w.marked_depth(), model.marked, "{seq:?}");
                assert_eq!(
                    w.sanity_check().is_ok(),
                    model.balanced(tagged),
                    "{seq:?} tagged={tagged}"
                );
            }
        }
    }
}

/// One page with a fill, centred text and a linked image, written with a
/// classic table and with object streams.
#[test]
fn page_written_and_read_back() {
    for options in [WriterOptions::default(), WriterOptions::compact()] {
        let mut file = PdfFileWriter::new(options);
        let mut font = PdfDict::with_type("Font");
        font.insert("Subtype", PdfObject::name("Type1"));
        font.insert("BaseFont", PdfObject::name("Courier"));
        let font_ref = file.add_object(font.into());
        assert_eq!(font_ref, ObjRef::new(1, 0));

        let mut w = ContentWriter::new();
        w.save_state().unwrap();
        w.set_fill_color(Color::Gray(0.5));
        w.rectangle(50.0, 50.0, 200.0, 100.0).unwrap();
        w.fill().unwrap();
        w.restore_state().unwrap();
        w.begin_text().unwrap();
        w.set_font_and_size(mono(), 10.0).unwrap();
        w.show_text_aligned(TextAlign::Center, "centred", 150.0, 300.0, 0.0)
            .unwrap();
        w.end_text().unwrap();

        let image = Image::new(2, 2, "DeviceGray", vec![0, 255, 255, 0])
            .with_link("https://example.org");
        let image_ref = w
            .add_image(
                &image,
                (20.0, 0.0, 0.0, 10.0, 100.0, 200.0),
                &FlateImageCodec::default(),
                &mut file,
            )
            .unwrap();
        w.sanity_check().unwrap();

        let contents = file.add_object(w.to_stream(true).unwrap().into());
        let pages_ref = ObjRef::new(5, 0);
        let mut page = PdfDict::with_type("Page");
        page.insert("Parent", pages_ref);
        page.insert("MediaBox", PdfObject::numbers(&[0.0, 0.0, 300.0, 400.0]));
        page.insert("Resources", w.resources());
        page.insert("Contents", contents);
        let annots: Vec<PdfObject> = w
            .take_annotations()
            .into_iter()
            .map(PdfObject::from)
            .collect();
        page.insert("Annots", annots);
        let page_ref = file.add_object(page.into());

        let mut pages = PdfDict::with_type("Pages");
        pages.insert("Kids", vec![PdfObject::Reference(page_ref)]);
        pages.insert("Count", 1);
        assert_eq!(file.add_object(pages.into()), pages_ref);
        let mut catalog = PdfDict::with_type("Catalog");
        catalog.insert("Pages", pages_ref);
        let root = file.add_object(catalog.into());
        file.set_root(root);

        let bytes = file.write().unwrap();
        let mut reader = PdfReader::open(bytes, ReaderOptions::new()).unwrap();
        assert_eq!(reader.number_of_pages(), 1);
        assert_eq!(reader.page_size(1).unwrap(), (0.0, 0.0, 300.0, 400.0));
        assert_eq!(reader.page_content(1).unwrap(), w.content());

        let page = reader.get_page_n(1).unwrap();
        let resources = page.get_dict("Resources").unwrap();
        assert_eq!(
            resources.get_dict("Font").unwrap().get_reference("F1"),
            Some(font_ref)
        );
        assert_eq!(
            resources.get_dict("XObject").unwrap().get_reference("Im1"),
            Some(image_ref)
        );

        let link = page.get_array("Annots").unwrap()[0].as_dict().unwrap().clone();
        let rect: Vec<f64> = link
            .get_array("Rect")
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(rect, [100.0, 200.0, 120.0, 210.0]);

        let xobject = reader.get_pdf_object(image_ref).unwrap();
        let xobject = xobject.as_stream().unwrap();
        assert_eq!(xobject.dict.get_i64("Width"), Some(2));
        assert_eq!(reader.get_stream_bytes(xobject).unwrap(), [0, 255, 255, 0]);
        assert_eq!(reader.is_new_xref_type(), options.xref_stream);
    }
}
