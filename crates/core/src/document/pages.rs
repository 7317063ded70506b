//! Page tree: flattening with attribute inheritance, page access and
//! page selection.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, PdfDict, PdfObject};
use crate::utils::{LETTER, Rect, normalize_rect};

use super::reader::PdfReader;

/// Attributes a page takes from its nearest ancestor when it lacks them.
pub const INHERITABLE: [&str; 4] = ["MediaBox", "Resources", "Rotate", "CropBox"];

/// The flat, 1-indexed page list.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageTree {
    refs: Vec<ObjRef>,
    /// Attributes inherited from ancestors, per page.
    inherited: Vec<PdfDict>,
    /// Page read last in partial mode.
    last_page: Option<usize>,
}

/// An intermediate node being walked.
struct Frame {
    kids: Vec<PdfObject>,
    next: usize,
    inherited: PdfDict,
}

impl PageTree {
    pub(crate) fn len(&self) -> usize {
        self.refs.len()
    }

    /// Depth-first walk from the catalog's `/Pages`. Visiting any node a
    /// second time is a cycle.
    pub(crate) fn build(reader: &mut PdfReader) -> Result<Self> {
        let catalog = reader.catalog()?;
        let root = match catalog.get("Pages") {
            Some(PdfObject::Reference(r)) => *r,
            Some(_) => return Err(PdfError::corrupt("/Pages is not an indirect reference")),
            None => return Err(PdfError::corrupt("catalog has no /Pages")),
        };

        let mut tree = Self::default();
        let mut visited = FxHashSet::default();
        let mut stack = Vec::new();
        tree.visit(reader, root, &PdfDict::new(), &mut visited, &mut stack)?;
        while let Some(frame) = stack.last_mut() {
            let Some(kid) = frame.kids.get(frame.next).cloned() else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let inherited = frame.inherited.clone();
            match kid {
                PdfObject::Reference(r) => {
                    tree.visit(reader, r, &inherited, &mut visited, &mut stack)?
                }
                other => warn!(kid = other.type_name(), "page tree kid is not a reference"),
            }
        }
        debug!(pages = tree.len(), "page tree flattened");
        Ok(tree)
    }

    fn visit(
        &mut self,
        reader: &mut PdfReader,
        node_ref: ObjRef,
        inherited: &PdfDict,
        visited: &mut FxHashSet<u32>,
        stack: &mut Vec<Frame>,
    ) -> Result<()> {
        if !visited.insert(node_ref.num) {
            return Err(PdfError::CyclicStructure(format!(
                "page tree node {node_ref} reached twice"
            )));
        }
        let node = reader.get_pdf_object(node_ref)?;
        let Ok(dict) = node.as_dict() else {
            warn!(node = %node_ref, "page tree node is not a dictionary");
            return Ok(());
        };

        let is_pages = dict.is_type("Pages") || (!dict.is_type("Page") && dict.contains_key("Kids"));
        if !is_pages {
            self.refs.push(node_ref);
            self.inherited.push(inherited.clone());
            reader.release_object(node_ref.num);
            return Ok(());
        }

        let mut merged = inherited.clone();
        for key in INHERITABLE {
            if let Some(value) = dict.get(key) {
                merged.insert(key, value.clone());
            }
        }
        let kids = match dict.get("Kids") {
            Some(kids @ PdfObject::Reference(_)) => reader
                .resolve(kids)?
                .as_array()
                .map(<[PdfObject]>::to_vec)
                .unwrap_or_default(),
            Some(PdfObject::Array(kids)) => kids.clone(),
            _ => Vec::new(),
        };
        stack.push(Frame {
            kids,
            next: 0,
            inherited: merged,
        });
        Ok(())
    }
}

/// Parses a page list such as `1-3,5,7-` against `total` pages.
///
/// `a-` runs to the last page, `-b` starts at the first, and `5-3` runs
/// backwards. Numbers past the end are clamped.
pub fn parse_page_ranges(ranges: &str, total: usize) -> Result<Vec<usize>> {
    let number = |text: &str| -> Result<usize> {
        text.trim()
            .parse::<usize>()
            .map_err(|_| PdfError::InvalidArgument(format!("bad page number {text:?} in {ranges:?}")))
    };
    let mut pages = Vec::new();
    for part in ranges.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (from, to) = match part.split_once('-') {
            Some((a, b)) => {
                let from = if a.trim().is_empty() { 1 } else { number(a)? };
                let to = if b.trim().is_empty() { total } else { number(b)? };
                (from, to)
            }
            None => {
                let n = number(part)?;
                (n, n)
            }
        };
        let (from, to) = (from.clamp(1, total.max(1)), to.clamp(1, total.max(1)));
        if from <= to {
            pages.extend(from..=to);
        } else {
            pages.extend((to..=from).rev());
        }
    }
    Ok(pages)
}

fn rect_of(obj: &PdfObject) -> Option<Rect> {
    let items = obj.as_array().ok()?;
    let values: Vec<f64> = items.iter().map(|o| o.as_f64()).collect::<Result<_>>().ok()?;
    match values[..] {
        [x0, y0, x1, y1] => Some(normalize_rect((x0, y0, x1, y1))),
        _ => None,
    }
}

impl PdfReader {
    pub fn number_of_pages(&self) -> usize {
        self.pages.len()
    }

    fn page_index(&self, n: usize) -> Result<usize> {
        if n == 0 || n > self.pages.len() {
            return Err(PdfError::PageOutOfRange(n));
        }
        Ok(n - 1)
    }

    /// Reference of page `n` (1-based).
    pub fn get_page_ref(&self, n: usize) -> Result<ObjRef> {
        Ok(self.pages.refs[self.page_index(n)?])
    }

    /// Page `n` (1-based) with inherited attributes filled in. A page
    /// without any `/MediaBox` gets US Letter.
    ///
    /// In partial mode the previously read page is released first.
    pub fn get_page_n(&mut self, n: usize) -> Result<PdfDict> {
        let idx = self.page_index(n)?;
        if self.is_partial()
            && let Some(last) = self.pages.last_page
            && last != idx
        {
            let last_num = self.pages.refs[last].num;
            self.release_object(last_num);
        }
        let page = self.get_pdf_object(self.pages.refs[idx])?;
        let mut dict = page.as_dict()?.clone();
        for (key, value) in &self.pages.inherited[idx] {
            if !dict.contains_key(key) {
                dict.insert(key.clone(), value.clone());
            }
        }
        if !dict.contains_key("MediaBox") {
            let (x0, y0, x1, y1) = LETTER;
            dict.insert("MediaBox", PdfObject::numbers(&[x0, y0, x1, y1]));
        }
        self.pages.last_page = Some(idx);
        Ok(dict)
    }

    /// Releases page `n` in partial mode.
    pub fn release_page(&mut self, n: usize) -> Result<()> {
        let idx = self.page_index(n)?;
        self.release_object(self.pages.refs[idx].num);
        if self.pages.last_page == Some(idx) {
            self.pages.last_page = None;
        }
        Ok(())
    }

    fn page_rect(&mut self, n: usize, key: &str) -> Result<Option<Rect>> {
        let page = self.get_page_n(n)?;
        match page.get(key) {
            Some(value) => Ok(rect_of(&*self.resolve(value)?)),
            None => Ok(None),
        }
    }

    /// The `/MediaBox` of page `n`.
    pub fn page_size(&mut self, n: usize) -> Result<Rect> {
        Ok(self.page_rect(n, "MediaBox")?.unwrap_or(LETTER))
    }

    /// The `/CropBox` of page `n`, or its media box.
    pub fn crop_box(&mut self, n: usize) -> Result<Rect> {
        match self.page_rect(n, "CropBox")? {
            Some(rect) => Ok(rect),
            None => self.page_size(n),
        }
    }

    /// `/Rotate` normalized to 0, 90, 180 or 270.
    pub fn page_rotation(&mut self, n: usize) -> Result<i64> {
        let page = self.get_page_n(n)?;
        let rotate = match page.get("Rotate") {
            Some(value) => self.resolve(value)?.as_i64().unwrap_or(0),
            None => 0,
        };
        Ok((rotate % 360 + 360) % 360 / 90 * 90)
    }

    /// The media box with width and height swapped for quarter turns.
    pub fn page_size_with_rotation(&mut self, n: usize) -> Result<Rect> {
        let (x0, y0, x1, y1) = self.page_size(n)?;
        Ok(match self.page_rotation(n)? {
            90 | 270 => (y0, x0, y1, x1),
            _ => (x0, y0, x1, y1),
        })
    }

    /// Decoded content of page `n`; multiple streams are joined by newlines.
    pub fn page_content(&mut self, n: usize) -> Result<Vec<u8>> {
        let page = self.get_page_n(n)?;
        let Some(contents) = page.get("Contents") else {
            return Ok(Vec::new());
        };
        let contents = self.resolve(contents)?;
        let parts: Vec<PdfObject> = match &*contents {
            PdfObject::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        let mut out = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let part = self.resolve(part)?;
            let PdfObject::Stream(stream) = &*part else {
                continue;
            };
            if i > 0 {
                out.push(b'\n');
            }
            out.extend(self.get_stream_bytes(stream)?);
        }
        Ok(out)
    }

    /// Keeps only the given pages, in the given order. Out-of-range and
    /// repeated numbers are ignored.
    ///
    /// The kept pages are hung directly under the root `/Pages` node with
    /// their inherited attributes written into them. Widget annotations of
    /// dropped pages are detached from the form, and everything no longer
    /// reachable is freed.
    pub fn select_pages(&mut self, keep: &[usize]) -> Result<()> {
        let total = self.number_of_pages();
        let mut seen = FxHashSet::default();
        let order: Vec<usize> = keep
            .iter()
            .copied()
            .filter(|&n| n >= 1 && n <= total && seen.insert(n))
            .collect();

        let root_ref = match self.catalog()?.get("Pages") {
            Some(PdfObject::Reference(r)) => *r,
            _ => return Err(PdfError::corrupt("catalog has no /Pages reference")),
        };

        let mut refs = Vec::with_capacity(order.len());
        for &n in &order {
            let page_ref = self.get_page_ref(n)?;
            let mut page = self.get_page_n(n)?;
            page.insert("Parent", root_ref);
            self.set_pdf_object(page_ref, PdfObject::Dictionary(page));
            refs.push(page_ref);
        }

        let dropped: Vec<ObjRef> = (1..=total)
            .filter(|n| !seen.contains(n))
            .map(|n| self.pages.refs[n - 1])
            .collect();
        self.detach_widgets(&dropped)?;
        for page_ref in &dropped {
            self.free_object(page_ref.num);
        }

        let root = self.get_pdf_object_mut(root_ref)?.as_dict_mut()?;
        root.insert(
            "Kids",
            PdfObject::Array(refs.iter().map(|&r| PdfObject::Reference(r)).collect()),
        );
        root.insert("Count", refs.len());
        root.remove("Parent");

        self.pages.inherited = vec![PdfDict::new(); refs.len()];
        self.pages.refs = refs;
        self.pages.last_page = None;
        let removed = self.remove_unused_objects()?;
        debug!(kept = order.len(), dropped = dropped.len(), removed, "pages selected");
        Ok(())
    }

    /// [`select_pages`](Self::select_pages) with a range list like `1-3,5,7-`.
    pub fn select_pages_ranges(&mut self, ranges: &str) -> Result<()> {
        let pages = parse_page_ranges(ranges, self.number_of_pages())?;
        self.select_pages(&pages)
    }

    /// Removes the widget annotations on `pages` from their parent fields
    /// and from `/AcroForm /Fields`, then frees them.
    fn detach_widgets(&mut self, pages: &[ObjRef]) -> Result<()> {
        let mut doomed = FxHashSet::default();
        let mut parents = Vec::new();
        for &page_ref in pages {
            let page = self.get_pdf_object(page_ref)?;
            let Some(annots) = page.as_dict().ok().and_then(|d| d.get("Annots")) else {
                continue;
            };
            let annots = self.resolve(annots)?;
            let Ok(items) = annots.as_array() else {
                continue;
            };
            for item in items {
                let PdfObject::Reference(annot_ref) = item else {
                    continue;
                };
                let annot = self.get_pdf_object(*annot_ref)?;
                let Ok(annot) = annot.as_dict() else {
                    continue;
                };
                if annot.get_name("Subtype") == Some("Widget")
                    && doomed.insert(annot_ref.num)
                    && let Some(parent) = annot.get_reference("Parent")
                {
                    parents.push(parent);
                }
            }
        }
        if doomed.is_empty() {
            return Ok(());
        }

        // a field left without widgets goes too
        for parent in parents {
            if self.prune_references(parent, &["Kids"], &doomed)? == Some(0) {
                doomed.insert(parent.num);
            }
        }
        let root = self
            .trailer()
            .get_reference("Root")
            .ok_or_else(|| PdfError::corrupt("/Root is not a reference"))?;
        self.prune_references(root, &["AcroForm", "Fields"], &doomed)?;
        for &num in &doomed {
            self.free_object(num);
        }
        debug!(widgets = doomed.len(), "form widgets detached");
        Ok(())
    }

    /// Drops references to `doomed` from the array found by following
    /// `path` from `holder`, through direct or indirect dictionaries.
    /// Returns the remaining length, or `None` if there is no such array.
    fn prune_references(
        &mut self,
        holder: ObjRef,
        path: &[&str],
        doomed: &FxHashSet<u32>,
    ) -> Result<Option<usize>> {
        let mut owner = holder;
        let mut inner: Vec<&str> = Vec::new();
        let mut cursor = self.get_pdf_object(holder)?;
        for &key in path {
            let next = match cursor.as_dict().ok().and_then(|d| d.get(key)) {
                Some(value) => value.clone(),
                None => return Ok(None),
            };
            match next {
                PdfObject::Reference(r) => {
                    owner = r;
                    inner.clear();
                    cursor = self.get_pdf_object(r)?;
                }
                direct => {
                    inner.push(key);
                    cursor = std::sync::Arc::new(direct);
                }
            }
        }
        if !matches!(&*cursor, PdfObject::Array(_)) {
            return Ok(None);
        }

        let mut target = self.get_pdf_object_mut(owner)?;
        for key in &inner {
            target = target
                .as_dict_mut()?
                .get_mut(key)
                .ok_or_else(|| PdfError::corrupt(format!("/{key} vanished while editing")))?;
        }
        let array = target.as_array_mut()?;
        array.retain(|item| !matches!(item, PdfObject::Reference(r) if doomed.contains(&r.num)));
        Ok(Some(array.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(parse_page_ranges("1-3,5,7-", 8).unwrap(), vec![1, 2, 3, 5, 7, 8]);
        assert_eq!(parse_page_ranges("-2, 4-3", 5).unwrap(), vec![1, 2, 4, 3]);
        assert_eq!(parse_page_ranges("9", 3).unwrap(), vec![3]);
        assert!(parse_page_ranges("1,x", 3).is_err());
    }

    #[test]
    fn rectangles_are_normalized() {
        let obj = PdfObject::numbers(&[612.0, 792.0, 0.0, 0.0]);
        assert_eq!(rect_of(&obj), Some((0.0, 0.0, 612.0, 792.0)));
        assert_eq!(rect_of(&PdfObject::numbers(&[1.0, 2.0])), None);
    }
}
