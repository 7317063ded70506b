//! Document outline (bookmarks).

use rustc_hash::FxHashSet;

use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, PdfDict, PdfObject};

use super::reader::PdfReader;

/// One bookmark, flattened in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    pub title: String,
    /// 0 for top-level items.
    pub level: usize,
    pub dest: Option<PdfObject>,
    pub action: Option<PdfDict>,
    /// Children shown expanded (`/Count` positive).
    pub open: bool,
}

impl PdfReader {
    /// The outline tree as a flat list. An item reached twice, through
    /// `/First` or `/Next`, is a cycle.
    pub fn outlines(&mut self) -> Result<Vec<OutlineItem>> {
        let catalog = self.catalog()?;
        let Some(outlines) = catalog.get("Outlines") else {
            return Ok(Vec::new());
        };
        let root = self.resolve(outlines)?;
        let Some(first) = root.as_dict().ok().and_then(|d| d.get_reference("First")) else {
            return Ok(Vec::new());
        };

        let mut items = Vec::new();
        let mut visited = FxHashSet::default();
        let mut pending: Vec<(ObjRef, usize)> = vec![(first, 0)];
        while let Some((item_ref, level)) = pending.pop() {
            if !visited.insert(item_ref.num) {
                return Err(PdfError::CyclicStructure(format!(
                    "outline item {item_ref} reached twice"
                )));
            }
            let node = self.get_pdf_object(item_ref)?;
            let Ok(dict) = node.as_dict() else {
                continue;
            };
            // siblings come after the whole subtree
            if let Some(next) = dict.get_reference("Next") {
                pending.push((next, level));
            }
            if let Some(child) = dict.get_reference("First") {
                pending.push((child, level + 1));
            }

            let title = match dict.get("Title") {
                Some(title) => self
                    .resolve(title)?
                    .as_string()
                    .map(|s| s.to_text())
                    .unwrap_or_default(),
                None => String::new(),
            };
            let dest = match dict.get("Dest") {
                Some(dest) => Some((*self.resolve(dest)?).clone()),
                None => None,
            };
            let action = match dict.get("A") {
                Some(action) => self.resolve(action)?.as_dict().ok().cloned(),
                None => None,
            };
            items.push(OutlineItem {
                title,
                level,
                dest,
                action,
                open: dict.get_i64("Count").is_some_and(|c| c > 0),
            });
        }
        Ok(items)
    }
}
