//! Page resource naming for content written by [`ContentWriter`].
//!
//! [`ContentWriter`]: super::ContentWriter

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::objects::{ObjRef, PdfDict, PdfObject};

/// What a resource is, which decides its dictionary and name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Font,
    Image,
    Form,
    ExtGState,
    ColorSpace,
    Pattern,
    Shading,
    Properties,
}

impl ResourceKind {
    /// Key of the sub-dictionary in `/Resources`.
    pub fn key(self) -> &'static str {
        match self {
            ResourceKind::Font => "Font",
            ResourceKind::Image | ResourceKind::Form => "XObject",
            ResourceKind::ExtGState => "ExtGState",
            ResourceKind::ColorSpace => "ColorSpace",
            ResourceKind::Pattern => "Pattern",
            ResourceKind::Shading => "Shading",
            ResourceKind::Properties => "Properties",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Font => "F",
            ResourceKind::Image => "Im",
            ResourceKind::Form => "Xf",
            ResourceKind::ExtGState => "GS",
            ResourceKind::ColorSpace => "CS",
            ResourceKind::Pattern => "P",
            ResourceKind::Shading => "Sh",
            ResourceKind::Properties => "Pr",
        }
    }
}

/// Names handed out for indirect resources. The same object always gets
/// the same name, and names never collide with ones already present in
/// the page's own `/Resources`.
#[derive(Debug, Clone, Default)]
pub struct PageResources {
    names: IndexMap<(ResourceKind, ObjRef), String>,
    /// Entries copied from an existing dictionary, kept as-is.
    existing: IndexMap<&'static str, PdfDict>,
    used: FxHashSet<(&'static str, String)>,
    counters: FxHashMap<ResourceKind, usize>,
}

const SUB_DICTS: [&str; 7] = [
    "Font",
    "XObject",
    "ExtGState",
    "ColorSpace",
    "Pattern",
    "Shading",
    "Properties",
];

impl PageResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a page's current `/Resources`, reserving every name it
    /// already uses.
    pub fn from_dict(resources: &PdfDict) -> Self {
        let mut out = Self::default();
        for key in SUB_DICTS {
            if let Some(sub) = resources.get_dict(key) {
                for (name, _) in sub {
                    out.used.insert((key, name.clone()));
                }
                out.existing.insert(key, sub.clone());
            }
        }
        out
    }

    /// Name under which `obj` is registered, adding it if needed.
    pub fn add(&mut self, kind: ResourceKind, obj: ObjRef) -> String {
        if let Some(name) = self.names.get(&(kind, obj)) {
            return name.clone();
        }
        let counter = self.counters.entry(kind).or_default();
        let name = loop {
            *counter += 1;
            let candidate = format!("{}{}", kind.prefix(), counter);
            if !self.used.contains(&(kind.key(), candidate.clone())) {
                break candidate;
            }
        };
        self.used.insert((kind.key(), name.clone()));
        self.names.insert((kind, obj), name.clone());
        name
    }

    pub fn name_of(&self, kind: ResourceKind, obj: ObjRef) -> Option<&str> {
        self.names.get(&(kind, obj)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.existing.is_empty()
    }

    /// The `/Resources` dictionary for everything registered so far.
    pub fn to_dict(&self) -> PdfDict {
        let mut subs: IndexMap<&'static str, PdfDict> = self.existing.clone();
        for ((kind, obj), name) in &self.names {
            subs.entry(kind.key())
                .or_default()
                .insert(name.clone(), *obj);
        }
        let mut out = PdfDict::new();
        let procset = ["PDF", "Text", "ImageB", "ImageC", "ImageI"]
            .into_iter()
            .map(PdfObject::name)
            .collect::<Vec<_>>();
        out.insert("ProcSet", procset);
        for key in SUB_DICTS {
            if let Some(sub) = subs.shift_remove(key) {
                out.insert(key, sub);
            }
        }
        out
    }
}
