//! Filter chain application for stream payloads.

use super::ascii85::{ascii85decode, asciihexdecode};
use super::flate::flate_decode;
use super::lzw::lzwdecode_with_earlychange;
use super::predictor::{PredictorParams, decode_predictor};
use super::runlength::rldecode;
use crate::error::{PdfError, Result};
use crate::model::objects::{PdfDict, PdfObject};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Decoder for a filter the built-in chain does not handle, typically an
/// image codec.
pub trait FilterHandler: Send + Sync {
    fn decode(&self, data: &[u8], params: Option<&PdfDict>) -> Result<Vec<u8>>;
}

impl<F> FilterHandler for F
where
    F: Fn(&[u8], Option<&PdfDict>) -> Result<Vec<u8>> + Send + Sync,
{
    fn decode(&self, data: &[u8], params: Option<&PdfDict>) -> Result<Vec<u8>> {
        self(data, params)
    }
}

/// Named filter handlers consulted before the built-in filters.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    handlers: FxHashMap<String, Arc<dyn FilterHandler>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under the full filter name (abbreviations are
    /// normalized before lookup).
    pub fn register(&mut self, name: &str, handler: Arc<dyn FilterHandler>) {
        self.handlers
            .insert(normalize_filter_name(name).to_string(), handler);
    }

    pub fn with(mut self, name: &str, handler: Arc<dyn FilterHandler>) -> Self {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FilterHandler>> {
        self.handlers.get(normalize_filter_name(name))
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("handlers", &names).finish()
    }
}

/// Expands inline-image abbreviations to full filter names.
pub fn normalize_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Image codecs whose output is left encoded unless a handler is registered.
pub fn is_image_codec(name: &str) -> bool {
    matches!(
        normalize_filter_name(name),
        "DCTDecode" | "JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode"
    )
}

/// Filter names and their `/DecodeParms` from a stream dictionary whose
/// entries are direct. A single parameter dictionary belongs to the first
/// filter only.
pub fn filter_chain(dict: &PdfDict) -> (Vec<String>, Vec<Option<PdfDict>>) {
    let names: Vec<String> = match dict.get("Filter") {
        Some(PdfObject::Name(n)) => vec![n.clone()],
        Some(PdfObject::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let parms_obj = dict.get("DecodeParms").or_else(|| dict.get("DP"));
    let params = match parms_obj {
        Some(PdfObject::Dictionary(d)) => vec![Some(d.clone())],
        Some(PdfObject::Array(items)) => items
            .iter()
            .map(|o| o.as_dict().ok().cloned())
            .collect(),
        _ => Vec::new(),
    };
    (names, params)
}

/// Applies `filters` left to right. `params[i]` holds the `/DecodeParms`
/// entry for `filters[i]`; missing entries mean defaults.
///
/// An image codec without a registered handler ends the chain and returns
/// the payload as encoded at that point.
pub fn decode_stream_data(
    raw: &[u8],
    filters: &[String],
    params: &[Option<PdfDict>],
    registry: &FilterRegistry,
) -> Result<Vec<u8>> {
    let mut data = raw.to_vec();
    for (idx, name) in filters.iter().enumerate() {
        let parms = params.get(idx).and_then(Option::as_ref);
        let full = normalize_filter_name(name);
        trace!(filter = full, len = data.len(), "applying filter");

        if let Some(handler) = registry.get(full) {
            data = handler.decode(&data, parms)?;
            continue;
        }
        data = match full {
            "FlateDecode" => with_predictor(flate_decode(&data)?, parms)?,
            "LZWDecode" => {
                let early = parms.and_then(|p| p.get_i64("EarlyChange")).unwrap_or(1);
                with_predictor(lzwdecode_with_earlychange(&data, early)?, parms)?
            }
            "ASCII85Decode" => ascii85decode(&data)?,
            "ASCIIHexDecode" => asciihexdecode(&data)?,
            "RunLengthDecode" => rldecode(&data)?,
            "Crypt" => match parms.and_then(|p| p.get_name("Name")) {
                None | Some("Identity") => data,
                Some(other) => {
                    return Err(PdfError::UnsupportedFilter(format!("Crypt/{other}")));
                }
            },
            codec if is_image_codec(codec) => break,
            other => return Err(PdfError::UnsupportedFilter(other.to_string())),
        };
    }
    Ok(data)
}

fn with_predictor(data: Vec<u8>, parms: Option<&PdfDict>) -> Result<Vec<u8>> {
    match parms {
        Some(p) => {
            let params = PredictorParams::from_dict(p);
            if params.predictor == 2 || params.predictor >= 10 {
                decode_predictor(&data, &params)
            } else {
                Ok(data)
            }
        }
        None => Ok(data),
    }
}
