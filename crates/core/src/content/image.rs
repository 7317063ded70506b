//! Raster images placed by the content writer.

use crate::codec::{PredictorParams, encode_png, flate_encode};
use crate::error::{PdfError, Result};
use crate::model::objects::{PdfDict, PdfObject, PdfStream, PdfString};
use crate::utils::Rect;

/// Image samples, or codec-native bytes for pass-through codecs.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// Device colour space name: `DeviceGray`, `DeviceRGB` or `DeviceCMYK`.
    pub color_space: String,
    pub data: Vec<u8>,
    /// URI the placed image links to.
    pub link: Option<String>,
    pub interpolate: bool,
}

impl Image {
    pub fn new(width: u32, height: u32, color_space: &str, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bits_per_component: 8,
            color_space: color_space.to_string(),
            data,
            link: None,
            interpolate: false,
        }
    }

    pub fn with_link(mut self, uri: impl Into<String>) -> Self {
        self.link = Some(uri.into());
        self
    }

    pub fn components(&self) -> usize {
        match self.color_space.as_str() {
            "DeviceRGB" => 3,
            "DeviceCMYK" => 4,
            _ => 1,
        }
    }

    fn row_len(&self) -> usize {
        (self.width as usize * self.components() * self.bits_per_component as usize).div_ceil(8)
    }
}

/// Encoded payload and the filter that decodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub filter: Option<String>,
    pub decode_parms: Option<PdfDict>,
}

pub trait ImageCodec {
    fn encode(&self, image: &Image) -> Result<EncodedImage>;
}

/// Flate with an optional PNG Up predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateImageCodec {
    pub predictor: bool,
}

impl ImageCodec for FlateImageCodec {
    fn encode(&self, image: &Image) -> Result<EncodedImage> {
        let expected = image.row_len() * image.height as usize;
        if image.data.len() != expected {
            return Err(PdfError::InvalidArgument(format!(
                "image needs {expected} sample bytes, got {}",
                image.data.len()
            )));
        }
        if !self.predictor {
            return Ok(EncodedImage {
                data: flate_encode(&image.data)?,
                filter: Some("FlateDecode".into()),
                decode_parms: None,
            });
        }
        let params = PredictorParams {
            predictor: 12,
            colors: image.components(),
            bits_per_component: image.bits_per_component as usize,
            columns: image.width as usize,
        };
        let mut parms = PdfDict::new();
        parms.insert("Predictor", 12);
        parms.insert("Colors", params.colors);
        parms.insert("BitsPerComponent", params.bits_per_component);
        parms.insert("Columns", params.columns);
        Ok(EncodedImage {
            data: flate_encode(&encode_png(&image.data, &params, 2)?)?,
            filter: Some("FlateDecode".into()),
            decode_parms: Some(parms),
        })
    }
}

/// Bytes already in a PDF-decodable format, such as a JPEG file under
/// `DCTDecode`.
#[derive(Debug, Clone)]
pub struct PassThroughCodec {
    pub filter: String,
}

impl PassThroughCodec {
    pub fn dct() -> Self {
        Self {
            filter: "DCTDecode".into(),
        }
    }
}

impl ImageCodec for PassThroughCodec {
    fn encode(&self, image: &Image) -> Result<EncodedImage> {
        Ok(EncodedImage {
            data: image.data.clone(),
            filter: Some(self.filter.clone()),
            decode_parms: None,
        })
    }
}

/// Builds the annotation for an image that carries a link.
pub trait AnnotationFactory: Send + Sync {
    fn link(&self, rect: Rect, uri: &str) -> PdfDict;
}

/// Borderless URI link annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriLinkFactory;

impl AnnotationFactory for UriLinkFactory {
    fn link(&self, (x0, y0, x1, y1): Rect, uri: &str) -> PdfDict {
        let mut action = PdfDict::new();
        action.insert("S", PdfObject::name("URI"));
        action.insert("URI", PdfString::new(uri.as_bytes()));

        let mut annot = PdfDict::with_type("Annot");
        annot.insert("Subtype", PdfObject::name("Link"));
        annot.insert("Rect", PdfObject::numbers(&[x0, y0, x1, y1]));
        annot.insert("Border", PdfObject::numbers(&[0.0, 0.0, 0.0]));
        annot.insert("A", action);
        annot
    }
}

/// The image XObject stream for `image`.
pub(crate) fn image_xobject(image: &Image, encoded: EncodedImage) -> PdfStream {
    let mut dict = PdfDict::with_type("XObject");
    dict.insert("Subtype", PdfObject::name("Image"));
    dict.insert("Width", image.width);
    dict.insert("Height", image.height);
    dict.insert("BitsPerComponent", image.bits_per_component as i64);
    dict.insert("ColorSpace", PdfObject::name(image.color_space.as_str()));
    if image.interpolate {
        dict.insert("Interpolate", true);
    }
    if let Some(filter) = encoded.filter {
        dict.insert("Filter", PdfObject::name(filter));
    }
    if let Some(parms) = encoded.decode_parms {
        dict.insert("DecodeParms", parms);
    }
    let mut stream = PdfStream::new(dict, Vec::new());
    stream.set_raw(encoded.data);
    stream
}

fn abbreviate_color_space(name: &str) -> &str {
    match name {
        "DeviceGray" => "G",
        "DeviceRGB" => "RGB",
        "DeviceCMYK" => "CMYK",
        "Indexed" => "I",
        other => other,
    }
}

fn abbreviate_filter(name: &str) -> &str {
    match name {
        "ASCIIHexDecode" => "AHx",
        "ASCII85Decode" => "A85",
        "LZWDecode" => "LZW",
        "FlateDecode" => "Fl",
        "RunLengthDecode" => "RL",
        "CCITTFaxDecode" => "CCF",
        "DCTDecode" => "DCT",
        other => other,
    }
}

/// The `BI ... ID` header of an inline image, keys abbreviated.
pub(crate) fn inline_header(image: &Image, encoded: &EncodedImage) -> PdfDict {
    let mut dict = PdfDict::new();
    dict.insert("W", image.width);
    dict.insert("H", image.height);
    dict.insert("BPC", image.bits_per_component as i64);
    dict.insert(
        "CS",
        PdfObject::name(abbreviate_color_space(&image.color_space)),
    );
    if image.interpolate {
        dict.insert("I", true);
    }
    if let Some(filter) = &encoded.filter {
        dict.insert("F", PdfObject::name(abbreviate_filter(filter)));
    }
    if let Some(parms) = &encoded.decode_parms {
        dict.insert("DP", parms.clone());
    }
    dict
}
