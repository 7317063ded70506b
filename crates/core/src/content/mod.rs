//! Content stream output.
//!
//! - `writer` - ContentWriter, the operator API with its text and state checks
//! - `state` - GraphicState, colours and the FontMetrics collaborator
//! - `resources` - resource names handed out to fonts, images and the rest
//! - `image` - images, image codecs and link annotations

pub mod image;
pub mod resources;
pub mod state;
pub mod writer;

pub use image::{
    AnnotationFactory, EncodedImage, FlateImageCodec, Image, ImageCodec, PassThroughCodec,
    UriLinkFactory,
};
pub use resources::{PageResources, ResourceKind};
pub use state::{Color, FontMetrics, GraphicState, LineCap, LineJoin};
pub use writer::{ContentWriter, MarkedProperties, TextAlign, TextArrayItem};
