//! Stream codecs and the ciphers used by the security handlers.
//!
//! - `aes`, `arcfour`: ciphers
//! - `ascii85`, `flate`, `lzw`, `runlength`: stream filters
//! - `predictor`: PNG and TIFF predictors
//! - `filters`: filter chains and the handler registry

pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod filters;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
pub use arcfour::Arcfour;
pub use ascii85::{ascii85decode, asciihexdecode};
pub use filters::{
    FilterHandler, FilterRegistry, decode_stream_data, filter_chain, normalize_filter_name,
};
pub use flate::{flate_decode, flate_encode};
pub use lzw::lzwdecode_with_earlychange;
pub use predictor::{PredictorParams, decode_predictor, encode_png, encode_tiff};
pub use runlength::rldecode;
