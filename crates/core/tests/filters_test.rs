//! Stream filter chains and predictors.

use std::sync::Arc;

use lectern_core::codec::ascii85::ascii85encode;
use lectern_core::codec::lzw::lzwdecode;
use lectern_core::codec::runlength::rlencode;
use lectern_core::codec::{
    Arcfour, FilterRegistry, PredictorParams, ascii85decode, asciihexdecode, decode_predictor,
    decode_stream_data, encode_png, encode_tiff, filter_chain, flate_encode,
};
use lectern_core::error::PdfError;
use lectern_core::model::{PdfDict, PdfObject};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn decode(raw: &[u8], filters: &[&str], parms: Option<PdfDict>) -> Result<Vec<u8>, PdfError> {
    let params: Vec<Option<PdfDict>> = filters.iter().map(|_| parms.clone()).collect();
    decode_stream_data(raw, &names(filters), &params, &FilterRegistry::new())
}

/// Bytes that are not trivially predictable.
fn samples(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 73 + seed * 31) ^ (i >> 3)) as u8).collect()
}

#[test]
fn ascii85_reference_strings() {
    assert_eq!(
        ascii85decode(b"9jqo^BlbD-BleB1DJ+*+F(f,q").unwrap(),
        b"Man is distinguished"
    );
    assert_eq!(ascii85decode(b"E,9)oF*2M7/c~>").unwrap(), b"pleasure.");
    assert_eq!(ascii85decode(b"zE,9)oF*2M7/c~>").unwrap(), b"\0\0\0\0pleasure.");
    assert_eq!(ascii85decode(b"<~E,9)oF*2M7/c~>").unwrap(), b"pleasure.");
}

#[test]
fn ascii85_encoder_feeds_decoder() {
    for len in [0, 1, 4, 7, 64] {
        let data = samples(len, 5);
        assert_eq!(ascii85decode(&ascii85encode(&data)).unwrap(), data, "len {len}");
    }
    let zeros = ascii85encode(&[0; 8]);
    assert_eq!(zeros, b"zz~>");
}

#[test]
fn ascii_hex_odd_digits_and_whitespace() {
    assert_eq!(asciihexdecode(b"61 62 2e6364   65").unwrap(), b"ab.cde");
    assert_eq!(asciihexdecode(b"61 62 2e6364   657>").unwrap(), b"ab.cdep");
    assert_eq!(asciihexdecode(b"7>").unwrap(), b"p");
    assert!(matches!(
        asciihexdecode(b"6x"),
        Err(PdfError::Decode { filter: "ASCIIHexDecode", .. })
    ));
}

#[test]
fn lzw_reference_and_early_change() {
    let input = b"\x80\x0b\x60\x50\x22\x0c\x0c\x85\x01";
    assert_eq!(lzwdecode(input).unwrap(), b"-----A---B");

    let text = samples(2000, 1);
    let packed = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
        .encode(&text)
        .unwrap();
    assert_eq!(decode(&packed, &["LZWDecode"], None).unwrap(), text);

    let plain = weezl::encode::Encoder::new(weezl::BitOrder::Msb, 8)
        .encode(&text)
        .unwrap();
    let mut parms = PdfDict::new();
    parms.insert("EarlyChange", 0);
    assert_eq!(decode(&plain, &["LZW"], Some(parms)).unwrap(), text);
}

#[test]
fn run_length_round_trip() {
    let mut data = vec![7u8; 300];
    data.extend(samples(200, 3));
    data.extend([1, 1, 2, 2, 2, 3]);
    let packed = rlencode(&data);
    assert_eq!(packed.last(), Some(&128));
    assert_eq!(decode(&packed, &["RL"], None).unwrap(), data);
}

#[test]
fn arcfour_reference_vectors() {
    let cases: [(&[u8], &[u8], &str); 3] = [
        (b"Key", b"Plaintext", "bbf316e8d940af0ad3"),
        (b"Wiki", b"pedia", "1021bf0420"),
        (b"Secret", b"Attack at dawn", "45a01f645fc35b383552544b9bf5"),
    ];
    for (key, plain, expected) in cases {
        let cipher = Arcfour::new(key).process(plain);
        assert_eq!(hex::encode(&cipher), expected);
        assert_eq!(Arcfour::apply(key, &cipher), plain);
    }
}

/// Every PNG filter type and the TIFF predictor decode back to the
/// samples, across sample sizes and component counts. Rows are whole
/// bytes so there are no padding bits to disagree on.
#[test]
fn predictors_invert_across_layouts() {
    for bpc in [1usize, 2, 4, 8, 16] {
        for colors in [1usize, 3, 4] {
            for columns in [8usize, 16] {
                let params = PredictorParams {
                    predictor: 15,
                    colors,
                    bits_per_component: bpc,
                    columns,
                };
                let row = (colors * bpc * columns) / 8;
                let data = samples(row * 5, bpc + colors);
                let label = format!("bpc {bpc} colors {colors} columns {columns}");

                let mut parms = PdfDict::new();
                parms.insert("Predictor", 15);
                parms.insert("Colors", colors);
                parms.insert("BitsPerComponent", bpc);
                parms.insert("Columns", columns);
                for filter_type in 0..=4 {
                    let encoded = encode_png(&data, &params, filter_type).unwrap();
                    let packed = flate_encode(&encoded).unwrap();
                    let decoded = decode(&packed, &["FlateDecode"], Some(parms.clone())).unwrap();
                    assert_eq!(decoded, data, "{label} png {filter_type}");
                }

                let tiff = PredictorParams {
                    predictor: 2,
                    ..params
                };
                let encoded = encode_tiff(&data, &tiff).unwrap();
                assert_eq!(decode_predictor(&encoded, &tiff).unwrap(), data, "{label} tiff");
            }
        }
    }
}

#[test]
fn predictor_rejects_odd_sample_size() {
    let params = PredictorParams {
        predictor: 12,
        colors: 1,
        bits_per_component: 3,
        columns: 8,
    };
    assert!(matches!(
        decode_predictor(&[0; 4], &params),
        Err(PdfError::Decode { filter: "Predictor", .. })
    ));
}

#[test]
fn chain_with_per_filter_parms() {
    let text = b"0 0 m 10 10 l S".repeat(20);
    let up = PredictorParams {
        predictor: 12,
        columns: 15,
        ..Default::default()
    };
    let packed = flate_encode(&encode_png(&text, &up, 2).unwrap()).unwrap();
    let hexed = hex::encode(&packed);

    let mut dict = PdfDict::new();
    dict.insert("Filter", vec![PdfObject::name("AHx"), PdfObject::name("Fl")]);
    let mut parms = PdfDict::new();
    parms.insert("Predictor", 12);
    parms.insert("Columns", 15);
    dict.insert("DecodeParms", vec![PdfObject::Null, parms.into()]);

    let (filters, params) = filter_chain(&dict);
    assert_eq!(filters, ["AHx", "Fl"]);
    assert_eq!(params.len(), 2);
    assert!(params[0].is_none());
    let decoded =
        decode_stream_data(hexed.as_bytes(), &filters, &params, &FilterRegistry::new()).unwrap();
    assert_eq!(decoded, text);
}

#[test]
fn registered_handler_takes_over_a_codec() {
    let reverse = |data: &[u8], _: Option<&PdfDict>| -> lectern_core::error::Result<Vec<u8>> {
        Ok(data.iter().rev().copied().collect())
    };
    let registry = FilterRegistry::new().with("DCTDecode", Arc::new(reverse));
    let out = decode_stream_data(b"abc", &names(&["DCTDecode"]), &[], &registry).unwrap();
    assert_eq!(out, b"cba");

    // without a handler the codec payload is returned as is
    let raw = decode_stream_data(b"abc", &names(&["DCT"]), &[], &FilterRegistry::new()).unwrap();
    assert_eq!(raw, b"abc");
}

#[test]
fn identity_crypt_filter_only() {
    let mut identity = PdfDict::new();
    identity.insert("Name", PdfObject::name("Identity"));
    assert_eq!(decode(b"xyz", &["Crypt"], Some(identity)).unwrap(), b"xyz");

    let mut named = PdfDict::new();
    named.insert("Name", PdfObject::name("StdCF"));
    assert!(matches!(
        decode(b"xyz", &["Crypt"], Some(named)),
        Err(PdfError::UnsupportedFilter(_))
    ));
}
