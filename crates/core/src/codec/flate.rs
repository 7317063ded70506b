//! Flate (zlib) codec with a lenient fallback for damaged streams.

use crate::error::{PdfError, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::{Read, Write};
use tracing::debug;

/// Inflate zlib data. On corruption the stream is retried one input byte at
/// a time, keeping everything produced before the damage; a stream without
/// a zlib header is tried as raw deflate.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 3);
    let err = match ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => return Ok(out),
        Err(err) => err,
    };
    debug!(%err, "zlib inflate failed, retrying leniently");
    let partial = flate_decode_lenient(data);
    if !partial.is_empty() {
        return Ok(partial);
    }
    let mut raw = Vec::new();
    if DeflateDecoder::new(data).read_to_end(&mut raw).is_ok() && !raw.is_empty() {
        return Ok(raw);
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }
    Err(PdfError::Decode {
        filter: "FlateDecode",
        msg: err.to_string(),
    })
}

/// Byte-at-a-time inflate that stops quietly at the first error.
pub fn flate_decode_lenient(data: &[u8]) -> Vec<u8> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 8192];
    let mut i = 0usize;
    let mut finished = false;
    while i < data.len() {
        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let res = inflater.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (inflater.total_out() - before_out) as usize;
        let consumed = (inflater.total_in() - before_in) as usize;
        out.extend_from_slice(&buf[..produced]);
        match res {
            Ok(Status::StreamEnd) | Err(_) => {
                finished = true;
                break;
            }
            Ok(_) => {}
        }
        if consumed == 0 && produced == 0 {
            i += 1;
        } else {
            i += consumed;
        }
    }
    // flush whatever is still buffered inside the inflater
    while !finished {
        let before_out = inflater.total_out();
        let res = inflater.decompress(&[], &mut buf, FlushDecompress::Sync);
        let produced = (inflater.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        finished = produced == 0 || !matches!(res, Ok(Status::Ok));
    }
    out
}

/// Deflate with zlib framing at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET\n".repeat(50);
        let packed = flate_encode(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(flate_decode(&packed).unwrap(), data);
    }

    #[test]
    fn truncated_stream_keeps_prefix() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let packed = flate_encode(&data).unwrap();
        let cut = &packed[..packed.len() * 2 / 3];
        let got = flate_decode(cut).unwrap();
        assert!(!got.is_empty());
        assert_eq!(&data[..got.len()], &got[..]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(flate_decode(b"\x00\x01\x02not zlib at all").is_err());
    }
}
