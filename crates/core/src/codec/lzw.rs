//! LZW stream decoder using the weezl crate.

use crate::error::Result;
use tracing::debug;
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data with the PDF default `/EarlyChange 1`.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW-encoded data (MSB first, 8-bit alphabet).
///
/// `/EarlyChange 1` widens the code one entry early, which is the variant
/// weezl calls the TIFF size switch; `0` is plain LZW.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    // corrupt tails are common; keep whatever decoded cleanly
    let status = decoder.into_vec(&mut output).decode(data).status;
    if let Err(err) = status {
        debug!(%err, decoded = output.len(), "LZW data ended early");
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_sample() {
        let input = hex::decode("800b6050220c0c8501").unwrap();
        assert_eq!(lzwdecode(&input).unwrap(), b"-----A---B");
    }

    #[test]
    fn garbage_is_not_fatal() {
        assert!(lzwdecode(&[0xff, 0xff, 0xff]).is_ok());
    }
}
