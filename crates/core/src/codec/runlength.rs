//! RunLength stream codec.

use crate::error::Result;

/// Decode RunLength-encoded data.
///
/// A length byte of 0-127 copies the next `n + 1` bytes, 129-255 repeats
/// the next byte `257 - n` times, and 128 ends the data. A truncated final
/// run is dropped rather than reported.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut rest = data;
    while let Some((&length, tail)) = rest.split_first() {
        rest = tail;
        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let Some((run, tail)) = rest.split_at_checked(count) else {
                    break;
                };
                out.extend_from_slice(run);
                rest = tail;
            }
            129..=255 => {
                let Some((&byte, tail)) = rest.split_first() else {
                    break;
                };
                out.extend(std::iter::repeat_n(byte, 257 - length as usize));
                rest = tail;
            }
        }
    }
    Ok(out)
}

/// Encode data with RunLength, ending with the EOD marker.
pub fn rlencode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 64 + 2);
    let mut i = 0;
    while i < data.len() {
        let mut run = 1;
        while i + run < data.len() && data[i + run] == data[i] && run < 128 {
            run += 1;
        }
        if run > 1 {
            out.push((257 - run) as u8);
            out.push(data[i]);
            i += run;
            continue;
        }
        let start = i;
        while i < data.len()
            && i - start < 128
            && !(i + 1 < data.len() && data[i + 1] == data[i])
        {
            i += 1;
        }
        if i == start {
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out.push(128);
    out
}
