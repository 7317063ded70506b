//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{PdfError, Result};

fn is_ascii_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c')
}

/// Decode ASCII85-encoded data (PDF variant).
///
/// Whitespace is ignored, `z` expands to four zero bytes, `~` (the `~>`
/// marker) ends the data, and a missing end marker is tolerated.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut n = 0;

    for &b in data {
        match b {
            b'~' => break,
            b'z' if n == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[n] = b - b'!';
                n += 1;
                if n == 5 {
                    out.extend_from_slice(&group_value(&group)?.to_be_bytes());
                    n = 0;
                }
            }
            b if is_ascii_whitespace(b) => {}
            other => {
                return Err(PdfError::Decode {
                    filter: "ASCII85Decode",
                    msg: format!("illegal character 0x{other:02x}"),
                });
            }
        }
    }

    // final partial group: pad with 'u' and keep n-1 bytes
    if n == 1 {
        return Err(PdfError::Decode {
            filter: "ASCII85Decode",
            msg: "final group has a single character".into(),
        });
    }
    if n > 1 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        let bytes = group_value(&group)?.to_be_bytes();
        out.extend_from_slice(&bytes[..n - 1]);
    }
    Ok(out)
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + digit as u64);
    u32::try_from(value).map_err(|_| PdfError::Decode {
        filter: "ASCII85Decode",
        msg: "group value overflows 32 bits".into(),
    })
}

/// Decode ASCIIHex-encoded data.
///
/// Whitespace is ignored, `>` ends the data, and an odd final digit is
/// padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data {
        let nibble = match b {
            b'>' => break,
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            b if is_ascii_whitespace(b) => continue,
            other => {
                return Err(PdfError::Decode {
                    filter: "ASCIIHexDecode",
                    msg: format!("illegal character 0x{other:02x}"),
                });
            }
        };
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

/// Encode bytes as ASCII85 with the `~>` end marker.
pub fn ascii85encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 5 / 4 + 2);
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);
        if chunk.len() == 4 && value == 0 {
            out.push(b'z');
            continue;
        }
        let mut digits = [0u8; 5];
        for d in digits.iter_mut().rev() {
            *d = (value % 85) as u8 + b'!';
            value /= 85;
        }
        out.extend_from_slice(&digits[..chunk.len() + 1]);
    }
    out.extend_from_slice(b"~>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii85_with_whitespace_and_marker() {
        let sample = ascii85decode(b"87cURD]i,\"Ebo80~>").unwrap();
        assert_eq!(sample, b"Hello world");
        let spaced = ascii85decode(b"87cU RD]i,\n\"Ebo80").unwrap();
        assert_eq!(spaced, b"Hello world");
    }

    #[test]
    fn ascii85_z_and_round_trip() {
        assert_eq!(ascii85decode(b"z~>").unwrap(), vec![0; 4]);
        let data = b"\x00\x00\x00\x00binary\xff\xfe";
        assert_eq!(ascii85decode(&ascii85encode(data)).unwrap(), data);
    }

    #[test]
    fn ascii85_illegal_character() {
        assert!(ascii85decode(b"87c{").is_err());
    }

    #[test]
    fn asciihex_terminator_and_odd_digit() {
        assert_eq!(asciihexdecode(b"61 62\n63>ignored").unwrap(), b"abc");
        assert_eq!(asciihexdecode(b"7").unwrap(), vec![0x70]);
    }
}
