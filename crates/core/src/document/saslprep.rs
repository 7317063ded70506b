//! SASLprep (RFC 4013) for AES-256 revision 6 passwords.

use crate::error::{PdfError, Result};
use unicode_normalization::UnicodeNormalization;

/// Table B.1: mapped to nothing.
fn maps_to_nothing(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{1806}'
            | '\u{180B}'..='\u{180D}'
            | '\u{200B}'..='\u{200D}'
            | '\u{2060}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{FEFF}'
    )
}

/// Table C.1.2: non-ASCII spaces, mapped to U+0020.
fn is_non_ascii_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200B}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Tables C.2 to C.9.
fn is_prohibited(c: char) -> bool {
    matches!(
        c,
        '\u{0000}'..='\u{001F}'
            | '\u{007F}'..='\u{009F}'
            | '\u{0340}'
            | '\u{0341}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{180E}'
            | '\u{200C}'..='\u{200F}'
            | '\u{2028}'..='\u{202E}'
            | '\u{2060}'..='\u{2063}'
            | '\u{206A}'..='\u{206F}'
            | '\u{2FF0}'..='\u{2FFB}'
            | '\u{E000}'..='\u{F8FF}'
            | '\u{FDD0}'..='\u{FDEF}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFD}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
            | '\u{F0000}'..='\u{FFFFD}'
            | '\u{100000}'..='\u{10FFFD}'
    ) || (c as u32 & 0xFFFE) == 0xFFFE
}

/// Table D.1, main right-to-left blocks.
fn is_rand_al(c: char) -> bool {
    matches!(
        c,
        '\u{05BE}'
            | '\u{05C0}'
            | '\u{05C3}'
            | '\u{05D0}'..='\u{05F4}'
            | '\u{061B}'..='\u{064A}'
            | '\u{066D}'..='\u{06D5}'
            | '\u{06E5}'..='\u{06E6}'
            | '\u{06FA}'..='\u{070D}'
            | '\u{0710}'..='\u{072C}'
            | '\u{0780}'..='\u{07B1}'
            | '\u{FB1D}'..='\u{FDFC}'
            | '\u{FE70}'..='\u{FEFC}'
    )
}

/// Table D.2, approximated by alphabetic characters outside the RTL blocks.
fn is_l(c: char) -> bool {
    c.is_alphabetic() && !is_rand_al(c)
}

/// Prepares `password` for hashing: maps, NFKC-normalizes, then rejects
/// prohibited characters and mixed-direction text.
pub fn saslprep(password: &str) -> Result<String> {
    let mapped: String = password
        .chars()
        .filter(|&c| !maps_to_nothing(c))
        .map(|c| if is_non_ascii_space(c) { ' ' } else { c })
        .collect();
    let normalized: String = mapped.nfkc().collect();

    if let Some(bad) = normalized.chars().find(|&c| is_prohibited(c)) {
        return Err(PdfError::InvalidArgument(format!(
            "password contains prohibited character U+{:04X}",
            bad as u32
        )));
    }
    let (Some(first), Some(last)) = (normalized.chars().next(), normalized.chars().last()) else {
        return Ok(normalized);
    };
    if normalized.chars().any(is_rand_al)
        && (!is_rand_al(first) || !is_rand_al(last) || normalized.chars().any(is_l))
    {
        return Err(PdfError::InvalidArgument(
            "password fails the bidirectional check".into(),
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_and_normalizes() {
        assert_eq!(saslprep("I\u{00AD}X").unwrap(), "IX");
        assert_eq!(saslprep("user").unwrap(), "user");
        assert_eq!(saslprep("\u{00AA}").unwrap(), "a");
        assert_eq!(saslprep("\u{2168}").unwrap(), "IX");
        assert_eq!(saslprep("a\u{00A0}b").unwrap(), "a b");
    }

    #[test]
    fn rejects_prohibited_and_mixed_direction() {
        assert!(saslprep("\u{0007}").is_err());
        assert!(saslprep("\u{0627}1").is_err());
        assert!(saslprep("\u{0627}a\u{0628}").is_err());
        assert_eq!(saslprep("\u{0627}1\u{0628}").unwrap(), "\u{0627}1\u{0628}");
    }
}
