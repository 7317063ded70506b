//! AES-CBC helpers for the standard and public-key security handlers.

use crate::error::{PdfError, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;
type Aes256CbcEnc = Encryptor<aes::Aes256>;

fn cipher_error(msg: &str) -> PdfError {
    PdfError::Decode {
        filter: "AES",
        msg: msg.to_string(),
    }
}

/// Decrypt data using AES-CBC with a 128 or 256 bit key, no unpadding.
///
/// A trailing partial block is dropped, as producers occasionally pad badly.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != 16 {
        return Err(cipher_error("IV must be 16 bytes"));
    }
    let mut buf = data[..data.len() - data.len() % 16].to_vec();
    match key.len() {
        16 => Aes128CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| cipher_error("bad block length"))?,
        32 => Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| cipher_error("bad block length"))?,
        _ => return Err(cipher_error("key must be 16 or 32 bytes")),
    };
    Ok(buf)
}

/// Encrypt whole blocks with AES-CBC (128 or 256 bit key), no padding.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != 16 || data.len() % 16 != 0 {
        return Err(cipher_error("IV and data must be whole blocks"));
    }
    let mut buf = data.to_vec();
    let len = buf.len();
    match key.len() {
        16 => Aes128CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| cipher_error("bad block length"))?,
        32 => Aes256CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| cipher_error("bad block length"))?,
        _ => return Err(cipher_error("key must be 16 or 32 bytes")),
    };
    Ok(buf)
}

/// Remove PKCS#7 padding; invalid padding leaves the data unchanged.
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > 16 || pad_len > data.len() {
        return data;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().all(|&b| b as usize == pad_len) {
        &data[..start]
    } else {
        data
    }
}

/// Decrypts a PDF string or stream payload: the first 16 bytes are the IV.
pub fn decrypt_with_iv(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 16 {
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    let plain = aes_cbc_decrypt(key, iv, body)?;
    Ok(unpad_aes(&plain).to_vec())
}

/// Encrypts with a caller-chosen IV and PKCS#7 padding, IV prepended.
pub fn encrypt_with_iv(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    let pad = 16 - data.len() % 16;
    let mut padded = data.to_vec();
    padded.extend(std::iter::repeat_n(pad as u8, pad));
    let mut out = iv.to_vec();
    out.extend(aes_cbc_encrypt(key, iv, &padded)?);
    Ok(out)
}
