//! Security handlers: the standard password handler (revisions 2 to 6)
//! and the public-key handler.
//!
//! The reader only talks to the [`Decryptor`] trait. Key derivation stays
//! inside the handlers; the per-object key schedule is shared.

use super::saslprep::saslprep;
use crate::codec::aes::{aes_cbc_decrypt, aes_cbc_encrypt, decrypt_with_iv, encrypt_with_iv};
use crate::codec::arcfour::Arcfour;
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, PdfDict, PdfObject, PdfString};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Password padding string.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Cipher family in effect for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMode {
    /// RC4 with a key of `bits` bits (40 to 128).
    Rc4 { bits: u32 },
    Aes128,
    Aes256,
}

/// Crypt filter method, per `/CFM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
    AesV3,
}

/// What a payload belongs to. Strings and streams may use different crypt
/// filters, and metadata streams may be left in clear.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    String,
    Stream(&'a PdfDict),
}

/// Decrypts strings and stream payloads of one document.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>>;

    /// Inverse of [`Decryptor::decrypt`]; AES payloads get an IV derived
    /// from the object key and the payload.
    fn encrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>>;

    fn crypto_mode(&self) -> CryptoMode;

    /// The `/P` flags.
    fn permissions(&self) -> i32;

    /// True when the owner password opened the document.
    fn owner_access(&self) -> bool;

    fn encrypts_metadata(&self) -> bool;
}

/// Supplies the seed of a public-key encrypted document. Certificates and
/// CMS parsing live with the caller.
pub trait RecipientUnwrapper: Send + Sync {
    /// Returns the decrypted seed if `enveloped` (one `/Recipients` entry)
    /// is addressed to this recipient.
    fn unwrap_seed(&self, enveloped: &[u8]) -> Option<Vec<u8>>;
}

/// Per-object key: MD5 of the file key, the low three bytes of the object
/// number, the low two bytes of the generation, plus `sAlT` for AES.
pub fn object_key(file_key: &[u8], obj: ObjRef, aes: bool) -> Vec<u8> {
    let mut ctx = md5::Context::new();
    ctx.consume(file_key);
    ctx.consume(&obj.num.to_le_bytes()[..3]);
    ctx.consume(obj.generation.to_le_bytes());
    if aes {
        ctx.consume(b"sAlT");
    }
    let digest = ctx.finalize().0;
    digest[..(file_key.len() + 5).min(16)].to_vec()
}

/// Key material and crypt filter choice shared by both handlers.
#[derive(Clone)]
struct CryptCore {
    key: Vec<u8>,
    strf: CryptMethod,
    stmf: CryptMethod,
    encrypt_metadata: bool,
}

impl CryptCore {
    fn method_for(&self, target: Target<'_>) -> CryptMethod {
        match target {
            Target::String => self.strf,
            Target::Stream(dict) if !self.encrypt_metadata && dict.is_type("Metadata") => {
                CryptMethod::Identity
            }
            Target::Stream(_) => self.stmf,
        }
    }

    fn decrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        match self.method_for(target) {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(Arcfour::apply(&object_key(&self.key, obj, false), data)),
            CryptMethod::AesV2 => decrypt_with_iv(&object_key(&self.key, obj, true), data),
            CryptMethod::AesV3 => decrypt_with_iv(&self.key, data),
        }
    }

    fn encrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        let aes_key = match self.method_for(target) {
            CryptMethod::Identity => return Ok(data.to_vec()),
            CryptMethod::Rc4 => {
                return Ok(Arcfour::apply(&object_key(&self.key, obj, false), data));
            }
            CryptMethod::AesV2 => object_key(&self.key, obj, true),
            CryptMethod::AesV3 => self.key.clone(),
        };
        let mut ctx = md5::Context::new();
        ctx.consume(&aes_key);
        ctx.consume(data);
        let iv = ctx.finalize().0;
        encrypt_with_iv(&aes_key, &iv, data)
    }

    fn mode(&self) -> CryptoMode {
        match self.stmf {
            CryptMethod::AesV3 => CryptoMode::Aes256,
            CryptMethod::AesV2 => CryptoMode::Aes128,
            _ => CryptoMode::Rc4 {
                bits: (self.key.len() * 8) as u32,
            },
        }
    }
}

/// Crypt filter method named by `name` inside `/CF`, with its `/Length`.
fn resolve_crypt_filter(encrypt: &PdfDict, name: &str) -> Result<(CryptMethod, Option<i64>)> {
    if name == "Identity" {
        return Ok((CryptMethod::Identity, None));
    }
    let filter = encrypt
        .get_dict("CF")
        .and_then(|cf| cf.get_dict(name))
        .ok_or_else(|| {
            PdfError::UnsupportedEncryption(format!("crypt filter {name} missing from /CF"))
        })?;
    let method = match filter.get_name("CFM").unwrap_or("None") {
        "V2" => CryptMethod::Rc4,
        "AESV2" => CryptMethod::AesV2,
        "AESV3" => CryptMethod::AesV3,
        "None" => CryptMethod::Identity,
        other => {
            return Err(PdfError::UnsupportedEncryption(format!(
                "crypt filter method {other}"
            )));
        }
    };
    Ok((method, filter.get_i64("Length")))
}

/// `/Length` is in bits at the top level but some producers write bytes in
/// crypt filter dictionaries.
fn key_bytes_from_length(length: Option<i64>, default_bits: i64) -> usize {
    let bits = match length {
        Some(l) if l > 0 && l <= 16 => l * 8,
        Some(l) if l >= 40 => l,
        _ => default_bits,
    };
    (bits.clamp(40, 256) / 8) as usize
}

fn string_entry(dict: &PdfDict, key: &str) -> Result<Vec<u8>> {
    dict.get(key)
        .ok_or_else(|| PdfError::UnsupportedEncryption(format!("missing /{key} in /Encrypt")))?
        .as_string()
        .map(|s| s.as_bytes().to_vec())
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PASSWORD_PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Password-based security handler for revisions 2 to 6.
#[derive(Clone)]
pub struct StandardSecurityHandler {
    core: CryptCore,
    revision: i64,
    o: Vec<u8>,
    u: Vec<u8>,
    permissions: i32,
    doc_id: Vec<u8>,
    owner_access: bool,
}

impl fmt::Debug for StandardSecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardSecurityHandler")
            .field("revision", &self.revision)
            .field("mode", &self.core.mode())
            .field("permissions", &self.permissions)
            .field("owner_access", &self.owner_access)
            .finish_non_exhaustive()
    }
}

impl StandardSecurityHandler {
    /// Authenticates `password` against `encrypt`, owner password first.
    pub fn open(encrypt: &PdfDict, doc_id: &[u8], password: &[u8]) -> Result<Self> {
        let v = encrypt.get_i64("V").unwrap_or(0);
        let revision = encrypt
            .get_i64("R")
            .ok_or_else(|| PdfError::UnsupportedEncryption("missing /R in /Encrypt".into()))?;
        let encrypt_metadata = !matches!(encrypt.get("EncryptMetadata"), Some(PdfObject::Boolean(false)));
        let permissions = encrypt.get_i64("P").unwrap_or(-4) as u32 as i32;

        let (strf, stmf, key_len) = match (v, revision) {
            (1, 2) | (0, 2) => (CryptMethod::Rc4, CryptMethod::Rc4, 5),
            (2, 2) | (2, 3) | (1, 3) => {
                let len = key_bytes_from_length(encrypt.get_i64("Length"), 40);
                (CryptMethod::Rc4, CryptMethod::Rc4, len)
            }
            (4, 4) => {
                let (strf, _) = resolve_crypt_filter(encrypt, encrypt.get_name("StrF").unwrap_or("Identity"))?;
                let (stmf, len) = resolve_crypt_filter(encrypt, encrypt.get_name("StmF").unwrap_or("Identity"))?;
                let key_len = match stmf {
                    CryptMethod::Rc4 => key_bytes_from_length(len, 128),
                    _ => 16,
                };
                (strf, stmf, key_len)
            }
            (5, 5) | (5, 6) => {
                let (strf, _) = resolve_crypt_filter(encrypt, encrypt.get_name("StrF").unwrap_or("Identity"))?;
                let (stmf, _) = resolve_crypt_filter(encrypt, encrypt.get_name("StmF").unwrap_or("Identity"))?;
                (strf, stmf, 32)
            }
            _ => {
                return Err(PdfError::UnsupportedEncryption(format!(
                    "standard handler V={v} R={revision}"
                )));
            }
        };

        let mut handler = Self {
            core: CryptCore {
                key: Vec::new(),
                strf,
                stmf,
                encrypt_metadata,
            },
            revision,
            o: string_entry(encrypt, "O")?,
            u: string_entry(encrypt, "U")?,
            permissions,
            doc_id: doc_id.to_vec(),
            owner_access: false,
        };

        let outcome = if revision >= 5 {
            handler.authenticate_aes256(encrypt, password)?
        } else {
            handler
                .authenticate_owner(password, key_len)
                .map(|key| (key, true))
                .or_else(|| handler.authenticate_user(password, key_len).map(|key| (key, false)))
        };
        let (key, owner) = outcome.ok_or(PdfError::BadPassword)?;
        debug!(revision, owner, "authenticated standard security handler");
        handler.core.key = key;
        handler.owner_access = owner;
        Ok(handler)
    }

    /// Builds an `/Encrypt` dictionary for RC4 or AES-128 along with a
    /// handler holding the matching file key. An empty owner password
    /// reuses the user password.
    pub fn create(
        user: &[u8],
        owner: &[u8],
        permissions: i32,
        doc_id: &[u8],
        mode: CryptoMode,
    ) -> Result<(PdfDict, Self)> {
        let owner = if owner.is_empty() { user } else { owner };
        let (v, revision, key_len, method) = match mode {
            CryptoMode::Rc4 { bits: 40 } => (1, 2, 5, CryptMethod::Rc4),
            CryptoMode::Rc4 { bits } if (40..=128).contains(&bits) && bits % 8 == 0 => {
                (2, 3, (bits / 8) as usize, CryptMethod::Rc4)
            }
            CryptoMode::Aes128 => (4, 4, 16, CryptMethod::AesV2),
            other => {
                return Err(PdfError::InvalidArgument(format!(
                    "cannot create {other:?} encryption"
                )));
            }
        };
        let mut handler = Self {
            core: CryptCore {
                key: Vec::new(),
                strf: method,
                stmf: method,
                encrypt_metadata: true,
            },
            revision,
            o: Vec::new(),
            u: Vec::new(),
            permissions,
            doc_id: doc_id.to_vec(),
            owner_access: true,
        };
        handler.o = handler.compute_o_value(owner, user, key_len);
        handler.core.key = handler.compute_file_key(user, key_len);
        handler.u = handler.compute_u_value(&handler.core.key);

        let mut dict = PdfDict::new();
        dict.insert("Filter", PdfObject::name("Standard"));
        dict.insert("V", v);
        dict.insert("R", revision);
        dict.insert("Length", key_len * 8);
        dict.insert("O", PdfString::hex(handler.o.clone()));
        dict.insert("U", PdfString::hex(handler.u.clone()));
        dict.insert("P", permissions);
        if method == CryptMethod::AesV2 {
            let mut std_cf = PdfDict::new();
            std_cf.insert("CFM", PdfObject::name("AESV2"));
            std_cf.insert("AuthEvent", PdfObject::name("DocOpen"));
            std_cf.insert("Length", 16);
            let mut cf = PdfDict::new();
            cf.insert("StdCF", std_cf);
            dict.insert("CF", cf);
            dict.insert("StmF", PdfObject::name("StdCF"));
            dict.insert("StrF", PdfObject::name("StdCF"));
        }
        Ok((dict, handler))
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Algorithm 2: file key from the user password.
    fn compute_file_key(&self, password: &[u8], key_len: usize) -> Vec<u8> {
        let mut ctx = md5::Context::new();
        ctx.consume(pad_password(password));
        ctx.consume(&self.o);
        ctx.consume(self.permissions.to_le_bytes());
        ctx.consume(&self.doc_id);
        if self.revision >= 4 && !self.core.encrypt_metadata {
            ctx.consume([0xFF; 4]);
        }
        let mut digest = ctx.finalize().0;
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..key_len]).0;
            }
        }
        digest[..key_len].to_vec()
    }

    /// Algorithms 4 and 5.
    fn compute_u_value(&self, key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return Arcfour::apply(key, &PASSWORD_PADDING);
        }
        let mut ctx = md5::Context::new();
        ctx.consume(PASSWORD_PADDING);
        ctx.consume(&self.doc_id);
        let mut result = Arcfour::apply(key, &ctx.finalize().0);
        for round in 1..20u8 {
            result = Arcfour::apply(&xor_key(key, round), &result);
        }
        result.resize(32, 0);
        result
    }

    /// RC4 key protecting `/O`, derived from the owner password.
    fn owner_rc4_key(&self, owner: &[u8], key_len: usize) -> Vec<u8> {
        let mut digest = md5::compute(pad_password(owner)).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(digest).0;
            }
        }
        digest[..key_len].to_vec()
    }

    /// Algorithm 3.
    fn compute_o_value(&self, owner: &[u8], user: &[u8], key_len: usize) -> Vec<u8> {
        let key = self.owner_rc4_key(owner, key_len);
        let mut result = Arcfour::apply(&key, &pad_password(user));
        if self.revision >= 3 {
            for round in 1..20u8 {
                result = Arcfour::apply(&xor_key(&key, round), &result);
            }
        }
        result
    }

    fn authenticate_user(&self, password: &[u8], key_len: usize) -> Option<Vec<u8>> {
        let key = self.compute_file_key(password, key_len);
        let computed = self.compute_u_value(&key);
        let matches = if self.revision == 2 {
            computed.len() == self.u.len() && computed == self.u
        } else {
            self.u.len() >= 16 && computed[..16] == self.u[..16]
        };
        matches.then_some(key)
    }

    /// Algorithm 7: recover the user password from `/O`, then check it.
    fn authenticate_owner(&self, password: &[u8], key_len: usize) -> Option<Vec<u8>> {
        let key = self.owner_rc4_key(password, key_len);
        let user_password = if self.revision == 2 {
            Arcfour::apply(&key, &self.o)
        } else {
            let mut result = self.o.clone();
            for round in (0..20u8).rev() {
                result = Arcfour::apply(&xor_key(&key, round), &result);
            }
            result
        };
        self.authenticate_user(&user_password, key_len)
    }

    /// Revisions 5 and 6: SHA-2 based validation, file key unwrapped from
    /// `/OE` or `/UE`.
    fn authenticate_aes256(&self, encrypt: &PdfDict, password: &[u8]) -> Result<Option<(Vec<u8>, bool)>> {
        let oe = string_entry(encrypt, "OE")?;
        let ue = string_entry(encrypt, "UE")?;
        if self.o.len() < 48 || self.u.len() < 48 || oe.len() < 32 || ue.len() < 32 {
            return Err(PdfError::UnsupportedEncryption(
                "truncated AES-256 password entries".into(),
            ));
        }
        let password = self.normalize_password(password);
        let u48 = &self.u[..48];
        if self.hash_aes256(&password, &self.o[32..40], Some(u48))? == self.o[..32] {
            let wrap = self.hash_aes256(&password, &self.o[40..48], Some(u48))?;
            return Ok(Some((aes_cbc_decrypt(&wrap, &[0; 16], &oe[..32])?, true)));
        }
        if self.hash_aes256(&password, &self.u[32..40], None)? == self.u[..32] {
            let wrap = self.hash_aes256(&password, &self.u[40..48], None)?;
            return Ok(Some((aes_cbc_decrypt(&wrap, &[0; 16], &ue[..32])?, false)));
        }
        Ok(None)
    }

    /// Revision 6 passwords are SASLprep'd UTF-8; both revisions keep at
    /// most 127 bytes.
    fn normalize_password(&self, password: &[u8]) -> Vec<u8> {
        let mut bytes = match std::str::from_utf8(password) {
            Ok(text) if self.revision == 6 => match saslprep(text) {
                Ok(prepped) => prepped.into_bytes(),
                Err(err) => {
                    debug!(%err, "SASLprep rejected password, using raw bytes");
                    password.to_vec()
                }
            },
            _ => password.to_vec(),
        };
        bytes.truncate(127);
        bytes
    }

    fn hash_aes256(&self, password: &[u8], salt: &[u8], vector: Option<&[u8]>) -> Result<Vec<u8>> {
        let vector = vector.unwrap_or(&[]);
        let mut k = Sha256::new()
            .chain_update(password)
            .chain_update(salt)
            .chain_update(vector)
            .finalize()
            .to_vec();
        if self.revision == 5 {
            return Ok(k);
        }

        let mut round = 0u32;
        let mut last = 0u8;
        while round < 64 || u32::from(last) > round - 32 {
            let block: Vec<u8> = [password, &k, vector].concat();
            let k1 = block.repeat(64);
            let e = aes_cbc_encrypt(&k[..16], &k[16..32], &k1)?;
            // 256 = 1 (mod 3), so the byte sum decides the modulus
            let selector = e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
            k = match selector {
                0 => Sha256::digest(&e).to_vec(),
                1 => Sha384::digest(&e).to_vec(),
                _ => Sha512::digest(&e).to_vec(),
            };
            last = e[e.len() - 1];
            round += 1;
        }
        k.truncate(32);
        Ok(k)
    }
}

impl Decryptor for StandardSecurityHandler {
    fn decrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        self.core.decrypt(obj, data, target)
    }

    fn encrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        self.core.encrypt(obj, data, target)
    }

    fn crypto_mode(&self) -> CryptoMode {
        self.core.mode()
    }

    fn permissions(&self) -> i32 {
        self.permissions
    }

    fn owner_access(&self) -> bool {
        self.owner_access
    }

    fn encrypts_metadata(&self) -> bool {
        self.core.encrypt_metadata
    }
}

/// Certificate-based handler (`/Filter /Adobe.PubSec`).
#[derive(Clone)]
pub struct PublicKeySecurityHandler {
    core: CryptCore,
    permissions: i32,
}

impl fmt::Debug for PublicKeySecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeySecurityHandler")
            .field("mode", &self.core.mode())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

fn recipient_list(obj: Option<&PdfObject>) -> Vec<Vec<u8>> {
    match obj {
        Some(PdfObject::String(s)) => vec![s.as_bytes().to_vec()],
        Some(PdfObject::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_string().ok())
            .map(|s| s.as_bytes().to_vec())
            .collect(),
        _ => Vec::new(),
    }
}

impl PublicKeySecurityHandler {
    pub fn open(encrypt: &PdfDict, recipient: &dyn RecipientUnwrapper) -> Result<Self> {
        let v = encrypt.get_i64("V").unwrap_or(0);
        let (method, key_len, recipients, encrypt_metadata) = match v {
            1 | 2 => {
                let key_len = if v == 1 {
                    5
                } else {
                    key_bytes_from_length(encrypt.get_i64("Length"), 40)
                };
                (CryptMethod::Rc4, key_len, recipient_list(encrypt.get("Recipients")), true)
            }
            4 | 5 => {
                let name = encrypt.get_name("StmF").unwrap_or("DefaultCryptFilter");
                let (method, length) = resolve_crypt_filter(encrypt, name)?;
                let filter = encrypt.get_dict("CF").and_then(|cf| cf.get_dict(name));
                let recipients = recipient_list(filter.and_then(|f| f.get("Recipients")));
                let encrypt_metadata = !matches!(
                    filter.and_then(|f| f.get("EncryptMetadata")),
                    Some(PdfObject::Boolean(false))
                );
                let key_len = match method {
                    CryptMethod::AesV3 => 32,
                    CryptMethod::AesV2 => 16,
                    _ => key_bytes_from_length(length, 128),
                };
                (method, key_len, recipients, encrypt_metadata)
            }
            _ => {
                return Err(PdfError::UnsupportedEncryption(format!(
                    "public-key handler V={v}"
                )));
            }
        };

        let seed = recipients
            .iter()
            .find_map(|r| recipient.unwrap_seed(r))
            .ok_or(PdfError::NoMatchingRecipient)?;
        if seed.len() < 20 {
            return Err(PdfError::UnsupportedEncryption(format!(
                "enveloped seed too short: {} bytes",
                seed.len()
            )));
        }
        let permissions = match seed.get(20..24) {
            Some(p) => i32::from_be_bytes([p[0], p[1], p[2], p[3]]),
            None => -4,
        };

        let mut material = seed[..20].to_vec();
        for r in &recipients {
            material.extend_from_slice(r);
        }
        if !encrypt_metadata {
            material.extend_from_slice(&[0xFF; 4]);
        }
        let digest = if method == CryptMethod::AesV3 {
            Sha256::digest(&material).to_vec()
        } else {
            Sha1::digest(&material).to_vec()
        };
        let key = digest[..key_len.min(digest.len())].to_vec();

        Ok(Self {
            core: CryptCore {
                key,
                strf: method,
                stmf: method,
                encrypt_metadata,
            },
            permissions,
        })
    }
}

impl Decryptor for PublicKeySecurityHandler {
    fn decrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        self.core.decrypt(obj, data, target)
    }

    fn encrypt(&self, obj: ObjRef, data: &[u8], target: Target<'_>) -> Result<Vec<u8>> {
        self.core.encrypt(obj, data, target)
    }

    fn crypto_mode(&self) -> CryptoMode {
        self.core.mode()
    }

    fn permissions(&self) -> i32 {
        self.permissions
    }

    fn owner_access(&self) -> bool {
        false
    }

    fn encrypts_metadata(&self) -> bool {
        self.core.encrypt_metadata
    }
}

/// Picks the handler named by `/Filter` and authenticates.
pub fn create_decryptor(
    encrypt: &PdfDict,
    doc_id: &[u8],
    password: &[u8],
    recipient: Option<&Arc<dyn RecipientUnwrapper>>,
) -> Result<Arc<dyn Decryptor>> {
    match encrypt.get_name("Filter") {
        Some("Standard") | None => Ok(Arc::new(StandardSecurityHandler::open(
            encrypt, doc_id, password,
        )?)),
        Some("Adobe.PubSec") | Some("Entrust.PPKEF") | Some("Adobe.PPKLite") => match recipient {
            Some(r) => Ok(Arc::new(PublicKeySecurityHandler::open(encrypt, r.as_ref())?)),
            None => Err(PdfError::NoMatchingRecipient),
        },
        Some(other) => Err(PdfError::UnsupportedEncryption(format!(
            "security handler {other}"
        ))),
    }
}
