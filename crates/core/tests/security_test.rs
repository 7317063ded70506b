//! Standard security handler: reference vectors and whole encrypted files.

mod common;

use common::classic_pdf_bytes;
use lectern_core::document::{
    CryptoMode, Decryptor, PdfReader, ReaderOptions, StandardSecurityHandler, Target,
    WriterOptions,
};
use lectern_core::error::PdfError;
use lectern_core::model::serialize::to_bytes;
use lectern_core::model::{ObjRef, PdfDict, PdfObject, PdfString};

// rc4-40.pdf: V=1, R=2, user password "foo"
const RC4_40_O: [u8; 32] = [
    1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200, 22,
    149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
];
const RC4_40_U: [u8; 32] = [
    105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5, 208,
    231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
];

// rc4-128.pdf: V=2, R=3, user password "foo"
const RC4_128_O: [u8; 32] = [
    208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1, 230, 55,
    209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
];
const RC4_128_U: [u8; 32] = [
    9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0,
];

const DOC_ID: [u8; 16] = [
    101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
];

fn encrypt_dict(v: i64, r: i64, length: i64, o: &[u8], u: &[u8]) -> PdfDict {
    let mut dict = PdfDict::new();
    dict.insert("Filter", PdfObject::name("Standard"));
    dict.insert("V", v);
    dict.insert("R", r);
    dict.insert("P", -4);
    dict.insert("Length", length);
    dict.insert("O", PdfString::new(o));
    dict.insert("U", PdfString::new(u));
    dict
}

#[test]
fn rc4_40_reference_file() {
    let dict = encrypt_dict(1, 2, 40, &RC4_40_O, &RC4_40_U);
    let handler = StandardSecurityHandler::open(&dict, &DOC_ID, b"foo").unwrap();
    assert_eq!(handler.revision(), 2);
    assert_eq!(handler.crypto_mode(), CryptoMode::Rc4 { bits: 40 });
    assert_eq!(handler.permissions(), -4);

    for wrong in [&b"wrong"[..], b""] {
        assert!(matches!(
            StandardSecurityHandler::open(&dict, &DOC_ID, wrong),
            Err(PdfError::BadPassword)
        ));
    }
}

#[test]
fn rc4_128_reference_file() {
    let dict = encrypt_dict(2, 3, 128, &RC4_128_O, &RC4_128_U);
    let handler = StandardSecurityHandler::open(&dict, &DOC_ID, b"foo").unwrap();
    assert_eq!(handler.revision(), 3);
    assert_eq!(handler.crypto_mode(), CryptoMode::Rc4 { bits: 128 });
    assert!(matches!(
        StandardSecurityHandler::open(&dict, &DOC_ID, b"wrong"),
        Err(PdfError::BadPassword)
    ));
}

#[test]
fn unknown_revision_is_unsupported() {
    let dict = encrypt_dict(3, 7, 128, &RC4_128_O, &RC4_128_U);
    assert!(matches!(
        StandardSecurityHandler::open(&dict, &DOC_ID, b"foo"),
        Err(PdfError::UnsupportedEncryption(_))
    ));
}

#[test]
fn keys_differ_per_object_and_generation() {
    let (_, handler) =
        StandardSecurityHandler::create(b"u", b"o", -4, &DOC_ID, CryptoMode::Rc4 { bits: 128 })
            .unwrap();
    let plain = b"same text";
    let a = handler.encrypt(ObjRef::new(1, 0), plain, Target::String).unwrap();
    let b = handler.encrypt(ObjRef::new(2, 0), plain, Target::String).unwrap();
    let c = handler.encrypt(ObjRef::new(1, 1), plain, Target::String).unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert!(handler.encrypt(ObjRef::new(1, 0), b"", Target::String).unwrap().is_empty());
}

fn hex_string(bytes: &[u8]) -> String {
    format!("<{}>", hex::encode(bytes))
}

/// A one-page file whose `/Info` title and content stream are encrypted.
fn encrypted_file(mode: CryptoMode, user: &[u8], owner: &[u8]) -> Vec<u8> {
    let (encrypt, handler) =
        StandardSecurityHandler::create(user, owner, -3904, &DOC_ID, mode).unwrap();

    let content = b"BT /F1 12 Tf (locked) Tj ET";
    let stream_dict = PdfDict::new();
    let sealed = handler
        .encrypt(ObjRef::new(4, 0), content, Target::Stream(&stream_dict))
        .unwrap();
    let mut stream = format!("<< /Length {} >>\nstream\n", sealed.len()).into_bytes();
    stream.extend_from_slice(&sealed);
    stream.extend_from_slice(b"\nendstream");

    let title = handler
        .encrypt(ObjRef::new(6, 0), b"Quarterly report", Target::String)
        .unwrap();
    let info = format!("<< /Title {} /Producer /lectern >>", hex_string(&title));

    let trailer = format!(
        "/Encrypt 5 0 R /Info 6 0 R /ID [{} {}] ",
        hex_string(&DOC_ID),
        hex_string(&DOC_ID)
    );
    classic_pdf_bytes(
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents 4 0 R >>".to_vec(),
            stream,
            to_bytes(&PdfObject::Dictionary(encrypt)),
            info.into_bytes(),
        ],
        &trailer,
    )
}

#[test]
fn encrypted_file_opens_with_either_password() {
    for mode in [
        CryptoMode::Rc4 { bits: 40 },
        CryptoMode::Rc4 { bits: 128 },
        CryptoMode::Aes128,
    ] {
        let data = encrypted_file(mode, b"user", b"owner");

        let refused = PdfReader::open(data.clone(), ReaderOptions::new());
        assert!(matches!(refused, Err(PdfError::BadPassword)), "{mode:?}");

        for (password, full) in [(&b"user"[..], false), (b"owner", true)] {
            let options = ReaderOptions::new().password(password);
            let mut reader = PdfReader::open(data.clone(), options).unwrap();
            assert!(reader.is_encrypted());
            assert_eq!(reader.crypto_mode(), Some(mode));
            assert_eq!(reader.permissions(), -3904);
            assert_eq!(reader.is_opened_with_full_permissions(), full, "{mode:?}");
            assert_eq!(reader.info().unwrap()["Title"], "Quarterly report");
            assert_eq!(reader.page_content(1).unwrap(), b"BT /F1 12 Tf (locked) Tj ET");
        }
    }
}

#[test]
fn empty_user_password_needs_no_prompt() {
    let data = encrypted_file(CryptoMode::Aes128, b"", b"owner");
    let mut reader = PdfReader::open(data, ReaderOptions::new()).unwrap();
    assert!(!reader.is_opened_with_full_permissions());
    assert_eq!(reader.info().unwrap()["Title"], "Quarterly report");

    let data = encrypted_file(CryptoMode::Aes128, b"", b"owner");
    let trusted = ReaderOptions::new().assume_owner_access(true);
    let reader = PdfReader::open(data, trusted).unwrap();
    assert!(reader.is_opened_with_full_permissions());
}

#[test]
fn saved_copy_is_decrypted() {
    let data = encrypted_file(CryptoMode::Rc4 { bits: 128 }, b"user", b"owner");
    let mut reader = PdfReader::open(data, ReaderOptions::new().password("owner")).unwrap();
    let saved = reader.save(WriterOptions::default()).unwrap();

    let mut copy = PdfReader::open(saved, ReaderOptions::new()).unwrap();
    assert!(!copy.is_encrypted());
    assert!(copy.trailer().get("Encrypt").is_none());
    assert_eq!(copy.info().unwrap()["Title"], "Quarterly report");
    assert_eq!(copy.page_content(1).unwrap(), b"BT /F1 12 Tf (locked) Tj ET");
}
