//! Base64 codec helpers
//!
//! Everything on the wire uses the standard alphabet with padding and no
//! line wrapping.

use crate::{CryptoError, Result};
use base64::Engine;

/// Encode bytes as standard base64
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn decode(s: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(s.trim())?)
}

/// Decode a PEM-armored or bare base64 blob.
///
/// Lines of the form `-----BEGIN <label>-----` / `-----END <label>-----`
/// are dropped and all whitespace is removed before decoding, so both
/// `"-----BEGIN CERTIFICATE-----\nMIIC...\n-----END CERTIFICATE-----"` and
/// a single unbroken base64 line are accepted.
pub fn decode_armored(s: &str, label: &str) -> Result<Vec<u8>> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);
    let body: String = s
        .replace(&begin, "")
        .replace(&end, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if body.contains("-----") {
        return Err(CryptoError::InvalidKey(format!(
            "unexpected PEM armor, expected {}",
            label
        )));
    }
    decode(&body)
}

/// Wrap DER bytes in PEM armor with 64-character lines
pub fn encode_armored(der: &[u8], label: &str) -> String {
    let body = encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}
