//! Symmetric encryption using AES-GCM
//!
//! Metadata bodies, file records and filedrop entries are all sealed with
//! AES-GCM under a 16-byte nonce and a 128-bit tag. The ciphertext carries
//! the tag appended; the tag is also exposed separately because the wire
//! format stores it in its own field.

use crate::{
    encoding,
    keys::{SymmetricKey, KEY_SIZE, MAX_KEY_SIZE, NONCE_SIZE, TAG_SIZE},
    CryptoError, Result,
};
use aes_gcm::{
    aead::{consts::U16, Aead as AeadTrait},
    aes::{Aes128, Aes256},
    AesGcm, KeyInit,
};
use rand::rngs::OsRng;

type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Separator between ciphertext and nonce in legacy combined strings
pub const IV_DELIMITER: &str = "|";

/// Base64 of `|`, the separator written by the oldest clients
pub const IV_DELIMITER_OLD: &str = "fA==";

/// A nonce for AES-GCM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonce(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        encoding::encode(self.bytes)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_bytes(&encoding::decode(s)?)
    }
}

/// AES-GCM encryption/decryption under one key
pub struct Aead {
    key: SymmetricKey,
}

impl Aead {
    /// Create a new AEAD instance with the given key
    pub fn new(key: &SymmetricKey) -> Self {
        Self { key: key.clone() }
    }

    /// Encrypt, returning `ciphertext || tag`
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_arr = aes_gcm::aead::generic_array::GenericArray::from_slice(nonce.as_bytes());
        match self.key.len() {
            KEY_SIZE => Aes128Gcm16::new_from_slice(self.key.as_bytes())
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(nonce_arr, plaintext)
                .map_err(|e| CryptoError::Encryption(e.to_string())),
            MAX_KEY_SIZE => Aes256Gcm16::new_from_slice(self.key.as_bytes())
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(nonce_arr, plaintext)
                .map_err(|e| CryptoError::Encryption(e.to_string())),
            n => Err(CryptoError::InvalidKey(format!("unsupported AES key size {}", n))),
        }
    }

    /// Decrypt `ciphertext || tag`
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::InvalidCiphertext(format!(
                "ciphertext shorter than the {}-byte tag",
                TAG_SIZE
            )));
        }
        let nonce_arr = aes_gcm::aead::generic_array::GenericArray::from_slice(nonce.as_bytes());
        match self.key.len() {
            KEY_SIZE => Aes128Gcm16::new_from_slice(self.key.as_bytes())
                .map_err(|e| CryptoError::Decryption(e.to_string()))?
                .decrypt(nonce_arr, ciphertext)
                .map_err(|e| CryptoError::Decryption(e.to_string())),
            MAX_KEY_SIZE => Aes256Gcm16::new_from_slice(self.key.as_bytes())
                .map_err(|e| CryptoError::Decryption(e.to_string()))?
                .decrypt(nonce_arr, ciphertext)
                .map_err(|e| CryptoError::Decryption(e.to_string())),
            n => Err(CryptoError::InvalidKey(format!("unsupported AES key size {}", n))),
        }
    }
}

/// Output of [`seal`]: ciphertext with appended tag, its nonce and the tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    /// `ciphertext || tag`
    pub ciphertext: Vec<u8>,
    /// Nonce used for encryption
    pub nonce: Nonce,
    /// The trailing 16 bytes of `ciphertext`
    pub tag: [u8; TAG_SIZE],
}

impl Sealed {
    /// Base64 of the ciphertext (tag included)
    pub fn ciphertext_base64(&self) -> String {
        encoding::encode(&self.ciphertext)
    }

    /// Base64 of the nonce
    pub fn nonce_base64(&self) -> String {
        self.nonce.to_base64()
    }

    /// Base64 of the authentication tag
    pub fn tag_base64(&self) -> String {
        encoding::encode(self.tag)
    }
}

/// Encrypt under a fresh random nonce
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Sealed> {
    let nonce = Nonce::generate();
    let ciphertext = Aead::new(key).encrypt(&nonce, plaintext)?;
    let tag = trailing_tag(&ciphertext)?;
    Ok(Sealed {
        ciphertext,
        nonce,
        tag,
    })
}

/// Decrypt base64 wire fields.
///
/// A trailing `|...` left by older writers is stripped from the ciphertext.
/// When `tag_b64` is given it must equal the last 16 bytes of the
/// ciphertext, otherwise [`CryptoError::TagMismatch`] is returned without
/// attempting decryption.
pub fn open(
    key: &SymmetricKey,
    ciphertext_b64: &str,
    nonce_b64: &str,
    tag_b64: Option<&str>,
) -> Result<Vec<u8>> {
    let ciphertext_b64 = match ciphertext_b64.rfind(IV_DELIMITER) {
        Some(pos) => &ciphertext_b64[..pos],
        None => ciphertext_b64,
    };
    let ciphertext = encoding::decode(ciphertext_b64)?;
    let nonce = Nonce::from_base64(nonce_b64)?;
    if let Some(tag_b64) = tag_b64 {
        let expected = encoding::decode(tag_b64)?;
        if trailing_tag(&ciphertext)?.as_slice() != expected.as_slice() {
            return Err(CryptoError::TagMismatch);
        }
    }
    Aead::new(key).decrypt(&nonce, &ciphertext)
}

/// Encrypt into the legacy combined `base64(ct)|base64(nonce)` string
pub fn seal_legacy(key: &SymmetricKey, plaintext: &[u8]) -> Result<String> {
    let sealed = seal(key, plaintext)?;
    Ok(format!(
        "{}{}{}",
        sealed.ciphertext_base64(),
        IV_DELIMITER,
        sealed.nonce_base64()
    ))
}

/// Decrypt a legacy combined string.
///
/// The nonce follows the last `|`; strings without one use the older
/// `fA==` separator.
pub fn open_legacy(key: &SymmetricKey, combined: &str) -> Result<Vec<u8>> {
    let (ciphertext_b64, nonce_b64) = match combined.rfind(IV_DELIMITER) {
        Some(pos) => (&combined[..pos], &combined[pos + IV_DELIMITER.len()..]),
        None => match combined.rfind(IV_DELIMITER_OLD) {
            Some(pos) => (&combined[..pos], &combined[pos + IV_DELIMITER_OLD.len()..]),
            None => {
                return Err(CryptoError::InvalidCiphertext(
                    "missing nonce delimiter".into(),
                ))
            }
        },
    };
    let nonce = Nonce::from_base64(nonce_b64)?;
    let ciphertext = encoding::decode(ciphertext_b64)?;
    Aead::new(key).decrypt(&nonce, &ciphertext)
}

fn trailing_tag(ciphertext: &[u8]) -> Result<[u8; TAG_SIZE]> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::InvalidCiphertext(format!(
            "ciphertext shorter than the {}-byte tag",
            TAG_SIZE
        )));
    }
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&ciphertext[ciphertext.len() - TAG_SIZE..]);
    Ok(tag)
}
