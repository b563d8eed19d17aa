//! RSA-OAEP key wrapping
//!
//! Symmetric keys are wrapped for each user with RSA-OAEP (SHA-256 for both
//! the label hash and MGF1) against the public key in the user's
//! certificate. Only the holder of the matching private key can unwrap.
//!
//! Current documents wrap the raw key bytes. Legacy documents wrapped
//! `base64(base64(key))`; the `_legacy` variants handle that form.

use crate::{
    certificate::Certificate,
    encoding,
    keys::{PrivateKey, SymmetricKey},
    CryptoError, Result,
};
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize;

/// Encryptor wrapping data for one recipient
pub struct Encryptor {
    recipient_public: RsaPublicKey,
}

impl Encryptor {
    /// Create an encryptor for the key in a certificate
    pub fn new(certificate: &Certificate) -> Result<Self> {
        Ok(Self {
            recipient_public: certificate.public_key()?,
        })
    }

    /// Create an encryptor from a bare public key
    pub fn from_public_key(recipient_public: RsaPublicKey) -> Self {
        Self { recipient_public }
    }

    /// Encrypt data for the recipient
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.recipient_public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Wrap a symmetric key, returning base64
    pub fn encrypt_key(&self, key: &SymmetricKey) -> Result<String> {
        Ok(encoding::encode(self.encrypt(key.as_bytes())?))
    }

    /// Wrap a symmetric key in the legacy double-base64 form
    pub fn encrypt_key_legacy(&self, key: &SymmetricKey) -> Result<String> {
        let mut inner = encoding::encode(encoding::encode(key.as_bytes()));
        let wrapped = self.encrypt(inner.as_bytes());
        inner.zeroize();
        Ok(encoding::encode(wrapped?))
    }
}

/// Decryptor holding the recipient's private key
pub struct Decryptor {
    private_key: PrivateKey,
}

impl Decryptor {
    /// Create a decryptor with the recipient's private key
    pub fn new(private_key: &PrivateKey) -> Self {
        Self {
            private_key: private_key.clone(),
        }
    }

    /// Decrypt data
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.private_key
            .as_rsa()
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }

    /// Unwrap a base64 wrapped symmetric key
    pub fn decrypt_key(&self, wrapped_b64: &str) -> Result<SymmetricKey> {
        let mut bytes = self.decrypt(&encoding::decode(wrapped_b64)?)?;
        let key = SymmetricKey::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Unwrap a key wrapped in the legacy double-base64 form
    pub fn decrypt_key_legacy(&self, wrapped_b64: &str) -> Result<SymmetricKey> {
        let mut outer = self.decrypt(&encoding::decode(wrapped_b64)?)?;
        let inner = std::str::from_utf8(&outer)
            .map_err(|e| CryptoError::InvalidKey(format!("legacy wrapped key: {}", e)))
            .and_then(encoding::decode);
        outer.zeroize();
        let mut inner = inner?;
        let key = std::str::from_utf8(&inner)
            .map_err(|e| CryptoError::InvalidKey(format!("legacy wrapped key: {}", e)))
            .and_then(SymmetricKey::from_base64);
        inner.zeroize();
        key
    }
}
