//! Filedrop: files deposited by write-only collaborators
//!
//! A depositor cannot read the folder's metadata key, so each dropped file
//! record is sealed under its own one-shot key, and that key is wrapped for
//! the folder owner alone. The server appends the entry to the folder
//! document's `filedrop` map; the owner's client later merges it into
//! `files` and re-uploads the folder without it.
//!
//! ```text
//! Depositor                       Server                          Owner
//!   │                                │                                │
//!   │ 1. seal gzip(json(file))       │                                │
//!   │    under a fresh key           │                                │
//!   │ 2. wrap key for owner ─────────│►[filedrop[token] stored]       │
//!   │                                │                                │
//!   │                                │◄──3. fetch folder metadata ────│
//!   │                                │                                │
//!   │                                │   4. unwrap, open, merge       │
//!   │                                │◄──5. lock, upload, unlock ─────│
//! ```
//!
//! Entries are decrypted independently: one corrupt entry is reported on
//! its own and does not prevent the others from being merged.

use crate::{
    types::{DecryptedFile, EncryptedFiledrop, EncryptedFiledropUser},
    MetadataError, Result,
};
use e2ee_crypto::{compression, symmetric, Certificate, Decryptor, Encryptor, PrivateKey, SymmetricKey};
use std::collections::BTreeMap;

/// Seal a file record for the folder owner (depositor side)
pub fn encrypt_filedrop(
    file: &DecryptedFile,
    recipient_id: &str,
    recipient_certificate: &Certificate,
) -> Result<EncryptedFiledrop> {
    let key = SymmetricKey::generate();
    let json = serde_json::to_string(file)?;
    let sealed = symmetric::seal(&key, &compression::compress(json.as_bytes())?)?;
    let encrypted_filedrop_key = Encryptor::new(recipient_certificate)?.encrypt_key(&key)?;

    Ok(EncryptedFiledrop {
        ciphertext: sealed.ciphertext_base64(),
        nonce: sealed.nonce_base64(),
        authentication_tag: sealed.tag_base64(),
        users: vec![EncryptedFiledropUser {
            user_id: recipient_id.to_string(),
            encrypted_filedrop_key,
        }],
    })
}

/// Decrypt one filedrop entry.
///
/// The wrapped key is taken from the record for `user_id`, or from the only
/// record when the entry has exactly one. Any failure is reported as
/// [`MetadataError::FiledropCorrupt`] naming `token`.
pub fn decrypt_filedrop(
    token: &str,
    entry: &EncryptedFiledrop,
    user_id: &str,
    private_key: &PrivateKey,
) -> Result<DecryptedFile> {
    let corrupt = |reason: String| MetadataError::FiledropCorrupt {
        token: token.to_string(),
        reason,
    };

    let recipient = entry
        .users
        .iter()
        .find(|u| u.user_id == user_id)
        .or_else(|| match entry.users.as_slice() {
            [only] => Some(only),
            _ => None,
        })
        .ok_or_else(|| corrupt(format!("no key wrapped for {user_id}")))?;

    let key = Decryptor::new(private_key)
        .decrypt_key(&recipient.encrypted_filedrop_key)
        .map_err(|e| corrupt(format!("key unwrap: {e}")))?;
    let compressed = symmetric::open(
        &key,
        &entry.ciphertext,
        &entry.nonce,
        Some(&entry.authentication_tag),
    )
    .map_err(|e| corrupt(format!("decrypt: {e}")))?;
    let json = compression::decompress_to_string(&compressed).map_err(|e| corrupt(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| corrupt(format!("file record: {e}")))
}

/// Decrypt every entry of a filedrop map, each on its own
pub fn decrypt_filedrop_map(
    filedrop: &BTreeMap<String, EncryptedFiledrop>,
    user_id: &str,
    private_key: &PrivateKey,
) -> Vec<(String, Result<DecryptedFile>)> {
    filedrop
        .iter()
        .map(|(token, entry)| {
            (
                token.clone(),
                decrypt_filedrop(token, entry, user_id, private_key),
            )
        })
        .collect()
}
