//! Metadata key wrapping and rotation
//!
//! Each top-level encrypted folder has one symmetric metadata key. It is
//! wrapped for every sharee with the public key in their certificate; the
//! checksum of every key ever issued stays in `keyChecksums`.

use crate::{
    types::{DecryptedMetadata, DecryptedUser, EncryptedUser},
    MetadataError, Result,
};
use e2ee_crypto::{hash_metadata_key, Decryptor, Encryptor, MetadataKey, PrivateKey};

/// Wrap the metadata key for one user
pub fn encrypt_user(user: &DecryptedUser, metadata_key: &MetadataKey) -> Result<EncryptedUser> {
    let certificate = user.parse_certificate()?;
    let encrypted_metadata_key = Encryptor::new(&certificate)?.encrypt_key(metadata_key)?;
    Ok(EncryptedUser {
        user_id: user.user_id.clone(),
        certificate: user.certificate.clone(),
        encrypted_metadata_key,
    })
}

/// Drop the wrapped key from a user record
pub fn transform_user(user: &EncryptedUser) -> DecryptedUser {
    DecryptedUser::new(user.user_id.clone(), user.certificate.clone())
}

/// Unwrap the metadata key with the caller's private key
pub fn decrypt_metadata_key(user: &EncryptedUser, private_key: &PrivateKey) -> Result<MetadataKey> {
    Decryptor::new(private_key)
        .decrypt_key(&user.encrypted_metadata_key)
        .map_err(MetadataError::KeyUnwrap)
}

/// Find the record for `user_id`
pub fn find_user<'a>(users: &'a [EncryptedUser], user_id: &str) -> Result<&'a EncryptedUser> {
    users
        .iter()
        .find(|u| u.user_id == user_id)
        .ok_or_else(|| MetadataError::UserNotAuthorized {
            user_id: user_id.to_string(),
        })
}

/// Replace the metadata key with a fresh one and record its checksum.
///
/// Existing checksums are kept.
pub fn rotate(metadata: &mut DecryptedMetadata) -> MetadataKey {
    let key = MetadataKey::generate();
    metadata.add_key_checksum(hash_metadata_key(&key));
    metadata.metadata_key = Some(key.clone());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2ee_crypto::fixtures;

    fn alice_user() -> DecryptedUser {
        DecryptedUser::new("alice", fixtures::ALICE_CERT)
    }

    #[test]
    fn test_encrypt_decrypt_user() {
        let alice = fixtures::alice();
        let key = MetadataKey::generate();

        let encrypted = encrypt_user(&alice_user(), &key).unwrap();
        assert_eq!(encrypted.user_id, "alice");
        assert_eq!(transform_user(&encrypted), alice_user());

        let unwrapped = decrypt_metadata_key(&encrypted, alice.private_key()).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn test_wrong_private_key_is_unwrap_error() {
        let bob = fixtures::bob();
        let encrypted = encrypt_user(&alice_user(), &MetadataKey::generate()).unwrap();
        assert!(matches!(
            decrypt_metadata_key(&encrypted, bob.private_key()),
            Err(MetadataError::KeyUnwrap(_))
        ));
    }

    #[test]
    fn test_find_user() {
        let encrypted = encrypt_user(&alice_user(), &MetadataKey::generate()).unwrap();
        let users = vec![encrypted];
        assert!(find_user(&users, "alice").is_ok());
        assert!(matches!(
            find_user(&users, "mallory"),
            Err(MetadataError::UserNotAuthorized { .. })
        ));
    }

    #[test]
    fn test_rotate_keeps_old_checksums() {
        let mut metadata = DecryptedMetadata::default();
        let first = rotate(&mut metadata);
        let second = rotate(&mut metadata);

        assert_ne!(first, second);
        assert_eq!(metadata.key_checksums.len(), 2);
        assert_eq!(metadata.key_checksums[0], hash_metadata_key(&first));
        assert_eq!(metadata.metadata_key, Some(second));
    }
}
