//! Integrity checks on freshly decrypted metadata
//!
//! Three guards run in order:
//! 1. the counter must not go backwards
//! 2. the detached signature must verify under an authorized certificate
//! 3. the key the body was decrypted with must have a recorded checksum

use crate::{
    codec,
    config::SignaturePolicy,
    types::{DecryptedFolderMetadataFile, DecryptedUser, EncryptedFolderMetadataFile},
    MetadataError, Result,
};
use e2ee_crypto::{hash_metadata_key, signing, Certificate};
use tracing::{debug, error};

/// Run all integrity checks.
///
/// `authorized` are the users whose certificates may have produced the
/// signature: the document's own users for a top folder, the top-most
/// ancestor's users for a subfolder.
pub fn verify_metadata(
    encrypted: &EncryptedFolderMetadataFile,
    decrypted: &DecryptedFolderMetadataFile,
    old_counter: Option<u64>,
    signature: Option<&str>,
    authorized: &[DecryptedUser],
    policy: SignaturePolicy,
) -> Result<()> {
    check_counter(decrypted, old_counter)?;
    if policy == SignaturePolicy::Enforce {
        check_signature(encrypted, signature, authorized)?;
    }
    check_key_checksum(decrypted)?;
    debug!(counter = decrypted.metadata.counter, "metadata verified");
    Ok(())
}

/// Fail if the counter is older than the last accepted one
pub fn check_counter(decrypted: &DecryptedFolderMetadataFile, old_counter: Option<u64>) -> Result<()> {
    match old_counter {
        Some(expected) if decrypted.metadata.counter < expected => {
            error!(expected, received = decrypted.metadata.counter, "metadata counter went backwards");
            Err(MetadataError::StaleMetadata {
                expected,
                received: decrypted.metadata.counter,
            })
        }
        _ => Ok(()),
    }
}

/// Verify the detached signature against any authorized user's certificate
pub fn check_signature(
    encrypted: &EncryptedFolderMetadataFile,
    signature: Option<&str>,
    authorized: &[DecryptedUser],
) -> Result<()> {
    let Some(signature) = signature.filter(|s| !s.is_empty()) else {
        error!("metadata has no signature");
        return Err(MetadataError::SignatureInvalid);
    };
    let certificates: Vec<Certificate> = authorized
        .iter()
        .filter_map(|user| user.parse_certificate().ok())
        .collect();
    let payload = codec::signing_payload(encrypted)?;
    signing::verify_detached(signature, payload.as_bytes(), &certificates).map_err(|_| {
        error!(candidates = certificates.len(), "metadata signature did not verify");
        MetadataError::SignatureInvalid
    })
}

/// Fail if the current key's checksum was never recorded
pub fn check_key_checksum(decrypted: &DecryptedFolderMetadataFile) -> Result<()> {
    let checksum = decrypted
        .metadata
        .metadata_key
        .as_ref()
        .map(hash_metadata_key)
        .unwrap_or_default();
    if decrypted.metadata.key_checksums.contains(&checksum) {
        Ok(())
    } else {
        error!(%checksum, "metadata key checksum not recognized");
        Err(MetadataError::KeyNotRecognized { checksum })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::encrypt_metadata, key_hierarchy::encrypt_user};
    use e2ee_crypto::{fixtures, MetadataKey};
    use rstest::rstest;

    fn fixture() -> (EncryptedFolderMetadataFile, DecryptedFolderMetadataFile) {
        let mut doc = DecryptedFolderMetadataFile::new_top_folder("alice", fixtures::ALICE_CERT);
        doc.metadata.counter = 5;
        let key = doc.metadata_key().cloned().unwrap();
        let encrypted = EncryptedFolderMetadataFile {
            metadata: encrypt_metadata(&doc.metadata, &key, "2.0").unwrap(),
            users: doc.users().iter().map(|u| encrypt_user(u, &key).unwrap()).collect(),
            filedrop: Default::default(),
        };
        (encrypted, doc)
    }

    fn sign(encrypted: &EncryptedFolderMetadataFile, pair: &e2ee_crypto::UserKeyPair) -> String {
        let payload = codec::signing_payload(encrypted).unwrap();
        signing::sign_detached(pair.certificate(), pair.private_key(), payload.as_bytes()).unwrap()
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(4), true)]
    #[case(Some(5), true)]
    #[case(Some(6), false)]
    fn test_counter_monotonicity(#[case] old: Option<u64>, #[case] ok: bool) {
        let (_, doc) = fixture();
        assert_eq!(check_counter(&doc, old).is_ok(), ok);
    }

    #[test]
    fn test_valid_signature_accepted() {
        let (encrypted, doc) = fixture();
        let signature = sign(&encrypted, &fixtures::alice());
        verify_metadata(
            &encrypted,
            &doc,
            Some(5),
            Some(&signature),
            doc.users(),
            SignaturePolicy::Enforce,
        )
        .unwrap();
    }

    #[test]
    fn test_signature_from_unauthorized_user_rejected() {
        let (encrypted, doc) = fixture();
        let signature = sign(&encrypted, &fixtures::carol());
        let result = verify_metadata(
            &encrypted,
            &doc,
            None,
            Some(&signature),
            doc.users(),
            SignaturePolicy::Enforce,
        );
        assert!(matches!(result, Err(MetadataError::SignatureInvalid)));
    }

    #[test]
    fn test_missing_signature() {
        let (encrypted, doc) = fixture();
        let enforced = verify_metadata(&encrypted, &doc, None, None, doc.users(), SignaturePolicy::Enforce);
        assert!(matches!(enforced, Err(MetadataError::SignatureInvalid)));

        verify_metadata(&encrypted, &doc, None, None, doc.users(), SignaturePolicy::Skip).unwrap();
    }

    #[test]
    fn test_signature_over_other_document_rejected() {
        let (encrypted, doc) = fixture();
        let (other, _) = fixture();
        let signature = sign(&other, &fixtures::alice());
        assert!(check_signature(&encrypted, Some(&signature), doc.users()).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let (_, mut doc) = fixture();
        doc.metadata.metadata_key = Some(MetadataKey::generate());
        assert!(matches!(
            check_key_checksum(&doc),
            Err(MetadataError::KeyNotRecognized { .. })
        ));
    }

    #[test]
    fn test_missing_key_rejected() {
        let doc = DecryptedFolderMetadataFile::new_subfolder();
        assert!(check_key_checksum(&doc).is_err());
    }
}
