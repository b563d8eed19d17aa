//! CMS signed-data signatures
//!
//! Metadata documents are signed with the uploader's RSA key. The signature
//! is a DER `ContentInfo` wrapping `SignedData` with:
//! - a SHA-256 digest and an RSA PKCS#1 v1.5 signature
//! - the signer identified by issuer and serial number
//! - the signer's certificate embedded
//! - signed attributes (content type, message digest, signing time)
//!
//! Metadata signatures are detached: the signed bytes travel separately
//! and are supplied again on verification.

use crate::{certificate::Certificate, encoding, hashing, keys::PrivateKey, CryptoError, Result};
use cms::{
    builder::{SignedDataBuilder, SignerInfoBuilder},
    cert::{CertificateChoices, IssuerAndSerialNumber},
    content_info::ContentInfo,
    signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo},
};
use const_oid::db::{rfc5911, rfc5912};
use der::{asn1::OctetString, Any, Decode, Encode, Tag, Tagged};
use rsa::{
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    signature::Verifier,
};
use sha2::Sha256;
use spki::AlgorithmIdentifierOwned;

/// Sign `data` without embedding it, returning base64 DER
pub fn sign_detached(certificate: &Certificate, private_key: &PrivateKey, data: &[u8]) -> Result<String> {
    let content = EncapsulatedContentInfo {
        econtent_type: rfc5911::ID_DATA,
        econtent: None,
    };
    let digest = hashing::sha256(data);
    build_signed_data(certificate, private_key, &content, Some(digest.as_bytes()))
}

/// Sign `data` and embed it in the signed-data structure, returning base64 DER
pub fn sign_message(certificate: &Certificate, private_key: &PrivateKey, data: &[u8]) -> Result<String> {
    let econtent = Any::new(Tag::OctetString, data.to_vec())?;
    let content = EncapsulatedContentInfo {
        econtent_type: rfc5911::ID_DATA,
        econtent: Some(econtent),
    };
    build_signed_data(certificate, private_key, &content, None)
}

/// Verify a detached signature over `data`.
///
/// Succeeds when any signer info verifies under any of `certificates`.
pub fn verify_detached<'a, I>(signature_b64: &str, data: &[u8], certificates: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Certificate>,
{
    let signed_data = parse_signed_data(signature_b64)?;
    let candidates: Vec<&Certificate> = certificates.into_iter().collect();
    verify_any(&signed_data, data, &candidates)
}

/// Verify a signature with embedded content and return that content
pub fn verify_signed_message(signature_b64: &str, certificate: &Certificate) -> Result<Vec<u8>> {
    let signed_data = parse_signed_data(signature_b64)?;
    let content = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .ok_or_else(|| CryptoError::InvalidCiphertext("signed data carries no content".into()))?;
    let content = content.decode_as::<OctetString>()?.as_bytes().to_vec();
    verify_any(&signed_data, &content, &[certificate])?;
    Ok(content)
}

/// Certificates embedded in a signature
pub fn embedded_certificates(signature_b64: &str) -> Result<Vec<Certificate>> {
    let signed_data = parse_signed_data(signature_b64)?;
    let mut certificates = Vec::new();
    if let Some(set) = signed_data.certificates.as_ref() {
        for choice in set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                certificates.push(Certificate::from_der(&cert.to_der()?)?);
            }
        }
    }
    Ok(certificates)
}

fn build_signed_data(
    certificate: &Certificate,
    private_key: &PrivateKey,
    content: &EncapsulatedContentInfo,
    external_digest: Option<&[u8]>,
) -> Result<String> {
    let signer = SigningKey::<Sha256>::new(private_key.as_rsa().clone());
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.issuer().clone(),
        serial_number: certificate.serial_number().clone(),
    });

    let signer_info = SignerInfoBuilder::new(&signer, sid, sha256_algorithm(), content, external_digest)
        .map_err(|e| CryptoError::Signing(format!("{e:?}")))?;

    let content_info = SignedDataBuilder::new(content)
        .add_digest_algorithm(sha256_algorithm())
        .map_err(|e| CryptoError::Signing(format!("{e:?}")))?
        .add_certificate(CertificateChoices::Certificate(certificate.as_x509().clone()))
        .map_err(|e| CryptoError::Signing(format!("{e:?}")))?
        .add_signer_info::<SigningKey<Sha256>, Signature>(signer_info)
        .map_err(|e| CryptoError::Signing(format!("{e:?}")))?
        .build()
        .map_err(|e| CryptoError::Signing(format!("{e:?}")))?;

    Ok(encoding::encode(content_info.to_der()?))
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: rfc5912::ID_SHA_256,
        parameters: None,
    }
}

fn parse_signed_data(signature_b64: &str) -> Result<SignedData> {
    let der = encoding::decode(signature_b64)?;
    let content_info = ContentInfo::from_der(&der).map_err(|_| CryptoError::SignatureVerification)?;
    if content_info.content_type != rfc5911::ID_SIGNED_DATA {
        return Err(CryptoError::SignatureVerification);
    }
    content_info
        .content
        .decode_as::<SignedData>()
        .map_err(|_| CryptoError::SignatureVerification)
}

fn verify_any(signed_data: &SignedData, data: &[u8], certificates: &[&Certificate]) -> Result<()> {
    let digest = hashing::sha256(data);
    for signer_info in signed_data.signer_infos.0.iter() {
        for certificate in certificates {
            if verify_signer_info(signer_info, data, digest.as_bytes(), certificate) {
                return Ok(());
            }
        }
    }
    Err(CryptoError::SignatureVerification)
}

fn verify_signer_info(
    signer_info: &SignerInfo,
    data: &[u8],
    digest: &[u8],
    certificate: &Certificate,
) -> bool {
    if signer_info.digest_alg.oid != rfc5912::ID_SHA_256 {
        return false;
    }
    let Ok(public_key) = certificate.public_key() else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signer_info.signature.as_bytes()) else {
        return false;
    };

    // With signed attributes the signature covers their DER SET encoding,
    // and the message-digest attribute binds the content.
    let signed_bytes = match signer_info.signed_attrs.as_ref() {
        Some(attrs) => {
            let digest_matches = attrs
                .iter()
                .filter(|attr| attr.oid == rfc5911::ID_MESSAGE_DIGEST)
                .flat_map(|attr| attr.values.iter())
                .any(|value| value.tag() == Tag::OctetString && value.value() == digest);
            if !digest_matches {
                return false;
            }
            match attrs.to_der() {
                Ok(der) => der,
                Err(_) => return false,
            }
        }
        None => data.to_vec(),
    };

    VerifyingKey::<Sha256>::new(public_key)
        .verify(&signed_bytes, &signature)
        .is_ok()
}
