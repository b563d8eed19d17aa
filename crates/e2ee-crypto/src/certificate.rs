//! X.509 certificates carrying users' RSA public keys

use crate::{encoding, CryptoError, Result};
use der::{Decode, Encode};
use rsa::{pkcs8::DecodePublicKey, RsaPublicKey};
use x509_cert::{name::Name, serial_number::SerialNumber};

const PEM_LABEL: &str = "CERTIFICATE";

/// A parsed X.509 certificate
#[derive(Clone)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    pem: String,
}

impl Certificate {
    /// Parse a PEM certificate.
    ///
    /// Tolerates missing line breaks and trailing newlines, which older
    /// clients and servers are not consistent about.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = encoding::decode_armored(pem, PEM_LABEL)
            .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;
        let inner = x509_cert::Certificate::from_der(&der)?;
        Ok(Self {
            inner,
            pem: pem.to_string(),
        })
    }

    /// Parse a DER certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(der)?;
        Ok(Self {
            inner,
            pem: encoding::encode_armored(der, PEM_LABEL),
        })
    }

    /// The PEM text this certificate was parsed from
    pub fn to_pem(&self) -> &str {
        &self.pem
    }

    /// DER encoding
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    /// Extract the RSA public key
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let spki = self.inner.tbs_certificate.subject_public_key_info.to_der()?;
        RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| CryptoError::InvalidCertificate(format!("not an RSA public key: {}", e)))
    }

    /// Issuer distinguished name
    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// Serial number
    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.tbs_certificate.serial_number
    }

    /// Subject rendered as an RFC 4514 string
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// The underlying `x509-cert` structure
    pub fn as_x509(&self) -> &x509_cert::Certificate {
        &self.inner
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Certificate {}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate({})", self.subject())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_parse_fixture() {
        let cert = Certificate::from_pem(fixtures::ALICE_CERT).unwrap();
        assert!(cert.subject().contains("CN=alice"));
        assert!(cert.public_key().is_ok());
    }

    #[test]
    fn test_parse_without_line_breaks() {
        let flattened: String = fixtures::BOB_CERT
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect();
        let pem = format!("-----BEGIN CERTIFICATE-----{}-----END CERTIFICATE-----", flattened);
        let a = Certificate::from_pem(&pem).unwrap();
        let b = Certificate::from_pem(fixtures::BOB_CERT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_der_roundtrip() {
        let cert = Certificate::from_pem(fixtures::CAROL_CERT).unwrap();
        let der = cert.to_der().unwrap();
        assert_eq!(Certificate::from_der(&der).unwrap(), cert);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            Certificate::from_pem("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(CryptoError::InvalidCertificate(_))
        ));
    }
}
