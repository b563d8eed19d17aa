//! Fixed RSA-2048 key pairs and self-signed certificates for tests
//!
//! Generating RSA keys is slow, so tests across the workspace share these.
//! Never use them outside tests.

use crate::keys::UserKeyPair;

/// Alice's certificate (PEM)
pub const ALICE_CERT: &str = include_str!("../../../testdata/alice.crt");
/// Alice's private key (bare base64 PKCS#8)
pub const ALICE_KEY: &str = include_str!("../../../testdata/alice.key");

/// Bob's certificate (PEM)
pub const BOB_CERT: &str = include_str!("../../../testdata/bob.crt");
/// Bob's private key (bare base64 PKCS#8)
pub const BOB_KEY: &str = include_str!("../../../testdata/bob.key");

/// Carol's certificate (PEM)
pub const CAROL_CERT: &str = include_str!("../../../testdata/carol.crt");
/// Carol's private key (bare base64 PKCS#8)
pub const CAROL_KEY: &str = include_str!("../../../testdata/carol.key");

/// Alice's key pair
pub fn alice() -> UserKeyPair {
    load(ALICE_KEY, ALICE_CERT)
}

/// Bob's key pair
pub fn bob() -> UserKeyPair {
    load(BOB_KEY, BOB_CERT)
}

/// Carol's key pair
pub fn carol() -> UserKeyPair {
    load(CAROL_KEY, CAROL_CERT)
}

#[allow(clippy::expect_used)]
fn load(key: &str, cert: &str) -> UserKeyPair {
    UserKeyPair::from_strings(key, cert).expect("fixture key pair is valid")
}
