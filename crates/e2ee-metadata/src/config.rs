//! Engine configuration

use serde::{Deserialize, Serialize};

/// Version string written into every encrypted document
pub const METADATA_VERSION: &str = "2.0";

/// What to do with metadata signatures on decrypt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePolicy {
    /// Reject documents whose signature no authorized user's certificate verifies
    #[default]
    Enforce,
    /// Do not check signatures
    Skip,
}

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Signature verification policy
    pub signature_policy: SignaturePolicy,
    /// Upload migrated metadata immediately after a v1 document is read
    pub upload_after_migration: bool,
    /// Re-upload folders whose filedrop entries were merged on decrypt
    pub drain_filedrop: bool,
    /// Mnemonic enabling the legacy folder checksum check
    pub mnemonic: Option<String>,
    /// Version string written on encrypt
    pub metadata_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signature_policy: SignaturePolicy::Enforce,
            upload_after_migration: true,
            drain_filedrop: true,
            mnemonic: None,
            metadata_version: METADATA_VERSION.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signature policy
    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.signature_policy = policy;
        self
    }

    /// Enable or disable uploading right after migration
    pub fn with_upload_after_migration(mut self, enabled: bool) -> Self {
        self.upload_after_migration = enabled;
        self
    }

    /// Enable or disable draining filedrop entries
    pub fn with_drain_filedrop(mut self, enabled: bool) -> Self {
        self.drain_filedrop = enabled;
        self
    }

    /// Set the mnemonic for legacy checksum verification
    pub fn with_mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.mnemonic = Some(mnemonic.into());
        self
    }

    /// Whether signatures are checked
    pub fn enforces_signatures(&self) -> bool {
        self.signature_policy == SignaturePolicy::Enforce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.enforces_signatures());
        assert!(config.upload_after_migration);
        assert!(config.drain_filedrop);
        assert_eq!(config.metadata_version, "2.0");
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_signature_policy(SignaturePolicy::Skip)
            .with_mnemonic("a b c");
        assert!(!config.enforces_signatures());
        assert_eq!(config.mnemonic.as_deref(), Some("a b c"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"signaturePolicy":"skip","drainFiledrop":false}"#).unwrap();
        assert_eq!(config.signature_policy, SignaturePolicy::Skip);
        assert!(!config.drain_filedrop);
        assert!(config.upload_after_migration);
    }
}
