//! Attestation statement formats.
//!
//! Each format is a [`FormatVerifier`] registered by name in a
//! [`FormatRegistry`]. The registry is built once at startup and shared by every
//! ceremony a [`Validator`](crate::Validator) runs.
//!
//! ## Built-in formats
//!
//! - `none` - no attestation statement, always passes
//! - `packed` - ES256 full (x5c) or self attestation (feature `packed`)

mod none;
#[cfg(feature = "packed")]
mod packed;

pub use none::NoneAttestation;
#[cfg(feature = "packed")]
pub use packed::PackedAttestation;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ciborium::Value;
use tracing::debug;

use crate::authnr_data::AuthnrData;
use crate::config::VerifierConfig;
use crate::error::Result;

/// Verifier for one attestation statement format.
///
/// Implementations must be thread-safe (`Send + Sync`) and own every
/// cryptographic check their format defines.
#[async_trait]
pub trait FormatVerifier: Send + Sync {
    /// The `fmt` value this verifier handles.
    fn name(&self) -> &'static str;

    /// Verify `att_stmt` against the parsed authenticator data.
    async fn verify(
        &self,
        att_stmt: &Value,
        authnr_data: &AuthnrData,
        client_data_hash: &[u8; 32],
    ) -> Result<()>;
}

/// Format name to verifier.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    verifiers: HashMap<String, Arc<dyn FormatVerifier>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.verifiers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FormatRegistry")
            .field("formats", &names)
            .finish()
    }
}

impl FormatRegistry {
    /// An empty registry. Even `none` must be registered explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// `none`, plus `packed` when the feature is built and the config allows it.
    pub fn with_defaults(config: &VerifierConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoneAttestation));

        #[cfg(feature = "packed")]
        if config.allow_packed {
            registry.register(Arc::new(PackedAttestation));
        }
        #[cfg(not(feature = "packed"))]
        let _ = config;

        registry
    }

    /// Add or replace the verifier for `verifier.name()`.
    pub fn register(&mut self, verifier: Arc<dyn FormatVerifier>) {
        debug!(format = verifier.name(), "Registered attestation format");
        self.verifiers.insert(verifier.name().to_string(), verifier);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FormatVerifier>> {
        self.verifiers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.verifiers.contains_key(name)
    }

    /// Registered format names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.verifiers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerifyError;

    struct RejectAll;

    #[async_trait]
    impl FormatVerifier for RejectAll {
        fn name(&self) -> &'static str {
            "reject-all"
        }

        async fn verify(&self, _: &Value, _: &AuthnrData, _: &[u8; 32]) -> Result<()> {
            Err(VerifyError::crypto("rejected"))
        }
    }

    #[test]
    fn test_defaults_include_none() {
        let registry = FormatRegistry::with_defaults(&VerifierConfig::default());
        assert!(registry.contains("none"));
        assert_eq!(registry.contains("packed"), cfg!(feature = "packed"));
        assert!(!registry.contains("asdf"));
    }

    #[test]
    fn test_packed_can_be_disabled() {
        let config = VerifierConfig {
            allow_packed: false,
            ..VerifierConfig::default()
        };
        let registry = FormatRegistry::with_defaults(&config);
        assert_eq!(registry.formats(), vec!["none"]);
    }

    #[tokio::test]
    async fn test_register_custom_format() {
        let mut registry = FormatRegistry::new();
        assert!(registry.get("none").is_none());

        registry.register(Arc::new(RejectAll));
        let verifier = registry.get("reject-all").unwrap();
        let err = verifier
            .verify(&Value::Map(vec![]), &AuthnrData::default(), &[0u8; 32])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CRYPTO_ERROR");
    }
}
