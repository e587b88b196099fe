//! Verifier configuration
//!
//! Engine policy knobs, loaded from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};

/// What to do when reserved-for-future-use flag bits are set in authenticator data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfuPolicy {
    /// Accept the bits. Current authenticators use 0x08/0x10 for backup state.
    #[default]
    Ignore,
    /// Fail the flags check if any RFU bit is set.
    Reject,
}

/// Verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// RFU flag handling (default: ignore)
    pub rfu_policy: RfuPolicy,
    /// Register the `packed` attestation verifier (default: true when the feature is built)
    pub allow_packed: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            rfu_policy: RfuPolicy::Ignore,
            allow_packed: cfg!(feature = "packed"),
        }
    }
}

impl VerifierConfig {
    /// Load configuration from environment variables
    ///
    /// - `FIDO_AUDIT_REJECT_RFU_FLAGS=true` switches to [`RfuPolicy::Reject`]
    /// - `FIDO_AUDIT_DISABLE_PACKED=true` leaves `packed` out of the default registry
    pub fn from_env() -> Self {
        let rfu_policy = std::env::var("FIDO_AUDIT_REJECT_RFU_FLAGS")
            .ok()
            .map(|v| {
                if parse_bool(&v) {
                    RfuPolicy::Reject
                } else {
                    RfuPolicy::Ignore
                }
            })
            .unwrap_or_default();

        let disable_packed = std::env::var("FIDO_AUDIT_DISABLE_PACKED")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Self {
            rfu_policy,
            allow_packed: cfg!(feature = "packed") && !disable_packed,
        }
    }

    pub fn with_rfu_policy(mut self, policy: RfuPolicy) -> Self {
        self.rfu_policy = policy;
        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
