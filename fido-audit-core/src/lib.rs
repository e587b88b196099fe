//! fido-audit core - WebAuthn/FIDO2 ceremony verification with a completeness audit
//!
//! This crate decides whether a registration (attestation) or authentication
//! (assertion) response is valid against a relying party's expectations, and
//! records exactly which checks ran. A ceremony is only reported complete when
//! the audit finalizer confirms every required field validator finished.
//!
//! # Features
//!
//! - Expectation contract with exact key cardinality
//! - Per-field client-data and authenticator-data validators
//! - Pluggable attestation formats (`none` built in, `packed` behind a feature)
//! - ES256 assertion signature verification
//! - Audit journal that fails closed on skipped or unexpected checks
//!
//! # Example
//!
//! ```no_run
//! use fido_audit_core::{Validator, VerificationContext};
//! use serde_json::json;
//!
//! # async fn example(request: ciborium::Value) -> fido_audit_core::Result<()> {
//! let validator = Validator::default();
//! let expectations = json!({
//!     "origin": "https://localhost:8443",
//!     "challenge": "33EHav-jZ1v9qwH783aU-j0ARx6r5o-YHh-wd7C6jPbd7Wh6ytbIZosIIACehwf9-s6hXhySHO-HHUjEwZS29w",
//!     "flags": ["UP-or-UV", "AT"],
//! });
//!
//! let ctx = validator
//!     .verify_registration(VerificationContext::registration(request, expectations))
//!     .await?;
//! assert!(ctx.audit().is_complete());
//!
//! // Persist these for later assertions.
//! let _cred_id = &ctx.authnr_data.cred_id;
//! let _public_key = &ctx.authnr_data.credential_public_key_pem;
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod audit;
pub mod authnr_data;
pub mod client_data;
pub mod config;
pub mod context;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod expectations;
pub mod parser;
pub mod request;
pub mod validator;

// Re-export main types for convenience
pub use attestation::{FormatRegistry, FormatVerifier, NoneAttestation};
#[cfg(feature = "packed")]
pub use attestation::PackedAttestation;
pub use audit::{Audit, CeremonyKind, Field};
pub use authnr_data::{AuthenticatorFlags, AuthnrData, Flag};
pub use client_data::{ClientData, ExactOrigin, OriginCheck};
pub use config::{RfuPolicy, VerifierConfig};
pub use context::VerificationContext;
pub use crypto::{CoseEc2Key, Jwk};
pub use error::{Result, VerifyError};
pub use expectations::{ExpectationKey, ExpectedFlag, Expectations};
pub use validator::{Ceremony, Validator};
