//! Per-call verification state.

use ciborium::Value;

use crate::audit::{Audit, CeremonyKind};
use crate::authnr_data::AuthnrData;
use crate::client_data::ClientData;
use crate::error::{Result, VerifyError};
use crate::expectations::Expectations;

/// Everything one verification call reads and writes.
///
/// A context is created for a single call and owned by it; it is never shared.
/// `client_data` and `authnr_data` are filled either by
/// [`Ceremony::parse`](crate::Ceremony::parse) or by the caller's own parser.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    kind: CeremonyKind,
    /// The raw ceremony payload.
    pub request: Value,
    /// Caller expectations, unchecked.
    pub expectations: Option<serde_json::Value>,
    pub client_data: ClientData,
    pub authnr_data: AuthnrData,
    expected: Option<Expectations>,
    audit: Audit,
}

impl VerificationContext {
    pub fn new(kind: CeremonyKind, request: Value, expectations: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            request,
            expectations,
            client_data: ClientData::default(),
            authnr_data: AuthnrData::default(),
            expected: None,
            audit: Audit::new(),
        }
    }

    pub fn registration(request: Value, expectations: serde_json::Value) -> Self {
        Self::new(CeremonyKind::Registration, request, Some(expectations))
    }

    pub fn assertion(request: Value, expectations: serde_json::Value) -> Self {
        Self::new(CeremonyKind::Assertion, request, Some(expectations))
    }

    /// Supply parser output produced outside the engine.
    pub fn with_parsed(mut self, client_data: ClientData, authnr_data: AuthnrData) -> Self {
        self.client_data = client_data;
        self.authnr_data = authnr_data;
        self
    }

    pub fn kind(&self) -> CeremonyKind {
        self.kind
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }

    /// Typed expectations. Only available after the contract check passed.
    pub fn expected(&self) -> Result<&Expectations> {
        self.expected
            .as_ref()
            .ok_or_else(|| VerifyError::contract("expectations have not been validated"))
    }

    pub(crate) fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    pub(crate) fn set_expected(&mut self, expected: Expectations) {
        self.expected = Some(expected);
    }

    pub(crate) fn clear_expected(&mut self) {
        self.expected = None;
    }

    /// Fresh journal; typed expectations must be re-validated.
    pub(crate) fn reset(&mut self) {
        self.audit = Audit::new();
        self.expected = None;
    }
}
