//! Completeness-auditing journal.
//!
//! The journal records which field validators actually finished. The finalizer
//! ([`Audit::finalize`]) is the only place that can flip `complete` to true, and it
//! refuses to do so unless every field the ceremony type requires is present.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VerifyError};

/// Which ceremony a context is verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    /// `navigator.credentials.create()` (attestation)
    Registration,
    /// `navigator.credentials.get()` (assertion)
    Assertion,
}

const REGISTRATION_FIELDS: &[Field] = &[
    Field::RawClientDataJson,
    Field::Origin,
    Field::Type,
    Field::Challenge,
    Field::TokenBinding,
    Field::Id,
    Field::RawAuthnrData,
    Field::RpIdHash,
    Field::Flags,
    Field::Counter,
    Field::Aaguid,
    Field::CredId,
    Field::CredIdLen,
    Field::CredentialPublicKeyCose,
    Field::CredentialPublicKeyJwk,
    Field::CredentialPublicKeyPem,
    Field::Fmt,
];

const ASSERTION_FIELDS: &[Field] = &[
    Field::RawClientDataJson,
    Field::Origin,
    Field::Type,
    Field::Challenge,
    Field::TokenBinding,
    Field::Id,
    Field::RawAuthnrData,
    Field::RpIdHash,
    Field::Flags,
    Field::Counter,
    Field::UserHandle,
    Field::Signature,
];

impl CeremonyKind {
    /// Every field that must be journaled before the audit can pass.
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            Self::Registration => REGISTRATION_FIELDS,
            Self::Assertion => ASSERTION_FIELDS,
        }
    }
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Assertion => write!(f, "assertion"),
        }
    }
}

/// Names of the fields a validator can journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    RawClientDataJson,
    Origin,
    Type,
    Challenge,
    TokenBinding,
    Id,
    RawAuthnrData,
    Fmt,
    RpIdHash,
    Aaguid,
    CredId,
    CredIdLen,
    CredentialPublicKeyCose,
    CredentialPublicKeyJwk,
    CredentialPublicKeyPem,
    Flags,
    Counter,
    UserHandle,
    Signature,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RawClientDataJson => "rawClientDataJson",
            Self::Origin => "origin",
            Self::Type => "type",
            Self::Challenge => "challenge",
            Self::TokenBinding => "tokenBinding",
            Self::Id => "id",
            Self::RawAuthnrData => "rawAuthnrData",
            Self::Fmt => "fmt",
            Self::RpIdHash => "rpIdHash",
            Self::Aaguid => "aaguid",
            Self::CredId => "credId",
            Self::CredIdLen => "credIdLen",
            Self::CredentialPublicKeyCose => "credentialPublicKeyCose",
            Self::CredentialPublicKeyJwk => "credentialPublicKeyJwk",
            Self::CredentialPublicKeyPem => "credentialPublicKeyPem",
            Self::Flags => "flags",
            Self::Counter => "counter",
            Self::UserHandle => "userHandle",
            Self::Signature => "signature",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The audit record for one verification call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    journal: BTreeSet<Field>,
    valid_expectations: bool,
    valid_request: bool,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    finalized_at: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields whose validators have completed.
    pub fn journal(&self) -> &BTreeSet<Field> {
        &self.journal
    }

    pub fn has(&self, field: Field) -> bool {
        self.journal.contains(&field)
    }

    pub fn valid_expectations(&self) -> bool {
        self.valid_expectations
    }

    pub fn valid_request(&self) -> bool {
        self.valid_request
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// When the finalizer last passed.
    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Record a field as validated. Recording twice is a no-op.
    pub(crate) fn record(&mut self, field: Field) {
        if self.journal.insert(field) {
            debug!(field = %field, "Field validated");
        }
    }

    pub(crate) fn mark_expectations_valid(&mut self) {
        self.valid_expectations = true;
    }

    pub(crate) fn clear_expectations_valid(&mut self) {
        self.valid_expectations = false;
    }

    pub(crate) fn mark_request_valid(&mut self) {
        self.valid_request = true;
    }

    /// Cross-check the journal against what `kind` requires.
    ///
    /// `complete` is cleared first so a failed re-run never leaves a stale `true`.
    pub(crate) fn finalize(&mut self, kind: CeremonyKind) -> Result<bool> {
        self.complete = false;
        self.finalized_at = None;

        let required = kind.required_fields();

        if let Some(missing) = required.iter().find(|f| !self.journal.contains(f)) {
            return Err(VerifyError::internal_audit(format!(
                "{missing} was not validated"
            )));
        }

        if let Some(extra) = self.journal.iter().find(|f| !required.contains(f)) {
            return Err(VerifyError::internal_audit(format!(
                "unexpected journal entry: {extra}"
            )));
        }

        if !self.valid_expectations {
            return Err(VerifyError::internal_audit(
                "expectations were not validated",
            ));
        }

        if !self.valid_request {
            return Err(VerifyError::internal_audit("request was not validated"));
        }

        self.complete = true;
        self.finalized_at = Some(Utc::now());
        Ok(true)
    }
}
