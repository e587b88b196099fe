//! Validator set, ceremony handle and orchestrated flows.
//!
//! A [`Validator`] is built once (format registry, origin hook, config) and is
//! stateless across calls. [`Validator::attach`] binds it to one
//! [`VerificationContext`] and hands back a [`Ceremony`] exposing every named
//! field check. Each check either journals its field and returns `Ok(true)`, or
//! fails and journals nothing.
//!
//! ```no_run
//! use fido_audit_core::{Validator, VerificationContext};
//!
//! # async fn example(request: ciborium::Value, expectations: serde_json::Value)
//! #     -> fido_audit_core::Result<()> {
//! let validator = Validator::default();
//! let ctx = validator
//!     .verify_registration(VerificationContext::registration(request, expectations))
//!     .await?;
//! assert!(ctx.audit().is_complete());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::attestation::{FormatRegistry, FormatVerifier};
use crate::audit::{Audit, CeremonyKind, Field};
use crate::authnr_data;
use crate::client_data::{self, ExactOrigin, OriginCheck, TYPE_CREATE, TYPE_GET};
use crate::config::VerifierConfig;
use crate::context::VerificationContext;
use crate::crypto::{sha256, verify_es256, verifying_key_from_pem};
use crate::error::{Result, VerifyError};
use crate::expectations::validate_expectations;
use crate::parser;
use crate::request::validate_request_shape;

/// The validator set shared by every ceremony.
#[derive(Clone)]
pub struct Validator {
    registry: FormatRegistry,
    origin_check: Arc<dyn OriginCheck>,
    config: VerifierConfig,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl Validator {
    /// Default formats for `config`, exact origin matching.
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            registry: FormatRegistry::with_defaults(&config),
            origin_check: Arc::new(ExactOrigin),
            config,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::new(VerifierConfig::from_env())
    }

    /// Replace the `checkOrigin` hook.
    pub fn with_origin_check(mut self, check: impl OriginCheck + 'static) -> Self {
        self.origin_check = Arc::new(check);
        self
    }

    /// Register an additional attestation format.
    pub fn with_format(mut self, verifier: Arc<dyn FormatVerifier>) -> Self {
        self.registry.register(verifier);
        self
    }

    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Bind the validator set to `ctx` with a fresh journal.
    pub fn attach(&self, mut ctx: VerificationContext) -> Ceremony<'_> {
        ctx.reset();
        Ceremony {
            validator: self,
            ctx,
        }
    }

    /// Run every registration check and finalize the audit.
    ///
    /// Returns the context so callers can persist the credential id, public key
    /// and counter it carries.
    #[instrument(skip_all, fields(kind = "registration"))]
    pub async fn verify_registration(&self, ctx: VerificationContext) -> Result<VerificationContext> {
        let mut ceremony = self.attach(ctx);
        let outcome = ceremony.run_registration().await;
        finish(ceremony, outcome)
    }

    /// Run every assertion check and finalize the audit.
    #[instrument(skip_all, fields(kind = "assertion"))]
    pub async fn verify_assertion(&self, ctx: VerificationContext) -> Result<VerificationContext> {
        let mut ceremony = self.attach(ctx);
        let outcome = ceremony.run_assertion().await;
        finish(ceremony, outcome)
    }
}

fn finish(ceremony: Ceremony<'_>, outcome: Result<bool>) -> Result<VerificationContext> {
    match outcome {
        Ok(_) => {
            info!(
                journaled = ceremony.audit().journal().len(),
                "Ceremony verified"
            );
            Ok(ceremony.into_context())
        }
        Err(e) => {
            warn!(
                code = e.code(),
                error = %e,
                journaled = ceremony.audit().journal().len(),
                "Ceremony rejected"
            );
            Err(e)
        }
    }
}

/// A validator set attached to one context.
pub struct Ceremony<'v> {
    validator: &'v Validator,
    ctx: VerificationContext,
}

impl<'v> Ceremony<'v> {
    pub fn context(&self) -> &VerificationContext {
        &self.ctx
    }

    /// Mutable access, e.g. to substitute parser output.
    pub fn context_mut(&mut self) -> &mut VerificationContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> VerificationContext {
        self.ctx
    }

    pub fn audit(&self) -> &Audit {
        self.ctx.audit()
    }

    fn journal(&mut self, field: Field) -> Result<bool> {
        self.ctx.audit_mut().record(field);
        Ok(true)
    }

    fn require_kind(&self, kind: CeremonyKind, check: &str) -> Result<()> {
        if self.ctx.kind() != kind {
            return Err(VerifyError::contract(format!(
                "{check} is not part of the {} ceremony",
                self.ctx.kind()
            )));
        }
        Ok(())
    }

    // ---- contract and shape ----

    /// A failed re-run revokes any earlier pass.
    pub fn validate_expectations(&mut self) -> Result<bool> {
        match validate_expectations(self.ctx.kind(), self.ctx.expectations.as_ref()) {
            Ok(expected) => {
                self.ctx.set_expected(expected);
                self.ctx.audit_mut().mark_expectations_valid();
                debug!("Expectations validated");
                Ok(true)
            }
            Err(e) => {
                self.ctx.clear_expected();
                self.ctx.audit_mut().clear_expectations_valid();
                Err(e)
            }
        }
    }

    pub fn validate_create_request(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateCreateRequest")?;
        validate_request_shape(CeremonyKind::Registration, &self.ctx.request)?;
        self.ctx.audit_mut().mark_request_valid();
        Ok(true)
    }

    pub fn validate_assertion_response(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Assertion, "validateAssertionResponse")?;
        validate_request_shape(CeremonyKind::Assertion, &self.ctx.request)?;
        self.ctx.audit_mut().mark_request_valid();
        Ok(true)
    }

    /// Decode the request with the built-in parser.
    pub fn parse(&mut self) -> Result<()> {
        let (client_data, authnr_data) = match self.ctx.kind() {
            CeremonyKind::Registration => parser::parse_create_request(&self.ctx.request)?,
            CeremonyKind::Assertion => parser::parse_assertion_response(&self.ctx.request)?,
        };
        self.ctx.client_data = client_data;
        self.ctx.authnr_data = authnr_data;
        Ok(())
    }

    // ---- client data ----

    pub fn validate_raw_client_data_json(&mut self) -> Result<bool> {
        client_data::check_raw(&self.ctx.client_data)?;
        self.journal(Field::RawClientDataJson)
    }

    pub fn validate_id(&mut self) -> Result<bool> {
        client_data::check_id(&self.ctx.client_data)?;
        self.journal(Field::Id)
    }

    pub fn validate_origin(&mut self) -> Result<bool> {
        client_data::check_origin(
            &self.ctx.client_data,
            self.ctx.expected()?,
            self.validator.origin_check.as_ref(),
        )?;
        self.journal(Field::Origin)
    }

    pub fn validate_create_type(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateCreateType")?;
        client_data::check_type(&self.ctx.client_data, TYPE_CREATE)?;
        self.journal(Field::Type)
    }

    pub fn validate_get_type(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Assertion, "validateGetType")?;
        client_data::check_type(&self.ctx.client_data, TYPE_GET)?;
        self.journal(Field::Type)
    }

    pub fn validate_challenge(&mut self) -> Result<bool> {
        client_data::check_challenge(&self.ctx.client_data, self.ctx.expected()?)?;
        self.journal(Field::Challenge)
    }

    pub fn validate_token_binding(&mut self) -> Result<bool> {
        client_data::check_token_binding(&self.ctx.client_data)?;
        self.journal(Field::TokenBinding)
    }

    // ---- authenticator data ----

    pub fn validate_raw_authnr_data(&mut self) -> Result<bool> {
        authnr_data::check_raw(&self.ctx.authnr_data)?;
        self.journal(Field::RawAuthnrData)
    }

    pub fn validate_rp_id_hash(&mut self) -> Result<bool> {
        authnr_data::check_rp_id_hash(&self.ctx.authnr_data, &self.ctx.client_data)?;
        self.journal(Field::RpIdHash)
    }

    pub fn validate_aaguid(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateAaguid")?;
        authnr_data::check_aaguid(&self.ctx.authnr_data)?;
        self.journal(Field::Aaguid)
    }

    /// Journals both `credId` and `credIdLen`.
    pub fn validate_cred_id(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateCredId")?;
        authnr_data::check_cred_id(&self.ctx.authnr_data)?;
        self.journal(Field::CredIdLen)?;
        self.journal(Field::CredId)
    }

    /// Convert the COSE credential key into its JWK and PEM forms.
    pub fn validate_public_key(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validatePublicKey")?;
        let (jwk, pem) = authnr_data::derive_public_key(&self.ctx.authnr_data)?;
        self.ctx.authnr_data.credential_public_key_jwk = Some(jwk);
        self.ctx.authnr_data.credential_public_key_pem = Some(pem);
        self.journal(Field::CredentialPublicKeyCose)?;
        self.journal(Field::CredentialPublicKeyJwk)?;
        self.journal(Field::CredentialPublicKeyPem)
    }

    pub fn validate_flags(&mut self) -> Result<bool> {
        authnr_data::check_flags(
            &self.ctx.authnr_data,
            self.ctx.expected()?,
            self.validator.config.rfu_policy,
        )?;
        self.journal(Field::Flags)
    }

    /// Registration counter: presence only.
    pub fn validate_initial_counter(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateInitialCounter")?;
        authnr_data::check_initial_counter(&self.ctx.authnr_data)?;
        self.journal(Field::Counter)
    }

    /// Assertion counter: must exceed `prevCounter` when one was given.
    pub fn validate_counter(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Assertion, "validateCounter")?;
        authnr_data::check_counter(&self.ctx.authnr_data, self.ctx.expected()?)?;
        self.journal(Field::Counter)
    }

    pub fn validate_user_handle(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Assertion, "validateUserHandle")?;
        authnr_data::check_user_handle(&self.ctx.authnr_data)?;
        self.journal(Field::UserHandle)
    }

    /// Dispatch the attestation statement to the verifier registered for `fmt`.
    #[instrument(skip_all)]
    pub async fn validate_attestation(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Registration, "validateAttestation")?;
        let fmt = authnr_data::check_fmt(&self.ctx.authnr_data)?.to_string();
        let verifier = self.validator.registry.get(&fmt).ok_or_else(|| {
            VerifyError::unsupported(format!("no support for attestation format: {fmt}"))
        })?;

        let raw = self
            .ctx
            .client_data
            .raw_client_data_json
            .as_deref()
            .ok_or_else(|| {
                VerifyError::format("clientData clientDataJson should be ArrayBuffer")
            })?;
        let client_data_hash = sha256(raw);
        let att_stmt = self
            .ctx
            .authnr_data
            .att_stmt
            .clone()
            .unwrap_or(ciborium::Value::Map(Vec::new()));

        verifier
            .verify(&att_stmt, &self.ctx.authnr_data, &client_data_hash)
            .await?;
        debug!(format = %fmt, "Attestation statement verified");
        self.journal(Field::Fmt)
    }

    /// ES256 over `rawAuthnrData || SHA-256(rawClientDataJson)` with the expected key.
    #[instrument(skip_all)]
    pub async fn validate_assertion_signature(&mut self) -> Result<bool> {
        self.require_kind(CeremonyKind::Assertion, "validateAssertionSignature")?;
        let expected = self.ctx.expected()?;
        let pem = expected.public_key.as_deref().ok_or_else(|| {
            VerifyError::contract("expectation did not contain value for 'publicKey'")
        })?;
        let key = verifying_key_from_pem(pem)?;

        let auth_data = self.ctx.authnr_data.raw_authnr_data.as_deref().ok_or_else(|| {
            VerifyError::format("authnrData rawAuthnrData should be ArrayBuffer")
        })?;
        let raw_client_data = self
            .ctx
            .client_data
            .raw_client_data_json
            .as_deref()
            .ok_or_else(|| {
                VerifyError::format("clientData clientDataJson should be ArrayBuffer")
            })?;
        let signature = self
            .ctx
            .authnr_data
            .signature
            .as_deref()
            .ok_or_else(|| VerifyError::format("authnrData signature should be ArrayBuffer"))?;

        let mut signed_data = Vec::with_capacity(auth_data.len() + 32);
        signed_data.extend_from_slice(auth_data);
        signed_data.extend_from_slice(&sha256(raw_client_data));

        verify_es256(&key, &signed_data, signature)?;
        self.journal(Field::Signature)
    }

    // ---- finalizer ----

    /// Cross-check the journal. The only path to `complete == true`.
    pub fn validate_audit(&mut self) -> Result<bool> {
        let kind = self.ctx.kind();
        self.ctx.audit_mut().finalize(kind)
    }

    // ---- orchestration ----

    async fn run_registration(&mut self) -> Result<bool> {
        self.validate_expectations()?;
        self.validate_create_request()?;
        self.parse()?;

        self.validate_raw_client_data_json()?;
        self.validate_origin()?;
        self.validate_create_type()?;
        self.validate_challenge()?;
        self.validate_token_binding()?;
        self.validate_id()?;

        self.validate_raw_authnr_data()?;
        self.validate_rp_id_hash()?;
        self.validate_flags()?;
        self.validate_initial_counter()?;
        self.validate_aaguid()?;
        self.validate_cred_id()?;
        self.validate_public_key()?;
        self.validate_attestation().await?;

        self.validate_audit()
    }

    async fn run_assertion(&mut self) -> Result<bool> {
        self.validate_expectations()?;
        self.validate_assertion_response()?;
        self.parse()?;

        self.validate_raw_client_data_json()?;
        self.validate_origin()?;
        self.validate_get_type()?;
        self.validate_challenge()?;
        self.validate_token_binding()?;
        self.validate_id()?;

        self.validate_raw_authnr_data()?;
        self.validate_rp_id_hash()?;
        self.validate_flags()?;
        self.validate_counter()?;
        self.validate_user_handle()?;
        self.validate_assertion_signature().await?;

        self.validate_audit()
    }
}
