//! `packed` attestation (WebAuthn §8.2), ES256 only.
//!
//! Full attestation verifies with the leaf of `x5c`; self attestation verifies
//! with the credential key itself. Chain building and trust anchors are left to
//! the caller's policy.

use async_trait::async_trait;
use ciborium::Value;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::FormatVerifier;
use crate::authnr_data::AuthnrData;
use crate::crypto::{verify_es256, verifying_key_from_spki_der, CoseEc2Key, COSE_ALG_ES256};
use crate::encoding::{as_i64, map_get};
use crate::error::{Result, VerifyError};

/// id-fido-gen-ce-aaguid
const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// `fmt: "packed"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedAttestation;

#[async_trait]
impl FormatVerifier for PackedAttestation {
    fn name(&self) -> &'static str {
        "packed"
    }

    async fn verify(
        &self,
        att_stmt: &Value,
        authnr_data: &AuthnrData,
        client_data_hash: &[u8; 32],
    ) -> Result<()> {
        let alg = map_get(att_stmt, "alg")
            .and_then(as_i64)
            .ok_or_else(|| VerifyError::format("packed attestation is missing alg"))?;
        if alg != COSE_ALG_ES256 {
            return Err(VerifyError::unsupported(format!(
                "packed attestation algorithm not supported: {alg}"
            )));
        }

        let sig = map_get(att_stmt, "sig")
            .and_then(Value::as_bytes)
            .ok_or_else(|| VerifyError::format("packed attestation is missing sig"))?;

        let auth_data = authnr_data.raw_authnr_data.as_deref().ok_or_else(|| {
            VerifyError::format("authnrData rawAuthnrData should be ArrayBuffer")
        })?;
        let mut signed_data = Vec::with_capacity(auth_data.len() + client_data_hash.len());
        signed_data.extend_from_slice(auth_data);
        signed_data.extend_from_slice(client_data_hash);

        match (map_get(att_stmt, "x5c"), map_get(att_stmt, "ecdaaKeyId")) {
            (Some(x5c), None) => {
                debug!("Packed full attestation");
                verify_full(x5c, authnr_data, &signed_data, sig)
            }
            (None, None) => {
                debug!("Packed self attestation");
                verify_self(alg, authnr_data, &signed_data, sig)
            }
            (None, Some(_)) => Err(VerifyError::unsupported(
                "ECDAA attestation not supported",
            )),
            (Some(_), Some(_)) => Err(VerifyError::format(
                "packed attestation cannot have both x5c and ecdaaKeyId",
            )),
        }
    }
}

fn verify_full(x5c: &Value, authnr_data: &AuthnrData, signed_data: &[u8], sig: &[u8]) -> Result<()> {
    let leaf = x5c
        .as_array()
        .and_then(|chain| chain.first())
        .and_then(Value::as_bytes)
        .ok_or_else(|| VerifyError::format("packed attestation x5c should be a non-empty Array"))?;

    let (_, cert) = X509Certificate::from_der(leaf).map_err(|e| {
        VerifyError::crypto(format!("failed to parse attestation certificate: {e}"))
    })?;

    if cert.tbs_certificate.is_ca() {
        return Err(VerifyError::format(
            "packed attestation certificate must not be a CA",
        ));
    }

    if let Some(ext) = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == OID_FIDO_GEN_CE_AAGUID)
    {
        // OCTET STRING (0x04) of length 16 (0x10)
        let cert_aaguid = match ext.value {
            [0x04, 0x10, rest @ ..] if rest.len() == 16 => rest,
            _ => {
                return Err(VerifyError::format(
                    "packed attestation certificate AAGUID extension is malformed",
                ))
            }
        };
        let authnr_aaguid = authnr_data.aaguid.as_deref().unwrap_or_default();
        if cert_aaguid != authnr_aaguid {
            return Err(VerifyError::mismatch(
                "packed attestation certificate AAGUID mismatch",
                hex::encode(authnr_aaguid),
                hex::encode(cert_aaguid),
            ));
        }
    }

    let key = verifying_key_from_spki_der(cert.tbs_certificate.subject_pki.raw)?;
    verify_es256(&key, signed_data, sig)
}

fn verify_self(alg: i64, authnr_data: &AuthnrData, signed_data: &[u8], sig: &[u8]) -> Result<()> {
    let cose = authnr_data
        .credential_public_key_cose
        .as_ref()
        .ok_or_else(|| VerifyError::format("self attestation requires attested credential data"))?;
    let key = CoseEc2Key::from_cose(cose)?;
    if key.alg != alg {
        return Err(VerifyError::mismatch(
            "self attestation alg does not match credential key",
            key.alg.to_string(),
            alg.to_string(),
        ));
    }
    verify_es256(&key.verifying_key()?, signed_data, sig)
}
