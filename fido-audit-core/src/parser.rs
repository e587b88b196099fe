//! Wire-format decoding for ceremony payloads.
//!
//! Turns the raw request into [`ClientData`] and [`AuthnrData`] records. The
//! parser only decodes; it never decides whether a value is acceptable.
//!
//! Authenticator data layout:
//! ```text
//! rpIdHash[32] | flags[1] | signCount[4] | [attestedCredentialData] | [extensions]
//! attestedCredentialData = aaguid[16] | credIdLen[2] | credId[credIdLen] | COSE key
//! ```

use ciborium::Value;
use serde::Deserialize;
use tracing::debug;

use crate::authnr_data::{AuthenticatorFlags, AuthnrData, Flag, AAGUID_LEN, RP_ID_HASH_LEN};
use crate::client_data::ClientData;
use crate::crypto::CoseEc2Key;
use crate::encoding::{decode_b64url, decode_payload, map_get};
use crate::error::{Result, VerifyError};

/// rpIdHash + flags + signCount
pub const AUTHENTICATOR_DATA_MIN_LEN: usize = RP_ID_HASH_LEN + 1 + 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectedClientData {
    #[serde(rename = "type")]
    ceremony_type: Option<serde_json::Value>,
    challenge: Option<serde_json::Value>,
    origin: Option<serde_json::Value>,
    token_binding: Option<serde_json::Value>,
}

fn response_field<'a>(request: &'a Value, name: &str) -> Option<&'a Value> {
    map_get(request, "response").and_then(|r| map_get(r, name))
}

fn required_payload(request: &Value, name: &str) -> Result<Vec<u8>> {
    response_field(request, name)
        .and_then(decode_payload)
        .ok_or_else(|| VerifyError::parse(format!("response.{name} could not be decoded")))
}

/// Decode `clientDataJSON`: raw bytes, base64url text, or JSON text.
pub fn parse_client_data(payload: &Value) -> Result<ClientData> {
    let raw = match payload {
        Value::Text(text) if text.trim_start().starts_with('{') => text.as_bytes().to_vec(),
        other => decode_payload(other)
            .ok_or_else(|| VerifyError::parse("clientDataJSON could not be decoded"))?,
    };

    let collected: CollectedClientData = serde_json::from_slice(&raw)
        .map_err(|e| VerifyError::parse(format!("clientDataJSON is not valid JSON: {e}")))?;

    let as_string = |v: Option<serde_json::Value>| match v {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    };

    Ok(ClientData {
        raw_client_data_json: Some(raw),
        origin: as_string(collected.origin),
        ceremony_type: as_string(collected.ceremony_type),
        challenge: as_string(collected.challenge),
        token_binding: collected.token_binding.filter(|v| !v.is_null()),
        id: None,
    })
}

/// Credential id from `rawId`, falling back to base64url `id`.
pub fn parse_credential_id(request: &Value) -> Option<Vec<u8>> {
    if let Some(raw_id) = map_get(request, "rawId").and_then(decode_payload) {
        return Some(raw_id);
    }
    match map_get(request, "id") {
        Some(Value::Text(id)) => decode_b64url(id),
        _ => None,
    }
}

/// Parse the authenticator data byte layout.
pub fn parse_authenticator_data(data: &[u8]) -> Result<AuthnrData> {
    if data.len() < AUTHENTICATOR_DATA_MIN_LEN {
        return Err(VerifyError::parse(format!(
            "authenticator data too short: {} bytes (minimum {AUTHENTICATOR_DATA_MIN_LEN})",
            data.len()
        )));
    }

    let (rp_id_hash, rest) = data.split_at(RP_ID_HASH_LEN);
    let flags = AuthenticatorFlags(rest[0]);
    let counter = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]);
    let mut rest = &rest[5..];

    let mut parsed = AuthnrData {
        raw_authnr_data: Some(data.to_vec()),
        rp_id_hash: Some(rp_id_hash.to_vec()),
        flags: Some(flags),
        counter: Some(counter),
        ..AuthnrData::default()
    };

    if flags.contains(Flag::AT) {
        if rest.len() < AAGUID_LEN + 2 {
            return Err(VerifyError::parse(
                "authenticator data has AT flag but is too short for attested credential data",
            ));
        }
        let (aaguid, tail) = rest.split_at(AAGUID_LEN);
        let cred_id_len = u16::from_be_bytes([tail[0], tail[1]]);
        let tail = &tail[2..];
        if tail.len() < usize::from(cred_id_len) {
            return Err(VerifyError::parse(format!(
                "credential id length {cred_id_len} exceeds remaining {} bytes",
                tail.len()
            )));
        }
        let (cred_id, mut tail) = tail.split_at(usize::from(cred_id_len));

        let cose: Value = ciborium::from_reader(&mut tail)
            .map_err(|e| VerifyError::parse(format!("invalid COSE credential key: {e}")))?;

        if let Ok(key) = CoseEc2Key::from_cose(&cose) {
            parsed.credential_public_key_jwk = Some(key.to_jwk());
            parsed.credential_public_key_pem = key.to_pem().ok();
        }
        parsed.aaguid = Some(aaguid.to_vec());
        parsed.cred_id_len = Some(cred_id_len);
        parsed.cred_id = Some(cred_id.to_vec());
        parsed.credential_public_key_cose = Some(cose);
        rest = tail;
    }

    if flags.contains(Flag::ED) {
        let extensions: Value = ciborium::from_reader(&mut rest)
            .map_err(|e| VerifyError::parse(format!("invalid extension data: {e}")))?;
        parsed.extensions = Some(extensions);
    }

    if !rest.is_empty() {
        return Err(VerifyError::parse(format!(
            "{} trailing bytes after authenticator data",
            rest.len()
        )));
    }

    Ok(parsed)
}

/// Decode a CBOR attestation object (`fmt`, `attStmt`, `authData`).
pub fn parse_attestation_object(bytes: &[u8]) -> Result<AuthnrData> {
    let object: Value = ciborium::from_reader(bytes)
        .map_err(|e| VerifyError::parse(format!("attestationObject is not valid CBOR: {e}")))?;
    if !object.is_map() {
        return Err(VerifyError::parse("attestationObject is not a CBOR map"));
    }

    let auth_data = map_get(&object, "authData")
        .and_then(Value::as_bytes)
        .ok_or_else(|| VerifyError::parse("attestationObject is missing authData"))?;

    let mut parsed = parse_authenticator_data(auth_data)?;
    parsed.fmt = map_get(&object, "fmt")
        .and_then(Value::as_text)
        .map(str::to_owned);
    parsed.att_stmt = map_get(&object, "attStmt").cloned();
    Ok(parsed)
}

/// Parse a registration (`navigator.credentials.create()`) response.
pub fn parse_create_request(request: &Value) -> Result<(ClientData, AuthnrData)> {
    let client_payload = response_field(request, "clientDataJSON")
        .ok_or_else(|| VerifyError::parse("response.clientDataJSON is missing"))?;
    let mut client_data = parse_client_data(client_payload)?;
    client_data.id = parse_credential_id(request);

    let attestation = required_payload(request, "attestationObject")?;
    let authnr_data = parse_attestation_object(&attestation)?;

    debug!(
        fmt = authnr_data.fmt.as_deref().unwrap_or("undefined"),
        flags = %authnr_data.flags.unwrap_or_default(),
        "Parsed create request"
    );
    Ok((client_data, authnr_data))
}

/// Parse an authentication (`navigator.credentials.get()`) response.
pub fn parse_assertion_response(request: &Value) -> Result<(ClientData, AuthnrData)> {
    let client_payload = response_field(request, "clientDataJSON")
        .ok_or_else(|| VerifyError::parse("response.clientDataJSON is missing"))?;
    let mut client_data = parse_client_data(client_payload)?;
    client_data.id = parse_credential_id(request);

    let auth_data = required_payload(request, "authenticatorData")?;
    let mut authnr_data = parse_authenticator_data(&auth_data)?;
    authnr_data.signature = Some(required_payload(request, "signature")?);
    authnr_data.user_handle = match response_field(request, "userHandle") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let handle = decode_payload(value)
                .ok_or_else(|| VerifyError::parse("response.userHandle could not be decoded"))?;
            (!handle.is_empty()).then_some(handle)
        }
    };

    debug!(
        counter = authnr_data.counter.unwrap_or_default(),
        flags = %authnr_data.flags.unwrap_or_default(),
        "Parsed assertion response"
    );
    Ok((client_data, authnr_data))
}
