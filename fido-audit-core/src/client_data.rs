//! Client data record and its field checks.

use serde::Serialize;

use crate::encoding::decode_b64url;
use crate::error::{Result, VerifyError};
use crate::expectations::Expectations;

pub const TYPE_CREATE: &str = "webauthn.create";
pub const TYPE_GET: &str = "webauthn.get";

/// Decoded `clientDataJSON` plus the credential id from the request.
///
/// Every field is optional so a validator, not the parser, decides what a
/// missing value means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    #[serde(skip)]
    pub raw_client_data_json: Option<Vec<u8>>,
    pub origin: Option<String>,
    #[serde(rename = "type")]
    pub ceremony_type: Option<String>,
    pub challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<serde_json::Value>,
    #[serde(skip)]
    pub id: Option<Vec<u8>>,
}

/// Hook deciding whether the client-reported origin is acceptable.
pub trait OriginCheck: Send + Sync {
    fn check(&self, expected: &str, actual: &str) -> bool;
}

/// Byte-for-byte origin comparison. No default-port or case normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactOrigin;

impl OriginCheck for ExactOrigin {
    fn check(&self, expected: &str, actual: &str) -> bool {
        expected == actual
    }
}

impl<F> OriginCheck for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn check(&self, expected: &str, actual: &str) -> bool {
        self(expected, actual)
    }
}

pub(crate) fn check_raw(client_data: &ClientData) -> Result<()> {
    match client_data.raw_client_data_json {
        Some(_) => Ok(()),
        None => Err(VerifyError::format(
            "clientData clientDataJson should be ArrayBuffer",
        )),
    }
}

pub(crate) fn check_id(client_data: &ClientData) -> Result<()> {
    match client_data.id {
        Some(_) => Ok(()),
        None => Err(VerifyError::format("expected id to be of type ArrayBuffer")),
    }
}

pub(crate) fn check_origin(
    client_data: &ClientData,
    expected: &Expectations,
    hook: &dyn OriginCheck,
) -> Result<()> {
    let actual = client_data
        .origin
        .as_deref()
        .ok_or_else(|| VerifyError::format("clientData origin was not a string"))?;
    if !hook.check(&expected.origin, actual) {
        return Err(VerifyError::mismatch(
            "clientData origin did not match expected origin",
            expected.origin.as_str(),
            actual,
        ));
    }
    Ok(())
}

pub(crate) fn check_type(client_data: &ClientData, wanted: &str) -> Result<()> {
    match client_data.ceremony_type.as_deref() {
        Some(t) if t == wanted => Ok(()),
        other => Err(VerifyError::mismatch(
            format!("clientData type should be '{wanted}'"),
            wanted,
            other.unwrap_or("undefined"),
        )),
    }
}

pub(crate) fn check_challenge(client_data: &ClientData, expected: &Expectations) -> Result<()> {
    let actual = client_data
        .challenge
        .as_deref()
        .ok_or_else(|| VerifyError::format("clientData challenge was not a string"))?;
    let actual_bytes =
        decode_b64url(actual).ok_or_else(|| VerifyError::encoding("clientData challenge"))?;
    let expected_bytes = decode_b64url(&expected.challenge).ok_or_else(|| {
        VerifyError::contract("expected challenge should be properly encoded base64url String")
    })?;

    if actual_bytes != expected_bytes {
        return Err(VerifyError::mismatch(
            "clientData challenge mismatch",
            expected.challenge.as_str(),
            actual,
        ));
    }
    Ok(())
}

pub(crate) fn check_token_binding(client_data: &ClientData) -> Result<()> {
    match client_data.token_binding {
        None => Ok(()),
        Some(_) => Err(VerifyError::unsupported(
            "Token binding not currently supported. Please submit a GitHub issue.",
        )),
    }
}
