//! Relying-party expectations and the contract they must satisfy.
//!
//! Callers hand the engine a loosely-typed map (usually straight from their own
//! session store). [`validate_expectations`] checks it against the key set the
//! ceremony type requires and converts it into the typed [`Expectations`] record
//! that every field validator reads.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::CeremonyKind;
use crate::encoding::decode_b64url;
use crate::error::{Result, VerifyError};

pub const PEM_PUBLIC_KEY_HEADER: &str = "-----BEGIN PUBLIC KEY-----";

/// Keys a caller may put in the expectation map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpectationKey {
    Origin,
    Challenge,
    Flags,
    Counter,
    PrevCounter,
    PublicKey,
}

impl ExpectationKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Challenge => "challenge",
            Self::Flags => "flags",
            Self::Counter => "counter",
            Self::PrevCounter => "prevCounter",
            Self::PublicKey => "publicKey",
        }
    }
}

impl fmt::Display for ExpectationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CeremonyKind {
    pub fn required_expectations(self) -> &'static [ExpectationKey] {
        use ExpectationKey::*;
        match self {
            Self::Registration => &[Origin, Challenge, Flags],
            Self::Assertion => &[Origin, Challenge, Flags, Counter, PublicKey],
        }
    }

    pub fn optional_expectations(self) -> &'static [ExpectationKey] {
        match self {
            Self::Registration => &[],
            Self::Assertion => &[ExpectationKey::PrevCounter],
        }
    }
}

/// A flag the relying party requires the authenticator to have set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpectedFlag {
    #[serde(rename = "UP")]
    UserPresent,
    #[serde(rename = "UV")]
    UserVerified,
    #[serde(rename = "AT")]
    AttestedCredentialData,
    #[serde(rename = "ED")]
    ExtensionData,
    /// Policy token: satisfied by either UP or UV.
    #[serde(rename = "UP-or-UV")]
    UserPresentOrVerified,
}

impl ExpectedFlag {
    pub const fn token(self) -> &'static str {
        match self {
            Self::UserPresent => "UP",
            Self::UserVerified => "UV",
            Self::AttestedCredentialData => "AT",
            Self::ExtensionData => "ED",
            Self::UserPresentOrVerified => "UP-or-UV",
        }
    }
}

impl fmt::Display for ExpectedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ExpectedFlag {
    type Err = VerifyError;

    fn from_str(token: &str) -> Result<Self> {
        match token {
            "UP" => Ok(Self::UserPresent),
            "UV" => Ok(Self::UserVerified),
            "AT" => Ok(Self::AttestedCredentialData),
            "ED" => Ok(Self::ExtensionData),
            "UP-or-UV" => Ok(Self::UserPresentOrVerified),
            other => Err(VerifyError::contract(format!(
                "expected flag unknown: {other}"
            ))),
        }
    }
}

/// Typed expectations, available once the contract check has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectations {
    pub origin: String,
    pub challenge: String,
    pub flags: BTreeSet<ExpectedFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_counter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl Expectations {
    pub fn registration(
        origin: impl Into<String>,
        challenge: impl Into<String>,
        flags: impl IntoIterator<Item = ExpectedFlag>,
    ) -> Self {
        Self {
            origin: origin.into(),
            challenge: challenge.into(),
            flags: flags.into_iter().collect(),
            counter: None,
            prev_counter: None,
            public_key: None,
        }
    }

    pub fn assertion(
        origin: impl Into<String>,
        challenge: impl Into<String>,
        flags: impl IntoIterator<Item = ExpectedFlag>,
        counter: u64,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            counter: Some(counter),
            public_key: Some(public_key.into()),
            ..Self::registration(origin, challenge, flags)
        }
    }

    pub fn with_prev_counter(mut self, prev_counter: u64) -> Self {
        self.prev_counter = Some(prev_counter);
        self
    }

    /// The raw map form accepted by the contract check.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check raw caller expectations against the contract for `kind`.
pub fn validate_expectations(kind: CeremonyKind, raw: Option<&Value>) -> Result<Expectations> {
    let raw = raw.ok_or_else(|| VerifyError::contract("expectations could not be found"))?;
    let map = raw.as_object().ok_or_else(|| {
        VerifyError::contract(format!(
            "expectations should be of type Object, got: {}",
            json_type(raw)
        ))
    })?;

    let required = kind.required_expectations();
    if let Some(missing) = required.iter().find(|k| !map.contains_key(k.as_str())) {
        return Err(VerifyError::contract(format!(
            "expectation did not contain value for '{missing}'"
        )));
    }

    let optional_present = kind
        .optional_expectations()
        .iter()
        .filter(|k| map.contains_key(k.as_str()))
        .count();
    let should_have = required.len() + optional_present;
    if map.len() != should_have {
        return Err(VerifyError::contract(format!(
            "wrong number of expectations: should have {should_have} but got {}",
            map.len()
        )));
    }

    let origin = check_origin(required_value(map, ExpectationKey::Origin)?)?;
    let challenge = check_challenge(required_value(map, ExpectationKey::Challenge)?)?;
    let flags = check_flags(required_value(map, ExpectationKey::Flags)?)?;

    let counter = map
        .get(ExpectationKey::Counter.as_str())
        .map(|v| check_counter(ExpectationKey::Counter, v))
        .transpose()?;
    let prev_counter = map
        .get(ExpectationKey::PrevCounter.as_str())
        .map(|v| check_counter(ExpectationKey::PrevCounter, v))
        .transpose()?;
    let public_key = map
        .get(ExpectationKey::PublicKey.as_str())
        .map(check_public_key)
        .transpose()?;

    Ok(Expectations {
        origin,
        challenge,
        flags,
        counter,
        prev_counter,
        public_key,
    })
}

fn required_value(map: &serde_json::Map<String, Value>, key: ExpectationKey) -> Result<&Value> {
    map.get(key.as_str()).ok_or_else(|| {
        VerifyError::contract(format!("expectation did not contain value for '{key}'"))
    })
}

fn check_origin(value: &Value) -> Result<String> {
    let origin = value.as_str().ok_or_else(|| {
        VerifyError::contract(format!(
            "expected origin should be of type String, got: {}",
            json_type(value)
        ))
    })?;
    let has_host = url::Url::parse(origin)
        .ok()
        .is_some_and(|u| u.host_str().is_some_and(|h| !h.is_empty()));
    if !has_host {
        return Err(VerifyError::contract(
            "expected origin should be a valid URL with a host",
        ));
    }
    Ok(origin.to_string())
}

fn check_challenge(value: &Value) -> Result<String> {
    let challenge = value.as_str().ok_or_else(|| {
        VerifyError::contract(format!(
            "expected challenge should be of type String, got: {}",
            json_type(value)
        ))
    })?;
    if decode_b64url(challenge).is_none() {
        return Err(VerifyError::contract(
            "expected challenge should be properly encoded base64url String",
        ));
    }
    Ok(challenge.to_string())
}

fn check_flags(value: &Value) -> Result<BTreeSet<ExpectedFlag>> {
    let tokens = value.as_array().ok_or_else(|| {
        VerifyError::contract(format!(
            "expected flags should be of type Array, got: {}",
            json_type(value)
        ))
    })?;
    tokens
        .iter()
        .map(|token| match token.as_str() {
            Some(t) => t.parse(),
            None => Err(VerifyError::contract(format!(
                "expected flag unknown: {token}"
            ))),
        })
        .collect()
}

fn check_counter(key: ExpectationKey, value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        VerifyError::contract(format!(
            "expected {key} should be a non-negative integer, got: {value}"
        ))
    })
}

fn check_public_key(value: &Value) -> Result<String> {
    match value.as_str() {
        Some(pem) if pem.trim_start().starts_with(PEM_PUBLIC_KEY_HEADER) => Ok(pem.to_string()),
        Some(_) => Err(VerifyError::contract(
            "expected publicKey should be a PEM-encoded public key",
        )),
        None => Err(VerifyError::contract(format!(
            "expected publicKey should be of type String, got: {}",
            json_type(value)
        ))),
    }
}
