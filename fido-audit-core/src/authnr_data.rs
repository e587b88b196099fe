//! Authenticator data record and its field checks.

use std::fmt;

use ciborium::Value;
use serde::{Serialize, Serializer};

use crate::client_data::ClientData;
use crate::config::RfuPolicy;
use crate::crypto::{sha256, CoseEc2Key, Jwk};
use crate::error::{Result, VerifyError};
use crate::expectations::{ExpectedFlag, Expectations};

pub const RP_ID_HASH_LEN: usize = 32;
pub const AAGUID_LEN: usize = 16;

/// One bit of the authenticator-data flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    UP,
    RFU1,
    UV,
    RFU3,
    RFU4,
    RFU5,
    AT,
    ED,
}

impl Flag {
    pub const ALL: [Flag; 8] = [
        Flag::UP,
        Flag::RFU1,
        Flag::UV,
        Flag::RFU3,
        Flag::RFU4,
        Flag::RFU5,
        Flag::AT,
        Flag::ED,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Flag::UP => 0x01,
            Flag::RFU1 => 0x02,
            Flag::UV => 0x04,
            Flag::RFU3 => 0x08,
            Flag::RFU4 => 0x10,
            Flag::RFU5 => 0x20,
            Flag::AT => 0x40,
            Flag::ED => 0x80,
        }
    }

    pub const fn is_reserved(self) -> bool {
        matches!(self, Flag::RFU1 | Flag::RFU3 | Flag::RFU4 | Flag::RFU5)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The raw flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticatorFlags(pub u8);

impl AuthenticatorFlags {
    pub fn contains(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Set flags, lowest bit first.
    pub fn iter(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl fmt::Display for AuthenticatorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|flag| flag.to_string()).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}

impl Serialize for AuthenticatorFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|f| f.to_string()))
    }
}

/// Decoded authenticator data, attestation statement and assertion fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthnrData {
    #[serde(skip)]
    pub raw_authnr_data: Option<Vec<u8>>,
    pub fmt: Option<String>,
    #[serde(skip)]
    pub att_stmt: Option<Value>,
    #[serde(serialize_with = "opt_hex")]
    pub rp_id_hash: Option<Vec<u8>>,
    pub flags: Option<AuthenticatorFlags>,
    pub counter: Option<u32>,
    #[serde(serialize_with = "opt_hex")]
    pub aaguid: Option<Vec<u8>>,
    pub cred_id_len: Option<u16>,
    #[serde(serialize_with = "opt_hex")]
    pub cred_id: Option<Vec<u8>>,
    #[serde(skip)]
    pub credential_public_key_cose: Option<Value>,
    pub credential_public_key_jwk: Option<Jwk>,
    pub credential_public_key_pem: Option<String>,
    #[serde(skip)]
    pub extensions: Option<Value>,
    #[serde(skip)]
    pub user_handle: Option<Vec<u8>>,
    #[serde(skip)]
    pub signature: Option<Vec<u8>>,
}

impl AuthnrData {
    /// AAGUID as a UUID, when attested credential data was present.
    pub fn aaguid_uuid(&self) -> Option<uuid::Uuid> {
        self.aaguid
            .as_deref()
            .and_then(|bytes| uuid::Uuid::from_slice(bytes).ok())
    }
}

fn opt_hex<S: Serializer>(
    value: &Option<Vec<u8>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn check_raw(authnr_data: &AuthnrData) -> Result<()> {
    match authnr_data.raw_authnr_data {
        Some(_) => Ok(()),
        None => Err(VerifyError::format(
            "authnrData rawAuthnrData should be ArrayBuffer",
        )),
    }
}

/// RP ID is the host of the client-reported origin.
pub(crate) fn check_rp_id_hash(authnr_data: &AuthnrData, client_data: &ClientData) -> Result<()> {
    let actual = match authnr_data.rp_id_hash.as_deref() {
        Some(hash) if hash.len() == RP_ID_HASH_LEN => hash,
        _ => return Err(VerifyError::format("authnrData rpIdHash length mismatch")),
    };

    let origin = client_data
        .origin
        .as_deref()
        .ok_or_else(|| VerifyError::format("clientData origin was not a string"))?;
    let rp_id = url::Url::parse(origin)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .ok_or_else(|| VerifyError::format("clientData origin has no host"))?;

    let expected = sha256(rp_id.as_bytes());
    if actual != expected.as_slice() {
        return Err(VerifyError::mismatch(
            "authnrData rpIdHash mismatch",
            hex::encode(expected),
            hex::encode(actual),
        ));
    }
    Ok(())
}

pub(crate) fn check_aaguid(authnr_data: &AuthnrData) -> Result<()> {
    match authnr_data.aaguid.as_deref() {
        Some(aaguid) if aaguid.len() == AAGUID_LEN => Ok(()),
        Some(_) => Err(VerifyError::format("authnrData AAGUID was wrong length")),
        None => Err(VerifyError::format("authnrData AAGUID should be ArrayBuffer")),
    }
}

pub(crate) fn check_cred_id(authnr_data: &AuthnrData) -> Result<()> {
    let len = authnr_data.cred_id_len.ok_or_else(|| {
        VerifyError::format("authnrData credIdLen should be number, got undefined")
    })?;
    let cred_id = authnr_data
        .cred_id
        .as_deref()
        .ok_or_else(|| VerifyError::format("authnrData credId should be ArrayBuffer"))?;
    if cred_id.len() != usize::from(len) {
        return Err(VerifyError::format("authnrData credId was wrong length"));
    }
    Ok(())
}

/// Derive JWK and PEM from the COSE key. Forms already supplied by the parser
/// must agree with the derived ones.
pub(crate) fn derive_public_key(authnr_data: &AuthnrData) -> Result<(Jwk, String)> {
    let cose = authnr_data.credential_public_key_cose.as_ref().ok_or_else(|| {
        VerifyError::format("authnrData credentialPublicKeyCose should be Object")
    })?;
    let key = CoseEc2Key::from_cose(cose)?;
    let jwk = key.to_jwk();
    let pem = key.to_pem()?;

    if let Some(supplied) = &authnr_data.credential_public_key_jwk {
        if *supplied != jwk {
            return Err(VerifyError::mismatch(
                "authnrData credentialPublicKeyJwk does not match COSE key",
                format!("x={} y={}", jwk.x, jwk.y),
                format!("x={} y={}", supplied.x, supplied.y),
            ));
        }
    }
    if let Some(supplied) = &authnr_data.credential_public_key_pem {
        if supplied.trim() != pem.trim() {
            return Err(VerifyError::mismatch(
                "authnrData credentialPublicKeyPem does not match COSE key",
                pem.trim(),
                supplied.trim(),
            ));
        }
    }
    Ok((jwk, pem))
}

pub(crate) fn check_flags(
    authnr_data: &AuthnrData,
    expected: &Expectations,
    rfu_policy: RfuPolicy,
) -> Result<()> {
    let flags = authnr_data
        .flags
        .ok_or_else(|| VerifyError::format("authnrData flags should be number"))?;

    if rfu_policy == RfuPolicy::Reject {
        if let Some(rfu) = flags.iter().find(|f| f.is_reserved()) {
            return Err(VerifyError::format(format!(
                "authnrData flags had reserved bit set: {rfu}"
            )));
        }
    }

    for wanted in &expected.flags {
        let satisfied = match wanted {
            ExpectedFlag::UserPresent => flags.contains(Flag::UP),
            ExpectedFlag::UserVerified => flags.contains(Flag::UV),
            ExpectedFlag::AttestedCredentialData => flags.contains(Flag::AT),
            ExpectedFlag::ExtensionData => flags.contains(Flag::ED),
            ExpectedFlag::UserPresentOrVerified => {
                flags.contains(Flag::UP) || flags.contains(Flag::UV)
            }
        };
        if satisfied {
            continue;
        }

        let message = match wanted {
            ExpectedFlag::UserPresentOrVerified => "expected User Presence (UP) or User Verification (UV) flag to be set and neither was".to_string(),
            other => format!("expected flag was not set: {other}"),
        };
        return Err(VerifyError::mismatch(message, wanted.token(), flags.to_string()));
    }
    Ok(())
}

/// Registration: the counter only has to be present.
pub(crate) fn check_initial_counter(authnr_data: &AuthnrData) -> Result<()> {
    authnr_data
        .counter
        .map(|_| ())
        .ok_or_else(|| VerifyError::format("authnrData counter wasn't a number"))
}

/// Assertion: the counter must move forward when a previous value is known.
pub(crate) fn check_counter(authnr_data: &AuthnrData, expected: &Expectations) -> Result<()> {
    let counter = authnr_data
        .counter
        .ok_or_else(|| VerifyError::format("authnrData counter wasn't a number"))?;

    if let Some(prev) = expected.prev_counter {
        if u64::from(counter) <= prev {
            return Err(VerifyError::mismatch(
                "counter rollback detected",
                format!("> {prev}"),
                counter.to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_user_handle(authnr_data: &AuthnrData) -> Result<()> {
    match authnr_data.user_handle {
        None => Ok(()),
        Some(_) => Err(VerifyError::unsupported("unable to validate userHandle")),
    }
}

pub(crate) fn check_fmt(authnr_data: &AuthnrData) -> Result<&str> {
    authnr_data
        .fmt
        .as_deref()
        .ok_or_else(|| VerifyError::shape("'fmt'", "string", "undefined"))
}
