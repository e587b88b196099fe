//! Shared fixtures: deterministic keys and hand-built ceremony payloads.

#![allow(dead_code)]

use ciborium::Value;
use fido_audit_core::crypto::sha256;
use fido_audit_core::encoding::encode_b64url;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::{EncodePublicKey, LineEnding};
use serde_json::json;

pub const ORIGIN: &str = "https://localhost:8443";
pub const RP_ID: &str = "localhost";
pub const CHALLENGE: &str =
    "33EHav-jZ1v9qwH783aU-j0ARx6r5o-YHh-wd7C6jPbd7Wh6ytbIZosIIACehwf9-s6hXhySHO-HHUjEwZS29w";
pub const CRED_ID: [u8; 16] = [
    0x00, 0x08, 0xa2, 0xdd, 0x5e, 0xac, 0x1a, 0x86, 0xa8, 0xcd, 0x6e, 0xd3, 0x6c, 0xd6, 0x98, 0x94,
];
pub const AAGUID: [u8; 16] = [0u8; 16];

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Credential key used by every fixture.
pub fn credential_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32].into()).unwrap()
}

pub fn other_key() -> SigningKey {
    SigningKey::from_bytes(&[9u8; 32].into()).unwrap()
}

pub fn public_key_pem(key: &SigningKey) -> String {
    key.verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

pub fn cose_key(key: &SigningKey) -> Value {
    let point = key.verifying_key().to_encoded_point(false);
    Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (
            Value::Integer((-2).into()),
            Value::Bytes(point.x().unwrap().to_vec()),
        ),
        (
            Value::Integer((-3).into()),
            Value::Bytes(point.y().unwrap().to_vec()),
        ),
    ])
}

pub fn client_data_json(ceremony_type: &str, challenge: &str, origin: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": ceremony_type,
        "challenge": challenge,
        "origin": origin,
        "crossOrigin": false,
    }))
    .unwrap()
}

/// `rpIdHash | flags | counter | [aaguid | credIdLen | credId | COSE key]`
pub fn auth_data(rp_id: &str, flags: u8, counter: u32, credential: Option<&SigningKey>) -> Vec<u8> {
    let mut data = sha256(rp_id.as_bytes()).to_vec();
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    if let Some(key) = credential {
        data.extend_from_slice(&AAGUID);
        data.extend_from_slice(&(CRED_ID.len() as u16).to_be_bytes());
        data.extend_from_slice(&CRED_ID);
        ciborium::into_writer(&cose_key(key), &mut data).unwrap();
    }
    data
}

pub fn attestation_object(fmt: &str, att_stmt: Value, auth_data: &[u8]) -> Vec<u8> {
    let object = Value::Map(vec![
        (text("fmt"), text(fmt)),
        (text("attStmt"), att_stmt),
        (text("authData"), Value::Bytes(auth_data.to_vec())),
    ]);
    let mut out = Vec::new();
    ciborium::into_writer(&object, &mut out).unwrap();
    out
}

pub fn es256_der(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: Signature = key.sign(message);
    signature.to_der().as_bytes().to_vec()
}

pub fn credential_request(response: Vec<(&str, Value)>) -> Value {
    Value::Map(vec![
        (text("id"), text(&encode_b64url(CRED_ID))),
        (text("rawId"), Value::Bytes(CRED_ID.to_vec())),
        (text("type"), text("public-key")),
        (
            text("response"),
            Value::Map(response.into_iter().map(|(k, v)| (text(k), v)).collect()),
        ),
    ])
}

pub fn registration_expectations() -> serde_json::Value {
    json!({
        "origin": ORIGIN,
        "challenge": CHALLENGE,
        "flags": ["UP-or-UV", "AT"],
    })
}

/// A `none` attestation registration from `origin`.
pub fn none_registration_from(origin: &str) -> Value {
    let client_data = client_data_json("webauthn.create", CHALLENGE, origin);
    let auth = auth_data(RP_ID, FLAG_UP | FLAG_AT, 0, Some(&credential_key()));
    credential_request(vec![
        ("clientDataJSON", Value::Bytes(client_data)),
        (
            "attestationObject",
            Value::Bytes(attestation_object("none", Value::Map(vec![]), &auth)),
        ),
    ])
}

pub fn none_registration() -> Value {
    none_registration_from(ORIGIN)
}

/// A `packed` self-attestation registration signed by `signer`.
pub fn packed_self_registration(signer: &SigningKey) -> Value {
    let client_data = client_data_json("webauthn.create", CHALLENGE, ORIGIN);
    let auth = auth_data(RP_ID, FLAG_UP | FLAG_UV | FLAG_AT, 0, Some(&credential_key()));

    let mut signed = auth.clone();
    signed.extend_from_slice(&sha256(&client_data));
    let att_stmt = Value::Map(vec![
        (text("alg"), Value::Integer((-7).into())),
        (text("sig"), Value::Bytes(es256_der(signer, &signed))),
    ]);

    credential_request(vec![
        ("clientDataJSON", Value::Bytes(client_data)),
        (
            "attestationObject",
            Value::Bytes(attestation_object("packed", att_stmt, &auth)),
        ),
    ])
}

/// A registration whose attestation object carries `fmt` but is otherwise valid.
pub fn registration_with_fmt(fmt: &str) -> Value {
    let client_data = client_data_json("webauthn.create", CHALLENGE, ORIGIN);
    let auth = auth_data(RP_ID, FLAG_UP | FLAG_AT, 0, Some(&credential_key()));
    credential_request(vec![
        ("clientDataJSON", Value::Bytes(client_data)),
        (
            "attestationObject",
            Value::Bytes(attestation_object(fmt, Value::Map(vec![]), &auth)),
        ),
    ])
}

pub struct AssertionFixture {
    pub flags: u8,
    pub counter: u32,
    pub ceremony_type: &'static str,
    pub signer: SigningKey,
    pub user_handle: Option<Value>,
}

impl Default for AssertionFixture {
    fn default() -> Self {
        Self {
            flags: FLAG_UP,
            counter: 363,
            ceremony_type: "webauthn.get",
            signer: credential_key(),
            user_handle: None,
        }
    }
}

impl AssertionFixture {
    pub fn request(&self) -> Value {
        let client_data = client_data_json(self.ceremony_type, CHALLENGE, ORIGIN);
        let auth = auth_data(RP_ID, self.flags, self.counter, None);

        let mut signed = auth.clone();
        signed.extend_from_slice(&sha256(&client_data));

        let mut response = vec![
            ("clientDataJSON", Value::Bytes(client_data)),
            ("authenticatorData", Value::Bytes(auth)),
            ("signature", Value::Bytes(es256_der(&self.signer, &signed))),
        ];
        if let Some(handle) = &self.user_handle {
            response.push(("userHandle", handle.clone()));
        }
        credential_request(response)
    }
}

pub fn assertion_expectations(prev_counter: Option<u64>) -> serde_json::Value {
    let mut expectations = json!({
        "origin": ORIGIN,
        "challenge": CHALLENGE,
        "flags": ["UP-or-UV"],
        "counter": 363,
        "publicKey": public_key_pem(&credential_key()),
    });
    if let Some(prev) = prev_counter {
        expectations["prevCounter"] = json!(prev);
    }
    expectations
}

/// Drop `response.<name>` from a request.
pub fn remove_response_field(request: &mut Value, name: &str) {
    if let Value::Map(entries) = request {
        for (key, value) in entries.iter_mut() {
            if matches!(key, Value::Text(k) if k == "response") {
                if let Value::Map(fields) = value {
                    fields.retain(|(k, _)| !matches!(k, Value::Text(t) if t == name));
                }
            }
        }
    }
}
