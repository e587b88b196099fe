//! Example demonstrating ceremony tracing instrumentation.
//!
//! Builds a `none` registration and a matching assertion with a throwaway
//! P-256 key, then runs both through the validator with debug logging on.
//!
//! Run with: cargo run -p fido-audit-core --example ceremony_tracing

use ciborium::Value;
use fido_audit_core::crypto::{sha256, CoseEc2Key};
use fido_audit_core::encoding::encode_b64url;
use fido_audit_core::{Validator, VerificationContext};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

const ORIGIN: &str = "https://localhost:8443";
const CHALLENGE: &str = "Y2VyZW1vbnktdHJhY2luZy1kZW1vLWNoYWxsZW5nZQ";
const CRED_ID: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03];

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn cose_key(key: &SigningKey) -> Value {
    let point = key.verifying_key().to_encoded_point(false);
    let coord = |c: Option<&p256::FieldBytes>| Value::Bytes(c.map(|b| b.to_vec()).unwrap_or_default());
    Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (Value::Integer((-2).into()), coord(point.x())),
        (Value::Integer((-3).into()), coord(point.y())),
    ])
}

fn client_data(ceremony_type: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": ceremony_type,
        "challenge": CHALLENGE,
        "origin": ORIGIN,
    }))
    .unwrap_or_default()
}

fn auth_data(
    flags: u8,
    counter: u32,
    credential: Option<&Value>,
) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
    let mut data = sha256("localhost").to_vec();
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    if let Some(cose) = credential {
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&(CRED_ID.len() as u16).to_be_bytes());
        data.extend_from_slice(&CRED_ID);
        ciborium::into_writer(cose, &mut data)?;
    }
    Ok(data)
}

fn request(response: Vec<(&str, Value)>) -> Value {
    Value::Map(vec![
        (text("id"), text(&encode_b64url(CRED_ID))),
        (
            text("response"),
            Value::Map(response.into_iter().map(|(k, v)| (text(k), v)).collect()),
        ),
    ])
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("fido_audit_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Ceremony Tracing Demo ===\n");

    let key = match SigningKey::from_slice(&[42u8; 32]) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Failed to create key: {}", e);
            return;
        }
    };
    let cose = cose_key(&key);
    let validator = Validator::from_env();

    // Registration
    let registration_auth = match auth_data(0x41, 0, Some(&cose)) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to encode authenticator data: {}", e);
            return;
        }
    };
    let mut attestation = Vec::new();
    let object = Value::Map(vec![
        (text("fmt"), text("none")),
        (text("attStmt"), Value::Map(vec![])),
        (text("authData"), Value::Bytes(registration_auth)),
    ]);
    if let Err(e) = ciborium::into_writer(&object, &mut attestation) {
        eprintln!("Failed to encode attestation object: {}", e);
        return;
    }
    let registration = request(vec![
        ("clientDataJSON", Value::Bytes(client_data("webauthn.create"))),
        ("attestationObject", Value::Bytes(attestation)),
    ]);
    let expectations = json!({
        "origin": ORIGIN,
        "challenge": CHALLENGE,
        "flags": ["UP-or-UV", "AT"],
    });

    println!("\nVerifying registration...\n");
    let registered = match validator
        .verify_registration(VerificationContext::registration(registration, expectations))
        .await
    {
        Ok(ctx) => ctx,
        Err(e) => {
            println!("\n❌ Registration failed: {}", e);
            return;
        }
    };
    let Some(pem) = registered.authnr_data.credential_public_key_pem.clone() else {
        println!("\n❌ Registration produced no public key");
        return;
    };
    println!("\n✅ Registered");
    println!("   Journal: {} fields", registered.audit().journal().len());
    if let Ok(parsed) = CoseEc2Key::from_cose(&cose) {
        println!("   JWK:     {}", serde_json::to_string(&parsed.to_jwk()).unwrap_or_default());
    }

    // Assertion
    let client = client_data("webauthn.get");
    let auth = match auth_data(0x05, 1, None) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to encode authenticator data: {}", e);
            return;
        }
    };
    let mut signed = auth.clone();
    signed.extend_from_slice(&sha256(&client));
    let signature: Signature = key.sign(&signed);

    let assertion = request(vec![
        ("clientDataJSON", Value::Bytes(client)),
        ("authenticatorData", Value::Bytes(auth)),
        ("signature", Value::Bytes(signature.to_der().as_bytes().to_vec())),
    ]);
    let expectations = json!({
        "origin": ORIGIN,
        "challenge": CHALLENGE,
        "flags": ["UP", "UV"],
        "counter": 1,
        "prevCounter": 0,
        "publicKey": pem,
    });

    println!("\nVerifying assertion...\n");
    match validator
        .verify_assertion(VerificationContext::assertion(assertion, expectations))
        .await
    {
        Ok(ctx) => {
            println!("\n✅ Success!");
            println!("   Complete: {}", ctx.audit().is_complete());
            println!("   Counter:  {:?}", ctx.authnr_data.counter);
        }
        Err(e) => {
            println!("\n❌ Failed: {}", e);
        }
    }
}
