//! CLI integration tests for fido-audit-cli.
//!
//! These tests run the actual binary against ceremony files written to a
//! temp dir and check stdout, stderr and exit codes.

use assert_cmd::Command;
use ciborium::Value;
use fido_audit_core::crypto::sha256;
use fido_audit_core::encoding::encode_b64url;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::{EncodePublicKey, LineEnding};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const ORIGIN: &str = "https://localhost:8443";
const CHALLENGE: &str = "Y2xpLWludGVncmF0aW9uLWNoYWxsZW5nZQ";
const CRED_ID: [u8; 4] = [0xca, 0xfe, 0xf0, 0x0d];

/// Get a Command for the fido-audit binary.
fn fido_audit() -> Command {
    Command::cargo_bin("fido-audit").unwrap()
}

fn key() -> SigningKey {
    SigningKey::from_bytes(&[11u8; 32].into()).unwrap()
}

fn client_data(ceremony_type: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": ceremony_type,
        "challenge": CHALLENGE,
        "origin": ORIGIN,
    }))
    .unwrap()
}

fn auth_data(flags: u8, counter: u32, with_credential: bool) -> Vec<u8> {
    let mut data = sha256("localhost").to_vec();
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    if with_credential {
        let point = key().verifying_key().to_encoded_point(false);
        let cose = Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (Value::Integer((-2).into()), Value::Bytes(point.x().unwrap().to_vec())),
            (Value::Integer((-3).into()), Value::Bytes(point.y().unwrap().to_vec())),
        ]);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&(CRED_ID.len() as u16).to_be_bytes());
        data.extend_from_slice(&CRED_ID);
        ciborium::into_writer(&cose, &mut data).unwrap();
    }
    data
}

fn registration_file(dir: &TempDir, flags: serde_json::Value) -> PathBuf {
    let object = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text("none".into())),
        (Value::Text("attStmt".into()), Value::Map(vec![])),
        (
            Value::Text("authData".into()),
            Value::Bytes(auth_data(0x41, 0, true)),
        ),
    ]);
    let mut attestation = Vec::new();
    ciborium::into_writer(&object, &mut attestation).unwrap();

    let body = json!({
        "request": {
            "id": encode_b64url(CRED_ID),
            "response": {
                "clientDataJSON": encode_b64url(client_data("webauthn.create")),
                "attestationObject": encode_b64url(attestation),
            },
        },
        "expectations": {
            "origin": ORIGIN,
            "challenge": CHALLENGE,
            "flags": flags,
        },
    });
    let path = dir.path().join("registration.json");
    fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    path
}

fn assertion_file(dir: &TempDir, prev_counter: u64) -> PathBuf {
    let client = client_data("webauthn.get");
    let auth = auth_data(0x01, 42, false);
    let mut signed = auth.clone();
    signed.extend_from_slice(&sha256(&client));
    let signature: Signature = key().sign(&signed);

    let body = json!({
        "request": {
            "id": encode_b64url(CRED_ID),
            "response": {
                "clientDataJSON": encode_b64url(client),
                "authenticatorData": encode_b64url(auth),
                "signature": encode_b64url(signature.to_der().as_bytes()),
            },
        },
        "expectations": {
            "origin": ORIGIN,
            "challenge": CHALLENGE,
            "flags": ["UP"],
            "counter": 42,
            "prevCounter": prev_counter,
            "publicKey": key().verifying_key().to_public_key_pem(LineEnding::LF).unwrap(),
        },
    });
    let path = dir.path().join("assertion.json");
    fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    fido_audit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Audited WebAuthn/FIDO2 ceremony verification",
        ))
        .stdout(predicate::str::contains("registration"))
        .stdout(predicate::str::contains("assertion"));
}

#[test]
fn test_version_displays_version() {
    fido_audit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fido-audit"));
}

#[test]
fn test_help_shows_exit_codes() {
    fido_audit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_registration_help_shows_options() {
    fido_audit()
        .args(["registration", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FILE"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--reject-rfu"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    fido_audit()
        .args(["registration", "nonexistent_ceremony.json"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read ceremony file"));
}

#[test]
fn test_unparseable_file_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("garbage.json");
    fs::write(&path, [0xff, 0xff, 0xff]).unwrap();

    fido_audit()
        .args(["assertion", path.to_str().unwrap()])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to parse ceremony file"));
}

#[test]
fn test_bad_expectations_return_usage_error() {
    let temp = TempDir::new().unwrap();
    let path = registration_file(&temp, json!("UP"));

    // Exit code 64 = EX_USAGE
    fido_audit()
        .args(["registration", path.to_str().unwrap()])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("expected flags should be of type Array"));
}

// ============================================================================
// Ceremony Tests
// ============================================================================

#[test]
fn test_registration_verifies() {
    let temp = TempDir::new().unwrap();
    let path = registration_file(&temp, json!(["UP-or-UV", "AT"]));

    fido_audit()
        .args(["registration", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("VERIFIED"))
        .stdout(predicate::str::contains("none"))
        .stdout(predicate::str::contains("BEGIN PUBLIC KEY"));
}

#[test]
fn test_registration_json_report() {
    let temp = TempDir::new().unwrap();
    let path = registration_file(&temp, json!(["UP-or-UV", "AT"]));

    let output = fido_audit()
        .args(["registration", "--json", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ceremony"], "registration");
    assert_eq!(report["verified"], true);
    assert_eq!(report["audit"]["complete"], true);
    assert!(report["audit"]["journal"]
        .as_array()
        .unwrap()
        .contains(&json!("fmt")));
}

#[test]
fn test_registration_missing_flag_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = registration_file(&temp, json!(["UV", "AT"]));

    // Exit code 65 = EX_DATAERR
    fido_audit()
        .args(["registration", path.to_str().unwrap()])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("REJECTED"))
        .stdout(predicate::str::contains("MISMATCH_ERROR"));
}

#[test]
fn test_assertion_verifies_quietly() {
    let temp = TempDir::new().unwrap();
    let path = assertion_file(&temp, 41);

    fido_audit()
        .args(["assertion", "--quiet", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_assertion_counter_rollback() {
    let temp = TempDir::new().unwrap();
    let path = assertion_file(&temp, 42);

    let output = fido_audit()
        .args(["assertion", "--json", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(65));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["verified"], false);
    assert_eq!(report["error"]["code"], "MISMATCH_ERROR");
    assert!(report["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("counter rollback detected"));
}

#[test]
fn test_registration_file_fed_to_assertion() {
    let temp = TempDir::new().unwrap();
    let path = registration_file(&temp, json!(["UP-or-UV", "AT"]));

    fido_audit()
        .args(["assertion", path.to_str().unwrap()])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("expectation did not contain value for"));
}
