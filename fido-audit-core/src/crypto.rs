//! Hashing, COSE key conversion and ES256 verification.
//!
//! Only EC2/P-256 credential keys (COSE alg -7) are handled.

use ciborium::Value;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{as_i64, encode_b64url, map_get_int};
use crate::error::{Result, VerifyError};

/// COSE algorithm identifier for ECDSA with SHA-256.
pub const COSE_ALG_ES256: i64 = -7;

const COSE_KEY_KTY: i64 = 1;
const COSE_KEY_ALG: i64 = 3;
const COSE_KEY_CRV: i64 = -1;
const COSE_KEY_X: i64 = -2;
const COSE_KEY_Y: i64 = -3;
const COSE_KTY_EC2: i64 = 2;
const COSE_CRV_P256: i64 = 1;

/// SHA-256 digest.
pub fn sha256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// A P-256 credential public key decoded from its COSE form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseEc2Key {
    pub alg: i64,
    pub x: [u8; 32],
    pub y: [u8; 32],
}

/// JSON Web Key form of a P-256 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl CoseEc2Key {
    pub fn from_cose(key: &Value) -> Result<Self> {
        if !matches!(key, Value::Map(_)) {
            return Err(VerifyError::crypto("COSE key is not a map"));
        }

        let int_param = |label: i64, name: &str| {
            map_get_int(key, label)
                .and_then(as_i64)
                .ok_or_else(|| VerifyError::crypto(format!("COSE key is missing '{name}'")))
        };
        let kty = int_param(COSE_KEY_KTY, "kty")?;
        let alg = int_param(COSE_KEY_ALG, "alg")?;
        let crv = int_param(COSE_KEY_CRV, "crv")?;

        if kty != COSE_KTY_EC2 {
            return Err(VerifyError::crypto(format!(
                "unsupported COSE key type: {kty}"
            )));
        }
        if alg != COSE_ALG_ES256 {
            return Err(VerifyError::crypto(format!(
                "unsupported COSE algorithm: {alg}"
            )));
        }
        if crv != COSE_CRV_P256 {
            return Err(VerifyError::crypto(format!("unsupported COSE curve: {crv}")));
        }

        let coordinate = |label: i64, name: &str| -> Result<[u8; 32]> {
            match map_get_int(key, label) {
                Some(Value::Bytes(b)) => b.as_slice().try_into().map_err(|_| {
                    VerifyError::crypto(format!("COSE key '{name}' coordinate is not 32 bytes"))
                }),
                _ => Err(VerifyError::crypto(format!("COSE key is missing '{name}'"))),
            }
        };

        Ok(Self {
            alg,
            x: coordinate(COSE_KEY_X, "x")?,
            y: coordinate(COSE_KEY_Y, "y")?,
        })
    }

    /// Uncompressed SEC1 point: `0x04 || x || y`.
    pub fn to_raw(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(65);
        raw.push(0x04);
        raw.extend_from_slice(&self.x);
        raw.extend_from_slice(&self.y);
        raw
    }

    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            alg: "ES256".to_string(),
            crv: "P-256".to_string(),
            x: encode_b64url(self.x),
            y: encode_b64url(self.y),
        }
    }

    /// Fails if the point is not on the curve.
    pub fn to_public_key(&self) -> Result<p256::PublicKey> {
        p256::PublicKey::from_sec1_bytes(&self.to_raw())
            .map_err(|e| VerifyError::crypto(format!("invalid P-256 point: {e}")))
    }

    /// SubjectPublicKeyInfo PEM.
    pub fn to_pem(&self) -> Result<String> {
        self.to_public_key()?
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| VerifyError::crypto(format!("PEM encoding failed: {e}")))
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        Ok(VerifyingKey::from(&self.to_public_key()?))
    }
}

/// Import a SubjectPublicKeyInfo PEM as a P-256 verifying key.
pub fn verifying_key_from_pem(pem: &str) -> Result<VerifyingKey> {
    let public_key = p256::PublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| VerifyError::crypto(format!("bad P-256 public key: {e}")))?;
    Ok(VerifyingKey::from(&public_key))
}

/// Import a SubjectPublicKeyInfo DER (e.g. from a certificate) as a P-256 verifying key.
pub fn verifying_key_from_spki_der(der: &[u8]) -> Result<VerifyingKey> {
    let public_key = p256::PublicKey::from_public_key_der(der)
        .map_err(|e| VerifyError::crypto(format!("bad P-256 public key: {e}")))?;
    Ok(VerifyingKey::from(&public_key))
}

/// Verify a DER-encoded ES256 signature over `message`.
pub fn verify_es256(key: &VerifyingKey, message: &[u8], der_signature: &[u8]) -> Result<()> {
    let signature = Signature::from_der(der_signature)
        .map_err(|e| VerifyError::crypto(format!("bad ES256 signature: {e}")))?;
    key.verify(message, &signature)
        .map_err(|_| VerifyError::crypto("signature verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32].into()).unwrap()
    }

    fn cose_for(key: &SigningKey) -> Value {
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

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_cose_key_conversions() {
        let key = signing_key();
        let cose = CoseEc2Key::from_cose(&cose_for(&key)).unwrap();

        let raw = cose.to_raw();
        assert_eq!(raw.len(), 65);
        assert_eq!(raw[0], 0x04);
        assert_eq!(
            raw,
            key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
        );

        let jwk = cose.to_jwk();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "P-256");
        assert_eq!(jwk.x.len(), 43);

        let pem = cose.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        let imported = verifying_key_from_pem(&pem).unwrap();
        assert_eq!(&imported, key.verifying_key());
    }

    #[test]
    fn test_cose_key_rejects_other_algorithms() {
        let mut cose = cose_for(&signing_key());
        if let Value::Map(entries) = &mut cose {
            entries[1].1 = Value::Integer((-257).into());
        }
        let err = CoseEc2Key::from_cose(&cose).unwrap_err();
        assert_eq!(err.to_string(), "crypto error: unsupported COSE algorithm: -257");
    }

    #[test]
    fn test_cose_key_rejects_off_curve_point() {
        let cose = CoseEc2Key {
            alg: COSE_ALG_ES256,
            x: [1u8; 32],
            y: [2u8; 32],
        };
        assert!(cose.to_pem().is_err());
    }

    #[test]
    fn test_es256_verify() {
        let key = signing_key();
        let message = b"authenticator data || client data hash";
        let signature: Signature = key.sign(message);
        let der = signature.to_der();

        assert!(verify_es256(key.verifying_key(), message, der.as_bytes()).is_ok());
        assert!(verify_es256(key.verifying_key(), b"tampered", der.as_bytes()).is_err());
        assert!(verify_es256(key.verifying_key(), message, &[0x30, 0x00]).is_err());
    }
}
