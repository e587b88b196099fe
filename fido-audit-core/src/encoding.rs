//! base64url handling and helpers over the loosely-typed request value.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use ciborium::Value;

/// URL-safe, unpadded, tolerant of non-zero trailing bits (browsers emit those).
pub const B64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Strip at most two trailing `=` and check the remainder is pure base64url.
///
/// Returns `None` for three or more trailing `=`, an `=` anywhere else, or any
/// character outside `[A-Za-z0-9_-]`.
pub fn normalize_b64url(input: &str) -> Option<&str> {
    let body = input.trim_end_matches('=');
    if input.len() - body.len() > 2 {
        return None;
    }
    body.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        .then_some(body)
}

/// Strict base64url decode (see [`normalize_b64url`]).
pub fn decode_b64url(input: &str) -> Option<Vec<u8>> {
    let body = normalize_b64url(input)?;
    B64URL.decode(body).ok()
}

pub fn encode_b64url(bytes: impl AsRef<[u8]>) -> String {
    B64URL.encode(bytes)
}

/// Decode a byte-carrying request field: raw bytes pass through, text is
/// base64url (strict) with a fallback to standard base64.
pub fn decode_payload(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Some(bytes.clone()),
        Value::Text(text) => {
            decode_b64url(text).or_else(|| STANDARD_LENIENT.decode(text.trim()).ok())
        }
        Value::Tag(_, inner) => decode_payload(inner),
        _ => None,
    }
}

/// The observed type of a request value, as reported in shape errors.
pub fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bytes(_)) => "buffer",
        Some(Value::Text(_)) => "string",
        Some(Value::Map(_)) => "object",
        Some(Value::Array(_)) => "array",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Integer(_)) | Some(Value::Float(_)) => "number",
        Some(Value::Tag(_, inner)) => type_name(Some(inner)),
        Some(_) => "unknown",
    }
}

/// Look up a text key in a CBOR map.
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
            .map(|(_, v)| v),
        _ => None,
    }
}

/// Look up an integer key in a CBOR map (COSE keys, attestation statements).
pub fn map_get_int(value: &Value, key: i64) -> Option<&Value> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
            .map(|(_, v)| v),
        _ => None,
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => i64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}
