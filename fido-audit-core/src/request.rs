//! Request shape checks.
//!
//! Runs before anything is decoded: only the presence and coarse type of the
//! top-level and `response.*` fields are examined.

use ciborium::Value;

use crate::audit::CeremonyKind;
use crate::encoding::{map_get, type_name};
use crate::error::{Result, VerifyError};

const BUFFER_OR_STRING: &str = "base64 String or ArrayBuffer";
const BUFFER_STRING_OR_UNDEFINED: &str = "base64 String, ArrayBuffer, or undefined";

const CREATE_RESPONSE_FIELDS: &[&str] = &["attestationObject", "clientDataJSON"];
const GET_RESPONSE_FIELDS: &[&str] = &["signature", "authenticatorData", "clientDataJSON"];

/// Check the ceremony payload has the shape `kind` requires.
pub fn validate_request_shape(kind: CeremonyKind, request: &Value) -> Result<()> {
    if !matches!(request, Value::Map(_)) {
        return Err(VerifyError::shape(
            "request",
            "Object",
            type_name(Some(request)),
        ));
    }

    let id = map_get(request, "id");
    if !matches!(id, Some(Value::Text(_))) {
        return Err(VerifyError::shape(
            "'id' field of request",
            "String",
            type_name(id),
        ));
    }

    let response = match map_get(request, "response") {
        Some(r @ Value::Map(_)) => r,
        other => {
            return Err(VerifyError::shape(
                "'response' field of request",
                "Object",
                type_name(other),
            ))
        }
    };

    let fields = match kind {
        CeremonyKind::Registration => CREATE_RESPONSE_FIELDS,
        CeremonyKind::Assertion => GET_RESPONSE_FIELDS,
    };
    for name in fields {
        let value = map_get(response, name);
        if !is_buffer_or_string(value) {
            return Err(VerifyError::shape(
                format!("'response.{name}'"),
                BUFFER_OR_STRING,
                type_name(value),
            ));
        }
    }

    if kind == CeremonyKind::Assertion {
        let value = map_get(response, "userHandle");
        let absent = matches!(value, None | Some(Value::Null));
        if !absent && !is_buffer_or_string(value) {
            return Err(VerifyError::shape(
                "'response.userHandle'",
                BUFFER_STRING_OR_UNDEFINED,
                type_name(value),
            ));
        }
    }

    Ok(())
}

fn is_buffer_or_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bytes(_)) | Some(Value::Text(_)))
}
