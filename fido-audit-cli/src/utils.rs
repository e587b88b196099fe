//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ciborium::Value;
use fido_audit_core::encoding::map_get;
use tracing::debug;

/// A ceremony file: the raw credential response plus the relying party's
/// expectations for it.
///
/// ```json
/// { "request": { "id": "...", "response": { ... } }, "expectations": { ... } }
/// ```
///
/// Binary response fields are base64url strings in JSON and byte strings in
/// CBOR.
#[derive(Debug)]
pub struct CeremonyFile {
    pub request: Value,
    pub expectations: serde_json::Value,
}

/// Load and parse a ceremony file, trying JSON first then CBOR.
pub fn load_ceremony(path: &Path) -> Result<CeremonyFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read ceremony file: {}", path.display()))?;

    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        debug!(format = "json", "Parsed ceremony file");
        from_json(json)
    } else if let Ok(cbor) = ciborium::from_reader::<Value, _>(bytes.as_slice()) {
        debug!(format = "cbor", "Parsed ceremony file");
        from_cbor(&cbor)
    } else {
        bail!("Failed to parse ceremony file (tried JSON and CBOR)");
    }
}

fn from_json(mut json: serde_json::Value) -> Result<CeremonyFile> {
    let Some(object) = json.as_object_mut() else {
        bail!("Failed to parse ceremony file: expected an object");
    };
    let request = object
        .remove("request")
        .context("Failed to parse ceremony file: missing 'request'")?;
    let expectations = object
        .remove("expectations")
        .context("Failed to parse ceremony file: missing 'expectations'")?;

    Ok(CeremonyFile {
        request: Value::serialized(&request)
            .context("Failed to parse ceremony file: request is not representable")?,
        expectations,
    })
}

fn from_cbor(cbor: &Value) -> Result<CeremonyFile> {
    if !cbor.is_map() {
        bail!("Failed to parse ceremony file: expected a map");
    }
    let request = map_get(cbor, "request")
        .context("Failed to parse ceremony file: missing 'request'")?
        .clone();
    let expectations = map_get(cbor, "expectations")
        .context("Failed to parse ceremony file: missing 'expectations'")?
        .deserialized::<serde_json::Value>()
        .context("Failed to parse ceremony file: expectations must be JSON-compatible")?;

    Ok(CeremonyFile {
        request,
        expectations,
    })
}
