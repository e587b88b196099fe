//! Exit codes following sysexits.h conventions.
//!
//! These codes let scripts and CI systems tell a rejected ceremony apart from
//! a malformed input file.

use fido_audit_core::VerifyError;

/// Successful execution, ceremony verified and audit complete.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// The expectations violate the caller contract.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The ceremony was rejected.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open or decode the ceremony file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first engine error in the chain, then by context
        let code = match err.chain().find_map(|e| e.downcast_ref::<VerifyError>()) {
            Some(VerifyError::Contract(_)) => USAGE_ERROR,
            Some(_) => VERIFICATION_FAILED,
            None if message.contains("Failed to read")
                || message.contains("Failed to parse ceremony file") =>
            {
                INPUT_ERROR
            }
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
