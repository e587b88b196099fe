#![no_main]

//! Fuzz target for parse_authenticator_data()
//!
//! Exercises the fixed header, attested credential data and the embedded
//! COSE key / extension CBOR. Truncated or oversized input must come back as
//! an error, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_authenticator_data

use fido_audit_core::parser::parse_authenticator_data;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parsed) = parse_authenticator_data(data) {
        // A successful parse always keeps the exact bytes it was given
        assert_eq!(parsed.raw_authnr_data.as_deref(), Some(data));
        if let Some(cred_id) = &parsed.cred_id {
            assert_eq!(parsed.cred_id_len.map(usize::from), Some(cred_id.len()));
        }
    }
});
