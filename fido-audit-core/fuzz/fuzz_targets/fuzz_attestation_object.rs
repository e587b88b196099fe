#![no_main]

//! Fuzz target for parse_attestation_object()
//!
//! Arbitrary bytes are decoded as a CBOR attestation object. The parser
//! must reject anything without `fmt`/`authData` gracefully.
//!
//! Run with: cargo +nightly fuzz run fuzz_attestation_object

use fido_audit_core::parser::parse_attestation_object;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_attestation_object(data);
});
