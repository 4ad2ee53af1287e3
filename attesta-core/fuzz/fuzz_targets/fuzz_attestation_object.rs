#![no_main]

//! Fuzz target for attestation object parsing
//!
//! Runs arbitrary bytes through the attestation object parser and, when that
//! succeeds, through the format registry's statement parser and verifier.
//!
//! Run with: cargo +nightly fuzz run fuzz_attestation_object

use attesta_core::{AttestationFormatRegistry, AttestationObject, ByteBuffer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(object) = AttestationObject::parse(&ByteBuffer::new(data)) {
        let registry = AttestationFormatRegistry::new();
        let _ = registry.verify(&object, &[0u8; 32]);
    }
});
