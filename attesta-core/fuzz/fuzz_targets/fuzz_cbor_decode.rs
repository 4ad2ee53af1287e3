#![no_main]

//! Fuzz target for the CBOR decoder
//!
//! Decoding arbitrary bytes must either succeed or return an error. A
//! successful decode must re-encode without panicking, and in-place decoding
//! must never report an end offset past the buffer.
//!
//! Run with: cargo +nightly fuzz run fuzz_cbor_decode

use attesta_core::cbor::{self, DecodeOptions};
use attesta_core::ByteBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let buf = ByteBuffer::new(data);

    if let Ok(value) = cbor::decode(&buf) {
        let _ = cbor::encode_value(&value);
        let _ = value.to_string();
    }
    let _ = cbor::decode_with(&buf, DecodeOptions::strict());

    if let Ok((_, end)) = cbor::decode_in_place(&buf, 0) {
        assert!(end <= buf.len());
    }
});
