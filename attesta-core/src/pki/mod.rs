//! Certificates, signature primitives and trust-chain validation.

mod certificate;
mod chain;
mod jws;
mod signature;

pub use certificate::{der_to_pem, Certificate};
pub use chain::{ChainValidator, X509ChainValidator};
pub use jws::{verify_x5c_jws, VerifiedJws};
pub use signature::verify_signature;
