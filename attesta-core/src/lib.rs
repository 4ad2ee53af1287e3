//! Attesta Core - WebAuthn relying-party attestation verification
//!
//! This crate implements the server side of the WebAuthn registration
//! ceremony: decoding the authenticator's attestation object, verifying its
//! attestation statement, and establishing trust in the authenticator through
//! certificate chains and the FIDO metadata service.
//!
//! # Features
//!
//! - Canonical CBOR codec (no indefinite lengths, canonical map ordering)
//! - `none`, `packed`, `fido-u2f` and `android-key` attestation formats
//! - X.509 chain validation pinned to exact root certificates
//! - FIDO metadata service TOC verification with TOC and statement caching
//!
//! # Example
//!
//! ```no_run
//! use attesta_core::{ByteBuffer, RegistrationVerifier};
//!
//! # async fn example(attestation_object: Vec<u8>, client_data_hash: [u8; 32]) -> attesta_core::Result<()> {
//! let verifier = RegistrationVerifier::default();
//! let result = verifier
//!     .verify(&ByteBuffer::new(attestation_object), &client_data_hash)
//!     .await?;
//!
//! println!(
//!     "{} attestation ({}), trusted: {}",
//!     result.format,
//!     result.verification_result.attestation_type(),
//!     result.trusted
//! );
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod auth_data;
pub mod bytes;
pub mod cbor;
pub mod clock;
pub mod cose;
pub mod error;
pub mod metadata;
pub mod pki;
pub mod registration;
pub mod remote;

// Re-export main types for convenience
pub use attestation::{
    AttestationFormatRegistry, AttestationObject, AttestationStatement, AttestationType,
    VerificationResult,
};
pub use auth_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};
pub use bytes::{ByteBuffer, ByteBufferError};
pub use cbor::{CborError, CborMap, CborValue};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cose::{CoseAlgorithm, CoseKey};
pub use error::{AttestaError, ErrorCategory, Result};
pub use metadata::{
    AuthenticatorIdentifier, MemoryCachePool, MetadataLookup, MetadataProvider,
    MetadataServiceProvider, MetadataServiceSource, MetadataStatement,
};
pub use pki::{Certificate, ChainValidator, X509ChainValidator};
pub use registration::{RegistrationResult, RegistrationVerifier};
pub use remote::{DownloadedFile, Downloader};

#[cfg(feature = "network")]
pub use remote::{HttpDownloader, HttpDownloaderConfig};
