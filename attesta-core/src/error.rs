use thiserror::Error;

use crate::bytes::ByteBufferError;
use crate::cbor::CborError;

/// Broad failure classes callers can act on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad CBOR bytes, bad statement shape, bad PEM/DER.
    MalformedInput,
    /// Indefinite-length CBOR, reserved values, unknown algorithms or formats.
    UnsupportedFeature,
    /// Signature, extension binding or authenticator status rejected the registration.
    VerificationFailure,
    /// Metadata TOC could not be trusted or resolved.
    TrustResolutionFailure,
    /// A remote resource could not be downloaded, or the cache failed.
    FetchFailure,
}

#[derive(Error, Debug)]
pub enum AttestaError {
    #[error("CBOR error: {0}")]
    Cbor(#[from] CborError),

    #[error("Byte buffer error: {0}")]
    ByteBuffer(#[from] ByteBufferError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid certificate: {0}")]
    Certificate(String),

    #[error("Unsupported COSE algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    #[error("Unsupported attestation format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Trust resolution failed: {0}")]
    TrustResolution(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AttestaError>,
    },
}

impl AttestaError {
    /// Wrap this error with the name of the layer it crossed.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root_cause(&self) -> &AttestaError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cbor(e) if e.is_unsupported() => ErrorCategory::UnsupportedFeature,
            Self::Cbor(_)
            | Self::ByteBuffer(_)
            | Self::Parse(_)
            | Self::Certificate(_)
            | Self::OpenSsl(_) => ErrorCategory::MalformedInput,
            Self::UnsupportedAlgorithm(_) | Self::UnsupportedFormat(_) | Self::UnsupportedKey(_) => {
                ErrorCategory::UnsupportedFeature
            }
            Self::VerificationFailed(_) => ErrorCategory::VerificationFailure,
            Self::TrustResolution(_) => ErrorCategory::TrustResolutionFailure,
            Self::Fetch(_) | Self::Cache(_) => ErrorCategory::FetchFailure,
            #[cfg(feature = "network")]
            Self::HttpError(_) => ErrorCategory::FetchFailure,
            Self::Context { source, .. } => source.category(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttestaError>;

/// Attach layer context to any error convertible into [`AttestaError`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<AttestaError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}
