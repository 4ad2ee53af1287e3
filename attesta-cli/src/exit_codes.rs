//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts a stable way to tell a rejected attestation
//! apart from a missing file or an unreachable metadata service.

use attesta_core::{AttestaError, ErrorCategory};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Data format error (malformed, unsupported or rejected attestation).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Metadata service unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Attestation verified but does not chain to any trusted root.
/// Maps to EX_NOPERM from sysexits.h.
pub const UNTRUSTED: i32 = 77;

/// Missing or invalid configuration (environment variables).
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let category = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<AttestaError>())
            .map(AttestaError::category);

        // Classify by library error category first, then by message
        let code = if message.contains("environment variable not set") {
            CONFIG_ERROR
        } else if let Some(category) = category {
            code_for(category)
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("not trusted") {
            UNTRUSTED
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

pub fn code_for(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::MalformedInput
        | ErrorCategory::UnsupportedFeature
        | ErrorCategory::VerificationFailure
        | ErrorCategory::TrustResolutionFailure => VERIFICATION_FAILED,
        ErrorCategory::FetchFailure => NETWORK_ERROR,
    }
}
