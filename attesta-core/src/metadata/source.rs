use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{AttestaError, Result};

/// Content types a TOC download may declare.
pub const DEFAULT_TOC_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "application/jose"];

/// Content-addressed statements never change, but are refreshed daily anyway.
pub const DEFAULT_STATEMENT_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Where the metadata TOC lives and how to trust it.
#[derive(Clone)]
pub struct MetadataServiceSource {
    /// TOC endpoint.
    pub url: String,
    /// PEM of the root certificate the TOC signing chain must end in.
    pub root_cert_pem: String,
    /// Appended as `?token=` to requests for the TOC host only.
    pub access_token: Option<String>,
}

impl fmt::Debug for MetadataServiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataServiceSource")
            .field("url", &self.url)
            .field("root_cert_pem", &format!("{} bytes", self.root_cert_pem.len()))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl MetadataServiceSource {
    pub fn new(url: impl Into<String>, root_cert_pem: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            root_cert_pem: root_cert_pem.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Create a source from environment variables.
    ///
    /// Required: `MDS_URL`, and the root certificate as either
    /// - `MDS_ROOT_CERT_PEM` - Base64-encoded PEM content (takes precedence)
    /// - `MDS_ROOT_CERT` - Path to a PEM file
    ///
    /// Optional: `MDS_ACCESS_TOKEN`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("MDS_URL")
            .map_err(|_| AttestaError::TrustResolution("MDS_URL environment variable not set".into()))?;

        let root_cert_pem = if let Ok(pem_b64) = std::env::var("MDS_ROOT_CERT_PEM") {
            let pem = STANDARD
                .decode(pem_b64.trim())
                .map_err(|e| AttestaError::Certificate(format!("Invalid base64 root cert: {e}")))?;
            String::from_utf8(pem)
                .map_err(|_| AttestaError::Certificate("Root cert PEM is not UTF-8".into()))?
        } else {
            let path = std::env::var("MDS_ROOT_CERT").map_err(|_| {
                AttestaError::TrustResolution(
                    "MDS_ROOT_CERT or MDS_ROOT_CERT_PEM environment variable not set".into(),
                )
            })?;
            std::fs::read_to_string(&path).map_err(|e| {
                AttestaError::Certificate(format!("Failed to read root cert {path}: {e}"))
            })?
        };

        let access_token = std::env::var("MDS_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Ok(Self {
            url,
            root_cert_pem,
            access_token,
        })
    }
}

/// Tunables for [`MetadataServiceProvider`](super::MetadataServiceProvider).
#[derive(Debug, Clone)]
pub struct MetadataServiceConfig {
    pub statement_cache_ttl: Duration,
    /// Compared case-insensitively, ignoring media type parameters.
    pub accepted_toc_content_types: Vec<String>,
}

impl Default for MetadataServiceConfig {
    fn default() -> Self {
        Self {
            statement_cache_ttl: DEFAULT_STATEMENT_CACHE_TTL,
            accepted_toc_content_types: DEFAULT_TOC_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
