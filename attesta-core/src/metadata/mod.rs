//! FIDO metadata service trust resolution.
//!
//! A signed TOC lists authenticator models with the location and SHA-256 of
//! their metadata statements. The TOC is trusted only after its JWS signature
//! and `x5c` chain check out against the configured root; a statement is
//! trusted only if its bytes hash to the value the TOC declares.

mod cache;
mod identifier;
mod provider;
mod source;
mod statement;
mod toc;

pub use cache::{CachePool, Expiry, MemoryCachePool, StatementCache, TocCache};
pub use identifier::AuthenticatorIdentifier;
pub use provider::{MetadataLookup, MetadataProvider, MetadataServiceProvider};
pub use source::{
    MetadataServiceConfig, MetadataServiceSource, DEFAULT_STATEMENT_CACHE_TTL,
    DEFAULT_TOC_CONTENT_TYPES,
};
pub use statement::MetadataStatement;
pub use toc::{AuthenticatorStatus, MetadataToc, StatusReport, TocEntry};
