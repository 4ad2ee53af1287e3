use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::cache::{CachePool, StatementCache, TocCache};
use super::source::{MetadataServiceConfig, MetadataServiceSource};
use super::statement::MetadataStatement;
use super::toc::MetadataToc;
use super::AuthenticatorIdentifier;
use crate::clock::{Clock, SystemClock};
use crate::error::{AttestaError, Result, ResultExt};
use crate::pki::{verify_x5c_jws, Certificate, ChainValidator, X509ChainValidator};
use crate::remote::Downloader;

/// Resolves authenticator models to their metadata statements.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` when no trustworthy statement is available. Errors are
    /// reserved for failures that make the trust source itself unusable.
    async fn get_metadata(
        &self,
        identifier: &AuthenticatorIdentifier,
    ) -> Result<Option<MetadataStatement>>;
}

/// Outcome of a metadata lookup, with the reason when nothing was found.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataLookup {
    Found(Box<MetadataStatement>),
    /// The TOC has no entry for the identifier.
    NotListed,
    /// The entry has no statement URL or hash.
    NoStatement,
    /// The downloaded statement did not match the hash in the TOC.
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

impl MetadataLookup {
    pub fn into_statement(self) -> Option<MetadataStatement> {
        match self {
            Self::Found(statement) => Some(*statement),
            _ => None,
        }
    }
}

/// [`MetadataProvider`] backed by a signed TOC from a FIDO metadata service.
pub struct MetadataServiceProvider {
    source: MetadataServiceSource,
    root: Certificate,
    downloader: Arc<dyn Downloader>,
    pool: Arc<dyn CachePool>,
    toc_cache: TocCache,
    statement_cache: StatementCache,
    chain_validator: Arc<dyn ChainValidator>,
    clock: Arc<dyn Clock>,
    config: MetadataServiceConfig,
}

impl fmt::Debug for MetadataServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataServiceProvider")
            .field("source", &self.source)
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetadataServiceProvider {
    /// Fails if the source's root certificate cannot be parsed.
    pub fn new(
        source: MetadataServiceSource,
        downloader: Arc<dyn Downloader>,
        pool: Arc<dyn CachePool>,
    ) -> Result<Self> {
        let root = Certificate::from_pem(&source.root_cert_pem).context("metadata root certificate")?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = MetadataServiceConfig::default();
        Ok(Self {
            toc_cache: TocCache::new(pool.clone(), clock.clone()),
            statement_cache: StatementCache::new(pool.clone(), config.statement_cache_ttl),
            source,
            root,
            downloader,
            pool,
            chain_validator: Arc::new(X509ChainValidator::new()),
            clock,
            config,
        })
    }

    pub fn with_chain_validator(mut self, validator: Arc<dyn ChainValidator>) -> Self {
        self.chain_validator = validator;
        self
    }

    /// Time source for TOC freshness and for the validity periods of the
    /// TOC signing chain.
    ///
    /// Installs an [`X509ChainValidator`] on `clock`; a validator set with
    /// [`with_chain_validator`](Self::with_chain_validator) afterwards wins.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.toc_cache = TocCache::new(self.pool.clone(), clock.clone());
        self.chain_validator = Arc::new(X509ChainValidator::with_clock(clock.clone()));
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: MetadataServiceConfig) -> Self {
        self.statement_cache = StatementCache::new(self.pool.clone(), config.statement_cache_ttl);
        self.config = config;
        self
    }

    pub fn source(&self) -> &MetadataServiceSource {
        &self.source
    }

    /// `url` with the access token appended, if it points at the TOC host.
    ///
    /// The token is never sent to any other host.
    pub fn token_url(&self, url: &str) -> String {
        let Some(token) = self.source.access_token.as_deref() else {
            return url.to_string();
        };
        let main_host = Url::parse(&self.source.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        let Ok(mut target) = Url::parse(url) else {
            return url.to_string();
        };
        let same_host = matches!(
            (main_host, target.host_str()),
            (Some(main), Some(host)) if main.eq_ignore_ascii_case(host)
        );
        if !same_host {
            return url.to_string();
        }
        target.query_pairs_mut().append_pair("token", token);
        target.into()
    }

    /// The current TOC, from cache while it is before its `nextUpdate`.
    pub async fn toc(&self) -> Result<MetadataToc> {
        let url = self.token_url(&self.source.url);

        if let Some(toc) = self.toc_cache.get(&url).await? {
            debug!(no = toc.no, "Using cached metadata TOC");
            return Ok(toc);
        }

        let toc = self.download_toc(&url).await?;
        if !toc.is_fresh_at(self.clock.now()) {
            warn!(no = toc.no, next_update = %toc.next_update, "Downloaded metadata TOC is already past its nextUpdate");
        }
        info!(
            no = toc.no,
            next_update = %toc.next_update,
            entries = toc.entries.len(),
            "Metadata TOC refreshed"
        );
        self.toc_cache.put(&url, &toc).await?;
        Ok(toc)
    }

    async fn download_toc(&self, url: &str) -> Result<MetadataToc> {
        let file = self
            .downloader
            .download_file(url)
            .await
            .context("metadata TOC download")?;

        let media_type = file.media_type();
        if !self
            .config
            .accepted_toc_content_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(&media_type))
        {
            return Err(AttestaError::TrustResolution(format!(
                "Unexpected metadata TOC content type '{}'",
                file.content_type
            )));
        }

        let token = std::str::from_utf8(&file.data)
            .map_err(|_| AttestaError::Parse("Metadata TOC is not a compact JWS".into()))?;
        let jws = verify_x5c_jws::<serde_json::Value>(token).context("metadata TOC")?;

        if !self.chain_validator.validate_chain(&self.root, &jws.chain) {
            return Err(AttestaError::TrustResolution(
                "Failed to verify x5c chain of metadata TOC".into(),
            ));
        }
        debug!(algorithm = ?jws.algorithm, chain_len = jws.chain.len(), "Metadata TOC signature verified");

        serde_json::from_value(jws.claims)
            .map_err(|e| AttestaError::Parse(format!("Invalid metadata TOC: {e}")))
    }

    /// Like [`get_metadata`](MetadataProvider::get_metadata), but says why
    /// nothing was found.
    #[instrument(skip(self, identifier), fields(identifier = %identifier))]
    pub async fn lookup(&self, identifier: &AuthenticatorIdentifier) -> Result<MetadataLookup> {
        let toc = self.toc().await?;
        let Some(entry) = toc.find_entry(identifier) else {
            debug!("Authenticator not listed in metadata TOC");
            return Ok(MetadataLookup::NotListed);
        };
        let (Some(url), Some(hash)) = (entry.url.as_deref(), entry.hash_bytes()?) else {
            debug!("TOC entry has no metadata statement");
            return Ok(MetadataLookup::NoStatement);
        };

        let data = match self.statement_cache.get(hash.as_slice()).await? {
            Some(data) => data,
            None => {
                let file = self
                    .downloader
                    .download_file(&self.token_url(url))
                    .await
                    .context("metadata statement download")?;
                let actual = Sha256::digest(&file.data);
                if !hash.equals_constant_time(&actual) {
                    let expected = hash.to_hex();
                    let actual = hex::encode(actual);
                    warn!(url, %expected, %actual, "Metadata statement hash mismatch");
                    return Ok(MetadataLookup::HashMismatch {
                        url: url.to_string(),
                        expected,
                        actual,
                    });
                }
                self.statement_cache
                    .put(hash.as_slice(), file.data.clone())
                    .await?;
                file.data
            }
        };

        let statement = MetadataStatement::from_base64url(&data)
            .context("metadata statement")?
            .with_status_reports(entry.status_reports.clone());
        debug!(description = %statement.description, "Metadata statement resolved");
        Ok(MetadataLookup::Found(Box::new(statement)))
    }
}

#[async_trait]
impl MetadataProvider for MetadataServiceProvider {
    async fn get_metadata(
        &self,
        identifier: &AuthenticatorIdentifier,
    ) -> Result<Option<MetadataStatement>> {
        Ok(self.lookup(identifier).await?.into_statement())
    }
}
