//! HTTP downloader with retry, backoff, and TLS enforcement.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::{debug, instrument, warn};

use super::{DownloadedFile, Downloader};
use crate::error::{AttestaError, Result};

/// Configuration for [`HttpDownloader`].
#[derive(Debug, Clone)]
pub struct HttpDownloaderConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Retry budget: retrying stops once `timeout * max_retries` has elapsed.
    pub max_retries: u32,
    /// First backoff delay.
    pub initial_interval: Duration,
    /// Backoff delay cap.
    pub max_interval: Duration,
    /// Permit plain `http://` URLs (local mirrors, tests).
    pub allow_http: bool,
}

impl Default for HttpDownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            allow_http: false,
        }
    }
}

/// [`Downloader`] backed by reqwest.
pub struct HttpDownloader {
    client: Client,
    config: HttpDownloaderConfig,
}

impl HttpDownloader {
    pub fn new(config: HttpDownloaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(!config.allow_http)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()
            .map_err(|e| AttestaError::Fetch(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn fetch_once(
        &self,
        url: &str,
    ) -> std::result::Result<DownloadedFile, backoff::Error<AttestaError>> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(AttestaError::Fetch(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(AttestaError::HttpError(e))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let latency_ms = start.elapsed().as_millis() as u64;
            let err = AttestaError::Fetch(format!("Server returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, latency_ms, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let data = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            backoff::Error::transient(AttestaError::Fetch(format!("Failed to read body: {e}")))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = data.len(),
            "Download completed"
        );

        Ok(DownloadedFile {
            data: data.to_vec(),
            content_type,
        })
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    #[instrument(skip(self, url), fields(host = %host_of(url)))]
    async fn download_file(&self, url: &str) -> Result<DownloadedFile> {
        retry_notify(
            self.build_backoff(),
            || async move { self.fetch_once(url).await },
            |err: AttestaError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }
}

/// Host part only; download URLs can carry an access token in the query.
fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Timeouts, refused connections and requests cut off mid-send are retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Statuses a metadata mirror answers with while overloaded or redeploying.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
