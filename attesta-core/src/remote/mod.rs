//! Fetching remote resources (metadata TOC and statements).

#[cfg(feature = "network")]
mod http;

#[cfg(feature = "network")]
pub use http::{is_transient_error, is_transient_status, HttpDownloader, HttpDownloaderConfig};

use async_trait::async_trait;

use crate::error::Result;

/// A downloaded body with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub data: Vec<u8>,
    /// `Content-Type` header, empty when absent.
    pub content_type: String,
}

impl DownloadedFile {
    /// Media type without parameters, lower-cased.
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Source of remote files. Failures are fatal to the lookup that needed the file.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download_file(&self, url: &str) -> Result<DownloadedFile>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_ignores_parameters() {
        let file = DownloadedFile {
            data: Vec::new(),
            content_type: "Application/JOSE; charset=utf-8".into(),
        };
        assert_eq!(file.media_type(), "application/jose");

        let file = DownloadedFile {
            data: Vec::new(),
            content_type: String::new(),
        };
        assert_eq!(file.media_type(), "");
    }
}
