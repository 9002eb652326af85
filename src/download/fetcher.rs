//! The transport seam between retrieval and the network.

use std::path::Path;

use async_trait::async_trait;

use super::DownloadError;

/// Something that can fetch remote documents.
///
/// [`HttpClient`](super::HttpClient) is the production implementation; tests
/// substitute scripted fetchers to drive failure paths without a network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a document into memory.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing the failed attempt. Callers
    /// decide whether to retry.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError>;

    /// Fetches a document into `dest`, returning the number of bytes written.
    ///
    /// Implementations must never leave a partial file at `dest`: either the
    /// whole document is there afterwards, or the previous content (if any) is.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing the failed attempt.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;

    /// Fetches a document and decodes it as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidEncoding`] if the body is not UTF-8, or
    /// any error from [`fetch_bytes`](Self::fetch_bytes).
    async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let bytes = self.fetch_bytes(url).await?;
        String::from_utf8(bytes).map_err(|_| DownloadError::invalid_encoding(url))
    }
}
