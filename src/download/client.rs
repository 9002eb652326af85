//! HTTP client wrapper for fetching catalog documents and artifacts.
//!
//! This module provides the `HttpClient` struct which handles in-memory and
//! streaming downloads with timeout configuration and error mapping.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, default_user_agent};
use super::error::DownloadError;
use super::fetcher::Fetcher;
use crate::fsutil::partial_path;

/// HTTP client for fetching documents with streaming support.
///
/// This client is designed to be created once and reused for every fetch of
/// a run, taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use ctanmirror_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let bytes = client
///     .download_to_file("https://mirrors.ctan.org/graphics/pgf/doc/pgfmanual.pdf", Path::new("./pgf.pdf"))
///     .await?;
/// println!("Downloaded {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large PDFs)
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, DownloadError> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the builder rejects the configuration.
    #[instrument(level = "debug")]
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .map_err(DownloadError::client)?;
        Ok(Self { client })
    }

    /// Fetches a document fully into memory.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, the
    /// server answers with a non-success status, or the body is cut short.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.send(url).await?;
        let expected = declared_length(&response);
        let body = response.bytes().await.map_err(|e| map_reqwest_error(url, e))?;
        let actual = body.len() as u64;
        if let Some(expected) = expected
            && expected != actual
        {
            return Err(DownloadError::integrity(url, expected, actual));
        }
        debug!(bytes = actual, "fetched document");
        Ok(body.to_vec())
    }

    /// Streams a document to `dest`.
    ///
    /// The body is written to a hidden `.part` sibling first and renamed over
    /// `dest` only when complete, so an interrupted download never replaces a
    /// good file. The parent directory is created when missing.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - The body is shorter or longer than its declared Content-Length
    /// - Writing to disk fails
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let response = self.send(url).await?;
        let expected = declared_length(&response);
        let part = partial_path(dest);

        let mut file = File::create(&part)
            .await
            .map_err(|e| DownloadError::io(&part, e))?;
        let streamed = stream_to_file(&mut file, response, url, &part).await;
        drop(file);

        let result = match streamed {
            Ok(written) => match expected {
                Some(expected) if expected != written => {
                    Err(DownloadError::integrity(dest, expected, written))
                }
                _ => tokio::fs::rename(&part, dest)
                    .await
                    .map(|()| written)
                    .map_err(|e| DownloadError::io(dest, e)),
            },
            Err(error) => Err(error),
        };

        match &result {
            Ok(bytes) => info!(bytes, "download complete"),
            Err(_) => {
                debug!(path = %part.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part).await;
            }
        }
        result
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                response.status().as_u16(),
                retry_after,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.get_bytes(url).await
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.download_to_file(url, dest).await
    }
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Content-Length of an uncompressed response, if the server declared one.
fn declared_length(response: &reqwest::Response) -> Option<u64> {
    if response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .is_some()
    {
        return None;
    }
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| map_reqwest_error(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
