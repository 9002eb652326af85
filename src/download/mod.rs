//! Retrieval of the remote package index, metadata documents and PDFs.
//!
//! # Features
//!
//! - Streaming downloads written through a `.part` file and a rename
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Bounded retries with exponential backoff, jitter and Retry-After
//! - Structured error types with full context
//! - A [`Fetcher`] seam so retrieval can run against scripted transports
//!
//! # Example
//!
//! ```no_run
//! use ctanmirror_core::download::{Fetcher, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let index = client.fetch_text("https://www.ctan.org/xml/2.0/packages").await?;
//! println!("index is {} bytes", index.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod fetcher;
mod filename;
mod retry;

pub use client::HttpClient;
pub use engine::{
    ArtifactOutcome, ArtifactState, DEFAULT_CATALOG_BASE, DEFAULT_MIRROR_BASE, EngineError,
    FetchFailure, RetrievalEngine, RetrievalOptions, RetrievalReport, RetrievalStats,
};
pub use error::DownloadError;
pub use fetcher::Fetcher;
pub use filename::artifact_file_name;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
pub(crate) use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

// Note: no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
