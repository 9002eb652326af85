//! Selective retrieval of catalog artifacts with retry support.
//!
//! The [`RetrievalEngine`] fetches the remote package index and, for the
//! records of a [`Selection`], their metadata documents and (optionally)
//! documentation PDFs. Each artifact runs through its own small state
//! machine:
//!
//! ```text
//! Pending ──> Cached
//!    │
//!    ├──> Fetching ──> Fetched
//!    │       │  ▲
//!    │       ▼  │
//!    │   FailedRetryable
//!    │       │
//!    │       ▼
//!    │   FailedTerminal
//!    ├──> SkippedLimit
//!    └──> Cancelled
//! ```
//!
//! A failure only ever affects its own artifact; the run always continues
//! with the next one. Work is strictly sequential.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ctanmirror_core::catalog::CatalogStore;
//! use ctanmirror_core::download::{HttpClient, RetrievalEngine, RetrievalOptions, RetryPolicy};
//! use ctanmirror_core::filter::{select, FilterPredicates};
//! use ctanmirror_core::CancelFlag;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RetrievalEngine::new(
//!     Arc::new(HttpClient::new()?),
//!     RetryPolicy::default(),
//!     RetrievalOptions::new("./mirror"),
//! );
//! let index = engine.fetch_index().await?;
//! let (mut store, _) = CatalogStore::regenerate(&index, "https://www.ctan.org/xml/2.0", "./mirror/xml".as_ref());
//! let selection = select(&store, &FilterPredicates::all());
//! let report = engine.retrieve(&selection, &mut store, &CancelFlag::new()).await;
//! println!("fetched {}, failed {}", report.stats.fetched, report.stats.failed);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use super::filename::artifact_file_name;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::{DownloadError, Fetcher};
use crate::cancel::CancelFlag;
use crate::catalog::{CatalogError, CatalogStore, RemoteIndex};
use crate::filter::Selection;
use crate::record::{DocumentKind, DocumentRef, ParseError, RawMetadata, Record};

/// Default CTAN catalog base URL.
pub const DEFAULT_CATALOG_BASE: &str = "https://www.ctan.org/xml/2.0";

/// Default CTAN mirror used to resolve `ctan:` locators.
pub const DEFAULT_MIRROR_BASE: &str = "https://mirrors.ctan.org";

/// Error type for retrieval operations that are not per-artifact.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The package index could not be fetched within the retry budget.
    #[error("failed to fetch package index after {attempts} attempt(s): {source}")]
    IndexFetch {
        /// Attempts made.
        attempts: u32,
        /// Last error.
        #[source]
        source: DownloadError,
    },

    /// The package index was fetched but could not be parsed.
    #[error(transparent)]
    IndexParse(#[from] CatalogError),
}

/// State of one artifact during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Not looked at yet.
    Pending,
    /// Already present locally; not fetched.
    Cached,
    /// A fetch attempt is in flight.
    Fetching,
    /// Fetched and stored.
    Fetched,
    /// An attempt failed; another one will follow.
    FailedRetryable,
    /// Retries exhausted or the failure is permanent.
    FailedTerminal,
    /// Not fetched because the download budget was used up.
    SkippedLimit,
    /// Not fetched because the run was cancelled.
    Cancelled,
}

impl ArtifactState {
    /// Returns true when no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cached | Self::Fetched | Self::FailedTerminal | Self::SkippedLimit | Self::Cancelled
        )
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Cached | Self::Fetching | Self::SkippedLimit | Self::Cancelled
            ) | (
                Self::Fetching,
                Self::Fetched | Self::FailedRetryable | Self::FailedTerminal
            ) | (Self::FailedRetryable, Self::Fetching)
        )
    }
}

/// The states one artifact has passed through, starting at `Pending`.
#[derive(Debug)]
struct Transitions<'a> {
    locator: &'a str,
    history: Vec<ArtifactState>,
}

impl<'a> Transitions<'a> {
    fn new(locator: &'a str) -> Self {
        Self {
            locator,
            history: vec![ArtifactState::Pending],
        }
    }

    fn current(&self) -> ArtifactState {
        self.history.last().copied().unwrap_or(ArtifactState::Pending)
    }

    fn advance(&mut self, next: ArtifactState) -> ArtifactState {
        let current = self.current();
        debug_assert!(current.allows(next), "illegal transition {current:?} -> {next:?}");
        trace!(locator = %self.locator, from = ?current, to = ?next, "artifact state");
        self.history.push(next);
        next
    }

    fn retries(&self) -> usize {
        self.history
            .iter()
            .filter(|s| **s == ArtifactState::FailedRetryable)
            .count()
    }

    fn into_history(self) -> Vec<ArtifactState> {
        self.history
    }
}

/// Final outcome of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutcome {
    /// Owning record.
    pub record_id: String,
    /// Artifact kind.
    pub kind: DocumentKind,
    /// Resolved URL.
    pub url: String,
    /// Local destination.
    pub path: PathBuf,
    /// Terminal state.
    pub state: ArtifactState,
    /// Fetch attempts made (0 when not fetched).
    pub attempts: u32,
    /// Every state passed through, from `Pending` to `state`.
    pub history: Vec<ArtifactState>,
}

/// A terminal fetch failure, recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Owning record.
    pub record_id: String,
    /// Artifact kind.
    pub kind: DocumentKind,
    /// Resolved URL.
    pub url: String,
    /// Attempts made.
    pub attempts: u32,
    /// Classification of the last error.
    pub failure_type: FailureType,
    /// Last error message.
    pub error: String,
}

/// Counters of a retrieval pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    /// Artifacts fetched over the network.
    pub fetched: usize,
    /// Artifacts already present locally.
    pub cached: usize,
    /// Artifacts that ended in `FailedTerminal`.
    pub failed: usize,
    /// Artifacts skipped by the download budget.
    pub skipped_limit: usize,
    /// Artifacts skipped by cancellation.
    pub cancelled: usize,
    /// Retry attempts made (beyond first attempts).
    pub retried: usize,
    /// Store entries changed by merged metadata.
    pub merged: usize,
}

/// Everything a retrieval pass did.
#[derive(Debug, Default)]
pub struct RetrievalReport {
    /// Per-artifact outcomes in processing order.
    pub outcomes: Vec<ArtifactOutcome>,
    /// Terminal failures.
    pub failures: Vec<FetchFailure>,
    /// Metadata documents that were fetched but did not parse.
    pub parse_failures: Vec<(String, ParseError)>,
    /// Selected ids absent from the store.
    pub unknown_ids: Vec<String>,
    /// Counters.
    pub stats: RetrievalStats,
}

impl RetrievalReport {
    fn record(&mut self, outcome: ArtifactOutcome) {
        match outcome.state {
            ArtifactState::Fetched => self.stats.fetched += 1,
            ArtifactState::Cached => self.stats.cached += 1,
            ArtifactState::FailedTerminal => self.stats.failed += 1,
            ArtifactState::SkippedLimit => self.stats.skipped_limit += 1,
            ArtifactState::Cancelled => self.stats.cancelled += 1,
            ArtifactState::Pending | ArtifactState::Fetching | ArtifactState::FailedRetryable => {}
        }
        self.outcomes.push(outcome);
    }

    /// Returns true when every artifact ended without a failure.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.parse_failures.is_empty()
    }
}

/// Where and what to retrieve.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Also fetch documentation PDFs.
    pub download_docs: bool,
    /// Re-fetch artifacts that are already present.
    pub force_download: bool,
    /// Stop fetching after this many successful network fetches.
    pub max_downloads: Option<usize>,
    /// Catalog base URL (index at `{base}/packages`).
    pub catalog_base: String,
    /// Mirror base URL for `ctan:` locators.
    pub mirror_base: String,
    /// Directory of metadata documents.
    pub xml_dir: PathBuf,
    /// Directory of documentation PDFs.
    pub pdf_dir: PathBuf,
}

impl RetrievalOptions {
    /// Default options rooted at `work_dir` (`xml/` and `pdf/` below it).
    #[must_use]
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        let work_dir = work_dir.as_ref();
        Self {
            download_docs: false,
            force_download: false,
            max_downloads: None,
            catalog_base: DEFAULT_CATALOG_BASE.to_string(),
            mirror_base: DEFAULT_MIRROR_BASE.to_string(),
            xml_dir: work_dir.join("xml"),
            pdf_dir: work_dir.join("pdf"),
        }
    }

    /// URL of the remote package index.
    #[must_use]
    pub fn index_url(&self) -> String {
        format!("{}/packages", self.catalog_base.trim_end_matches('/'))
    }
}

/// Sequential retrieval engine.
pub struct RetrievalEngine {
    fetcher: Arc<dyn Fetcher>,
    retry_policy: RetryPolicy,
    options: RetrievalOptions,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("retry_policy", &self.retry_policy)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Creates an engine over the given transport.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        retry_policy: RetryPolicy,
        options: RetrievalOptions,
    ) -> Self {
        debug!(
            max_attempts = retry_policy.max_attempts(),
            download_docs = options.download_docs,
            force = options.force_download,
            "creating retrieval engine"
        );
        Self {
            fetcher,
            retry_policy,
            options,
        }
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Fetches and parses the remote package index.
    ///
    /// # Errors
    ///
    /// - [`EngineError::IndexFetch`] if every attempt failed
    /// - [`EngineError::IndexParse`] if the document is not a package index
    #[instrument(skip(self), fields(url = %self.options.index_url()))]
    pub async fn fetch_index(&self) -> Result<RemoteIndex, EngineError> {
        let url = self.options.index_url();
        let mut trail = Transitions::new(&url);
        trail.advance(ArtifactState::Fetching);
        let result = self
            .with_retry(&mut trail, || self.fetcher.fetch_text(&url))
            .await;
        let retried = trail.retries();
        let text = match result {
            Ok((text, _)) => {
                trail.advance(ArtifactState::Fetched);
                text
            }
            Err((source, attempts)) => {
                trail.advance(ArtifactState::FailedTerminal);
                return Err(EngineError::IndexFetch { attempts, source });
            }
        };
        let index = RemoteIndex::parse(&text)?;
        info!(packages = index.len(), retried, "package index fetched");
        Ok(index)
    }

    /// Retrieves the artifacts of every selected record and merges fetched
    /// metadata into `store`.
    ///
    /// Never fails as a whole: every problem is recorded in the report.
    #[instrument(skip_all, fields(selected = selection.len()))]
    pub async fn retrieve(
        &self,
        selection: &Selection,
        store: &mut CatalogStore,
        cancel: &CancelFlag,
    ) -> RetrievalReport {
        info!("starting retrieval");
        let pass = Pass {
            download_docs: self.options.download_docs,
            force_download: self.options.force_download,
            max_downloads: self.options.max_downloads,
        };
        let report = self.run_pass(selection, store, cancel, pass).await;

        let stats = report.stats;
        info!(
            fetched = stats.fetched,
            cached = stats.cached,
            failed = stats.failed,
            skipped_limit = stats.skipped_limit,
            cancelled = stats.cancelled,
            retried = stats.retried,
            merged = stats.merged,
            "retrieval complete"
        );
        report
    }

    /// Fetches the metadata documents of `candidates` that are not cached
    /// yet and merges them into `store`.
    ///
    /// Records built from the package index alone carry no authors, topics
    /// or license, so this runs before those predicates are evaluated.
    /// Documentation is never fetched here and the download budget does not
    /// apply. Candidates whose metadata file already exists get no outcome.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn enrich(
        &self,
        candidates: &Selection,
        store: &mut CatalogStore,
        cancel: &CancelFlag,
    ) -> RetrievalReport {
        let missing = Selection::from_ids(candidates.iter().filter(|id| {
            store
                .lookup(id)
                .and_then(Record::metadata_ref)
                .is_some_and(|doc| !self.artifact_path(id, doc).is_file())
        }));
        if missing.is_empty() {
            debug!("metadata of every candidate is cached");
            return RetrievalReport::default();
        }

        info!(missing = missing.len(), "fetching metadata to evaluate filters");
        let pass = Pass {
            download_docs: false,
            force_download: false,
            max_downloads: None,
        };
        let report = self.run_pass(&missing, store, cancel, pass).await;
        info!(
            fetched = report.stats.fetched,
            failed = report.stats.failed,
            merged = report.stats.merged,
            "metadata enrichment complete"
        );
        report
    }

    async fn run_pass(
        &self,
        selection: &Selection,
        store: &mut CatalogStore,
        cancel: &CancelFlag,
        pass: Pass,
    ) -> RetrievalReport {
        let mut report = RetrievalReport::default();

        for id in selection.iter() {
            let Some(record) = store.lookup(id) else {
                warn!(%id, "selected id not in catalog");
                report.unknown_ids.push(id.to_string());
                continue;
            };
            let Some(metadata) = record.metadata_ref().cloned() else {
                continue;
            };

            let outcome = self.artifact(id, &metadata, pass, &mut report, cancel).await;
            if matches!(outcome, ArtifactState::Fetched | ArtifactState::Cached) {
                self.merge_metadata(id, &metadata, store, &mut report);
            }

            if pass.download_docs {
                let docs: Vec<DocumentRef> = store
                    .lookup(id)
                    .map(|r| r.pdf_refs().cloned().collect())
                    .unwrap_or_default();
                for doc in &docs {
                    self.artifact(id, doc, pass, &mut report, cancel).await;
                }
            }
        }
        report
    }

    fn artifact_path(&self, record_id: &str, doc: &DocumentRef) -> PathBuf {
        let dir = match doc.kind {
            DocumentKind::MetadataXml => &self.options.xml_dir,
            DocumentKind::Pdf | DocumentKind::Other => &self.options.pdf_dir,
        };
        dir.join(artifact_file_name(doc, record_id))
    }

    async fn artifact(
        &self,
        record_id: &str,
        doc: &DocumentRef,
        pass: Pass,
        report: &mut RetrievalReport,
        cancel: &CancelFlag,
    ) -> ArtifactState {
        let path = self.artifact_path(record_id, doc);
        let url = doc.resolve(&self.options.mirror_base);
        let mut trail = Transitions::new(&url);
        let mut attempts = 0;

        let state = if cancel.is_cancelled() {
            trail.advance(ArtifactState::Cancelled)
        } else if !pass.force_download && path.is_file() {
            debug!(%record_id, path = %path.display(), "artifact cached");
            trail.advance(ArtifactState::Cached)
        } else if pass
            .max_downloads
            .is_some_and(|limit| report.stats.fetched >= limit)
        {
            debug!(%record_id, %url, "download budget exhausted");
            trail.advance(ArtifactState::SkippedLimit)
        } else {
            trail.advance(ArtifactState::Fetching);
            let result = self
                .with_retry(&mut trail, || self.fetcher.fetch_to_file(&url, &path))
                .await;
            report.stats.retried += trail.retries();
            match result {
                Ok((bytes, n)) => {
                    attempts = n;
                    debug!(%record_id, %url, bytes, attempts, "artifact fetched");
                    trail.advance(ArtifactState::Fetched)
                }
                Err((error, n)) => {
                    attempts = n;
                    warn!(%record_id, %url, error = %error, attempts, "artifact failed");
                    report.failures.push(FetchFailure {
                        record_id: record_id.to_string(),
                        kind: doc.kind,
                        url: url.clone(),
                        attempts,
                        failure_type: classify_error(&error),
                        error: error.to_string(),
                    });
                    trail.advance(ArtifactState::FailedTerminal)
                }
            }
        };

        let history = trail.into_history();
        report.record(ArtifactOutcome {
            record_id: record_id.to_string(),
            kind: doc.kind,
            url,
            path,
            state,
            attempts,
            history,
        });
        state
    }

    /// Parses the metadata document of `record_id` and merges it.
    ///
    /// A document that does not parse, or describes another package, is
    /// removed so that the next run fetches it again instead of treating it
    /// as cached.
    fn merge_metadata(
        &self,
        record_id: &str,
        metadata: &DocumentRef,
        store: &mut CatalogStore,
        report: &mut RetrievalReport,
    ) {
        let path = self.artifact_path(record_id, metadata);
        let xml = match std::fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) => {
                warn!(%record_id, path = %path.display(), error = %e, "cannot read metadata");
                report.parse_failures.push((
                    record_id.to_string(),
                    ParseError::malformed(&metadata.locator, e.to_string()),
                ));
                return;
            }
        };
        let error = match Record::parse(RawMetadata::new(&metadata.locator, xml)) {
            Ok(record) if record.id == record_id => {
                report.stats.merged += store.merge([record]);
                return;
            }
            Ok(record) => {
                warn!(%record_id, parsed_id = %record.id, "metadata id differs from catalog id");
                ParseError::malformed(
                    &metadata.locator,
                    format!("entry id '{}' does not match '{record_id}'", record.id),
                )
            }
            Err(error) => {
                warn!(%record_id, %error, "metadata does not parse");
                error
            }
        };
        report.parse_failures.push((record_id.to_string(), error));
        discard_metadata(record_id, &path);
    }

    /// Runs `op` until it succeeds or the policy gives up, returning the value
    /// (or last error) together with the number of attempts made.
    ///
    /// `trail` must be in `Fetching`. Every retried failure moves it through
    /// `FailedRetryable` and back to `Fetching`; the final transition is left
    /// to the caller.
    async fn with_retry<T, F, Fut>(
        &self,
        trail: &mut Transitions<'_>,
        mut op: F,
    ) -> Result<(T, u32), (DownloadError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DownloadError>>,
    {
        let mut attempt = 0u32;
        loop {
            if trail.current() == ArtifactState::FailedRetryable {
                trail.advance(ArtifactState::Fetching);
            }
            attempt += 1;
            match op().await {
                Ok(value) => return Ok((value, attempt)),
                Err(error) => match self.retry_policy.should_retry_error(&error, attempt) {
                    RetryDecision::Retry { delay, .. } => {
                        debug!(
                            url = %trail.locator,
                            error = %error,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "retrying"
                        );
                        trail.advance(ArtifactState::FailedRetryable);
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %trail.locator, %reason, attempt, "giving up");
                        return Err((error, attempt));
                    }
                },
            }
        }
    }
}

/// Knobs of one pass over a selection.
#[derive(Debug, Clone, Copy)]
struct Pass {
    download_docs: bool,
    force_download: bool,
    max_downloads: Option<usize>,
}

fn discard_metadata(record_id: &str, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(%record_id, path = %path.display(), "removed unusable metadata document"),
        Err(e) => warn!(%record_id, path = %path.display(), error = %e, "cannot remove unusable metadata document"),
    }
}
