//! End-to-end run: load or regenerate the store, check, select, retrieve, render.
//!
//! When author, topic or license patterns are set, the metadata of every
//! name-matching record not cached yet is fetched before selecting, since a
//! record built from the package index alone has none of those fields.
//!
//! The [`Orchestrator`] owns nothing but configuration. Every run builds a
//! fresh [`CatalogStore`] value from disk, passes it by reference through the
//! filter, retrieval and render stages and writes it back when it changed.
//!
//! Only a handful of conditions abort a run (see [`PipelineError`]). Every
//! other problem ends up in the returned [`RunReport`].

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::catalog::{CatalogError, CatalogStore, IntegrityReport, metadata_locator};
use crate::config::{ConfigError, RunConfig};
use crate::download::{EngineError, FetchFailure, Fetcher, RetrievalEngine, RetryPolicy};
use crate::filter::select;
use crate::fsutil::remove_stale_partials;
use crate::record::{ParseError, RawMetadata, Record};
use crate::render::{RenderEngine, RenderError, RenderResult};

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration was rejected before any I/O.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The persisted store is unusable and cannot be rebuilt.
    #[error(transparent)]
    Store(#[from] CatalogError),

    /// The remote index is unavailable and no usable store exists.
    #[error("no usable catalog: {0}")]
    Index(#[from] EngineError),

    /// Rendered output could not be written.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Records in the store after the run.
    pub store_records: usize,
    /// Records selected by the filters.
    pub selected_count: usize,
    /// Metadata documents fetched only to evaluate author, topic or license filters.
    pub enriched: usize,
    /// Artifacts fetched from the network.
    pub fetched: usize,
    /// Artifacts already present locally.
    pub cached: usize,
    /// Artifacts that failed terminally.
    pub failed: usize,
    /// Artifacts skipped by the download budget.
    pub skipped_limit: usize,
    /// Artifacts not attempted because the run was cancelled.
    pub cancelled: usize,
    /// Retry attempts across all fetches.
    pub retried: usize,
    /// Store entries added or changed from metadata files.
    pub merged: usize,
    /// Records written to the output document.
    pub rendered: usize,
    /// Leftover partial downloads removed.
    pub stale_partials_removed: usize,
}

/// Everything a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Counters.
    pub stats: RunStats,
    /// Artifacts that failed after their retry budget.
    pub failures: Vec<FetchFailure>,
    /// Metadata documents that did not parse, by package id.
    pub parse_failures: Vec<(String, ParseError)>,
    /// Result of the integrity check, when it ran.
    pub integrity: Option<IntegrityReport>,
    /// Index fetch error when the run fell back to the existing store.
    pub index_error: Option<String>,
    /// The store was rebuilt from the remote index.
    pub regenerated: bool,
    /// The filters matched nothing.
    pub empty_selection: bool,
    /// The run was cancelled before it finished retrieval.
    pub cancelled: bool,
    /// Render result; `None` when rendering did not run.
    pub render: Option<RenderResult>,
}

impl RunReport {
    /// Returns true when no artifact or metadata document failed.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.parse_failures.is_empty() && !self.cancelled
    }
}

/// Sequences the stages of a run.
pub struct Orchestrator {
    config: RunConfig,
    fetcher: Arc<dyn Fetcher>,
    retry_policy: RetryPolicy,
    cancel: CancelFlag,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator. The retry policy follows `config.max_retries`.
    #[must_use]
    pub fn new(config: RunConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            config,
            fetcher,
            retry_policy,
            cancel: CancelFlag::new(),
        }
    }

    /// Replaces the retry policy derived from the configuration.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Uses `cancel` instead of a private flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The flag that cancels this run.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes one run.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Config`] for an invalid configuration
    /// - [`PipelineError::Store`] when an offline run finds a corrupt store,
    ///   or the store cannot be read, checked or saved
    /// - [`PipelineError::Index`] when the index is unavailable and no store exists
    /// - [`PipelineError::Render`] when output files cannot be written
    #[instrument(skip(self), fields(work_dir = %self.config.work_dir.display(), format = %self.config.format, offline = self.config.offline))]
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let config = &self.config;
        config.validate()?;
        let predicates = config.predicates()?;
        let render_engine = RenderEngine::new(config.format, config.render_context()?);

        let engine = RetrievalEngine::new(
            Arc::clone(&self.fetcher),
            self.retry_policy.clone(),
            config.retrieval_options(),
        );
        let xml_dir = engine.options().xml_dir.clone();
        let pdf_dir = engine.options().pdf_dir.clone();
        let store_path = config.store_path();

        let mut report = RunReport::default();
        let (mut store, mut changed) = self.load_store(&store_path)?;

        let needs_index = config.regenerate || store.as_ref().is_none_or(CatalogStore::is_empty);
        if needs_index && !config.offline {
            match engine.fetch_index().await {
                Ok(index) => {
                    let (fresh, regen) =
                        CatalogStore::regenerate(&index, &config.catalog_base, &xml_dir);
                    report.parse_failures.extend(regen.parse_failures);
                    report.regenerated = true;
                    store = Some(fresh);
                    changed = true;
                }
                Err(error) => match &store {
                    Some(existing) if !existing.is_empty() => {
                        warn!(%error, records = existing.len(), "index unavailable, keeping existing catalog");
                        report.index_error = Some(error.to_string());
                    }
                    _ => return Err(PipelineError::Index(error)),
                },
            }
        }
        let mut store = store.unwrap_or_default();

        if config.check || (config.offline && store.is_empty()) {
            let integrity = store.check_integrity(&xml_dir)?;
            let merged = merge_orphans(
                &mut store,
                &integrity.orphaned_local,
                &config.catalog_base,
                &mut report.parse_failures,
            );
            if merged > 0 {
                changed = true;
                report.stats.merged += merged;
            }
            info!(
                missing = integrity.missing_local.len(),
                orphaned = integrity.orphaned_local.len(),
                merged,
                "integrity check"
            );
            report.integrity = Some(integrity);
        }

        for dir in [&xml_dir, &pdf_dir] {
            match remove_stale_partials(dir) {
                Ok(removed) => report.stats.stale_partials_removed += removed,
                Err(error) => warn!(dir = %dir.display(), %error, "cannot clean partial downloads"),
            }
        }

        if predicates.needs_full_metadata() && !config.offline {
            let candidates = select(&store, &predicates.names_only());
            let enrichment = engine.enrich(&candidates, &mut store, &self.cancel).await;
            let stats = enrichment.stats;
            report.stats.enriched = stats.fetched;
            report.stats.failed += stats.failed;
            report.stats.retried += stats.retried;
            report.stats.merged += stats.merged;
            changed |= stats.merged > 0;
            report.failures.extend(enrichment.failures);
            report.parse_failures.extend(enrichment.parse_failures);
        }

        let selection = select(&store, &predicates);
        report.stats.selected_count = selection.len();
        if selection.is_empty() {
            info!(records = store.len(), "filters matched no package");
            report.empty_selection = true;
        } else if config.offline {
            debug!("offline run, retrieval skipped");
        } else {
            let retrieval = engine.retrieve(&selection, &mut store, &self.cancel).await;
            let stats = retrieval.stats;
            report.stats.fetched = stats.fetched;
            report.stats.cached = stats.cached;
            report.stats.failed += stats.failed;
            report.stats.skipped_limit = stats.skipped_limit;
            report.stats.cancelled = stats.cancelled;
            report.stats.retried += stats.retried;
            report.stats.merged += stats.merged;
            changed |= stats.merged > 0;
            report.failures.extend(retrieval.failures);
            report.parse_failures.extend(retrieval.parse_failures);
        }
        report.stats.store_records = store.len();

        if changed {
            store.save(&store_path)?;
        }

        if self.cancel.is_cancelled() {
            warn!("run cancelled, output not rendered");
            report.cancelled = true;
        } else {
            let result = render_engine.render(&selection, &store, &config.render_target())?;
            if let RenderResult::Rendered(output) = &result {
                report.stats.rendered = output.rendered;
            }
            report.render = Some(result);
        }

        let stats = report.stats;
        info!(
            records = stats.store_records,
            selected = stats.selected_count,
            enriched = stats.enriched,
            fetched = stats.fetched,
            cached = stats.cached,
            failed = stats.failed,
            skipped_limit = stats.skipped_limit,
            merged = stats.merged,
            rendered = stats.rendered,
            parse_failures = report.parse_failures.len(),
            "run complete"
        );
        Ok(report)
    }

    /// Loads the persisted store.
    ///
    /// Returns `(None, _)` when the store is missing, or corrupt and
    /// replaceable by a regeneration. The flag tells whether the value on
    /// disk must be rewritten.
    fn load_store(&self, path: &Path) -> Result<(Option<CatalogStore>, bool), PipelineError> {
        match CatalogStore::load(path) {
            Ok(store) => {
                let dropped = store.dropped_on_load() > 0;
                Ok((Some(store), dropped))
            }
            Err(CatalogError::NotFound { .. }) => {
                debug!(path = %path.display(), "no catalog yet");
                Ok((None, false))
            }
            Err(error) if error.requires_regeneration() => {
                if self.config.offline {
                    return Err(PipelineError::Store(error));
                }
                warn!(%error, "catalog unusable, regenerating");
                Ok((None, true))
            }
            Err(error) => Err(PipelineError::Store(error)),
        }
    }
}

/// Parses metadata files with no store entry and merges them.
fn merge_orphans(
    store: &mut CatalogStore,
    orphans: &[std::path::PathBuf],
    catalog_base: &str,
    parse_failures: &mut Vec<(String, ParseError)>,
) -> usize {
    let mut records = Vec::new();
    for path in orphans {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let locator = metadata_locator(catalog_base, &stem);
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| ParseError::malformed(&locator, e.to_string()))
            .and_then(|xml| Record::parse(RawMetadata::new(&locator, xml)));
        match parsed {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(path = %path.display(), %error, "orphaned metadata does not parse");
                parse_failures.push((stem, error));
            }
        }
    }
    store.merge(records)
}
