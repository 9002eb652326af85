//! Persisted catalog of package records.
//!
//! The [`CatalogStore`] maps package ids to [`Record`]s in insertion order and
//! is the single source of truth for filtering and rendering. It is persisted
//! as a versioned JSON snapshot that holds only the raw metadata payloads;
//! records are re-derived from them on every load.
//!
//! # Lifecycle
//!
//! - [`CatalogStore::load`] reads the snapshot, refusing corrupt or
//!   version-mismatched payloads so the caller can regenerate instead.
//! - [`CatalogStore::regenerate`] builds a brand-new store from the remote
//!   index. The caller swaps it in only once it is complete.
//! - [`CatalogStore::merge`] upserts freshly fetched records.
//! - [`CatalogStore::save`] writes to a temp file and renames it over the
//!   snapshot, so a crash never leaves a half-written cache.

mod error;
pub mod index;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use error::CatalogError;
pub use index::{IndexEntry, RemoteIndex};

use crate::download::artifact_file_name;
use crate::record::{DocumentRef, ParseError, RawMetadata, Record};

/// Snapshot format version written by this build.
pub const CATALOG_FORMAT_VERSION: u32 = 1;

/// File name of the persisted snapshot inside the work directory.
pub const CATALOG_FILE_NAME: &str = "catalog.json";

/// Builds the metadata-XML locator of a package.
#[must_use]
pub fn metadata_locator(catalog_base: &str, id: &str) -> String {
    format!(
        "{}/pkg/{}",
        catalog_base.trim_end_matches('/'),
        urlencoding::encode(id)
    )
}

#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    format_version: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    regenerated_at: Option<DateTime<Utc>>,
    entries: Vec<RawMetadata>,
}

/// Outcome of a [`CatalogStore::regenerate`] pass.
#[derive(Debug, Default)]
pub struct RegenerateReport {
    /// Records rebuilt from locally cached metadata XML.
    pub from_local: usize,
    /// Records synthesized from index attributes only.
    pub from_index: usize,
    /// Entries that could not be turned into a record.
    pub parse_failures: Vec<(String, ParseError)>,
}

/// Local metadata files compared against the store.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Record ids whose metadata XML is not cached locally.
    pub missing_local: Vec<String>,
    /// Local metadata files that no record refers to.
    pub orphaned_local: Vec<PathBuf>,
}

impl IntegrityReport {
    /// Returns true when store and local files agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.missing_local.is_empty() && self.orphaned_local.is_empty()
    }
}

/// In-memory catalog of package records, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    records: Vec<Record>,
    positions: HashMap<String, usize>,
    regenerated_at: Option<DateTime<Utc>>,
    dropped_on_load: usize,
}

impl CatalogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records (later duplicates replace earlier ones).
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        store.merge(records);
        store
    }

    /// Loads a persisted snapshot.
    ///
    /// Entries whose payload no longer parses are dropped with a warning and
    /// counted in [`dropped_on_load`](Self::dropped_on_load).
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`] if no snapshot exists
    /// - [`CatalogError::Corrupt`] if the payload is unreadable or unversioned
    /// - [`CatalogError::VersionMismatch`] if it was written by another format version
    /// - [`CatalogError::Io`] on other read failures
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CatalogError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(CatalogError::io(path, e)),
        };

        let header: SnapshotHeader = serde_json::from_slice(&raw)
            .map_err(|e| CatalogError::corrupt(path, e.to_string()))?;
        let Some(found) = header.format_version else {
            return Err(CatalogError::corrupt(path, "missing format_version tag"));
        };
        if found != CATALOG_FORMAT_VERSION {
            return Err(CatalogError::VersionMismatch {
                path: path.to_path_buf(),
                found,
                expected: CATALOG_FORMAT_VERSION,
            });
        }

        let snapshot: Snapshot = serde_json::from_slice(&raw)
            .map_err(|e| CatalogError::corrupt(path, e.to_string()))?;

        let mut store = Self {
            regenerated_at: snapshot.regenerated_at,
            ..Self::default()
        };
        for raw in snapshot.entries {
            match Record::parse(raw) {
                Ok(record) => store.upsert(record),
                Err(error) => {
                    warn!(%error, "dropping unparseable catalog entry");
                    store.dropped_on_load += 1;
                }
            }
        }

        info!(
            records = store.len(),
            dropped = store.dropped_on_load,
            "catalog loaded"
        );
        Ok(store)
    }

    /// Persists the store atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the directory, temp file or rename fails.
    #[instrument(skip(self), fields(path = %path.display(), records = self.len()))]
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }

        let snapshot = Snapshot {
            format_version: CATALOG_FORMAT_VERSION,
            regenerated_at: self.regenerated_at,
            entries: self.records.iter().map(Record::to_raw).collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        crate::fsutil::write_atomic(path, &bytes).map_err(|e| CatalogError::io(path, e))?;

        debug!(bytes = bytes.len(), "catalog saved");
        Ok(())
    }

    /// Builds a new store from the remote index.
    ///
    /// For every index entry the locally cached metadata XML in `xml_dir` is
    /// used when present, parseable and carrying the same id; otherwise a minimal record is
    /// synthesized from the index attributes. `self` is not touched; callers
    /// replace their store with the returned one.
    #[must_use]
    #[instrument(skip(index), fields(entries = index.len(), xml_dir = %xml_dir.display()))]
    pub fn regenerate(
        index: &RemoteIndex,
        catalog_base: &str,
        xml_dir: &Path,
    ) -> (Self, RegenerateReport) {
        let mut store = Self::new();
        let mut report = RegenerateReport::default();

        for entry in index.entries() {
            let locator = metadata_locator(catalog_base, &entry.key);
            let local_path = xml_dir.join(artifact_file_name(
                &DocumentRef::metadata(&locator),
                &entry.key,
            ));

            let local = match fs::read_to_string(&local_path) {
                Ok(xml) => match Record::parse(RawMetadata::new(&locator, xml)) {
                    Ok(record) if record.id == entry.key => Some(record),
                    Ok(record) => {
                        warn!(id = %entry.key, parsed_id = %record.id, "cached metadata describes another package, using index entry");
                        None
                    }
                    Err(error) => {
                        warn!(id = %entry.key, %error, "cached metadata unparseable, using index entry");
                        None
                    }
                },
                Err(_) => None,
            };

            if let Some(record) = local {
                report.from_local += 1;
                store.upsert(record);
                continue;
            }

            let raw = RawMetadata::minimal(
                &locator,
                &entry.key,
                entry.name.as_deref(),
                entry.caption.as_deref(),
            );
            match Record::parse(raw) {
                Ok(record) => {
                    report.from_index += 1;
                    store.upsert(record);
                }
                Err(error) => {
                    warn!(id = %entry.key, %error, "skipping index entry");
                    report.parse_failures.push((entry.key.clone(), error));
                }
            }
        }

        store.regenerated_at = Some(Utc::now());
        info!(
            records = store.len(),
            from_local = report.from_local,
            from_index = report.from_index,
            failures = report.parse_failures.len(),
            "catalog regenerated"
        );
        (store, report)
    }

    /// Upserts records by id without touching unrelated entries.
    ///
    /// New ids are appended; existing ids keep their position. Returns the
    /// number of entries that actually changed, so merging the same records
    /// twice returns 0 the second time.
    pub fn merge(&mut self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut changed = 0;
        for record in records {
            if self.lookup(&record.id) != Some(&record) {
                changed += 1;
                self.upsert(record);
            }
        }
        if changed > 0 {
            debug!(changed, total = self.len(), "merged records into catalog");
        }
        changed
    }

    /// Compares the store against the metadata files cached in `xml_dir`.
    ///
    /// A missing directory means nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the directory exists but cannot be read.
    #[instrument(skip(self), fields(xml_dir = %xml_dir.display()))]
    pub fn check_integrity(&self, xml_dir: &Path) -> Result<IntegrityReport, CatalogError> {
        let mut local: HashSet<String> = HashSet::new();
        match fs::read_dir(xml_dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry.map_err(|e| CatalogError::io(xml_dir, e))?;
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name.ends_with(".xml") && !name.starts_with('.') {
                        local.insert(name);
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CatalogError::io(xml_dir, e)),
        }

        let mut report = IntegrityReport::default();
        let mut known = HashSet::new();
        for record in &self.records {
            let Some(metadata) = record.metadata_ref() else {
                continue;
            };
            let file_name = artifact_file_name(metadata, &record.id);
            if !local.contains(&file_name) {
                report.missing_local.push(record.id.clone());
            }
            known.insert(file_name);
        }

        let mut orphaned: Vec<&String> = local.difference(&known).collect();
        orphaned.sort();
        report.orphaned_local = orphaned.into_iter().map(|name| xml_dir.join(name)).collect();

        debug!(
            missing = report.missing_local.len(),
            orphaned = report.orphaned_local.len(),
            "integrity check complete"
        );
        Ok(report)
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    /// Returns all records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterates over record ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns when the store was last rebuilt from the remote index.
    #[must_use]
    pub fn regenerated_at(&self) -> Option<DateTime<Utc>> {
        self.regenerated_at
    }

    /// Returns how many persisted entries were dropped by the last load.
    #[must_use]
    pub fn dropped_on_load(&self) -> usize {
        self.dropped_on_load
    }

    fn upsert(&mut self, record: Record) {
        if let Some(&pos) = self.positions.get(&record.id) {
            self.records[pos] = record;
        } else {
            self.positions.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
    }
}
