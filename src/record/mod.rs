//! Normalized package records.
//!
//! Every catalog entry is parsed into a [`Record`] before any other component
//! sees it, so downstream code never branches on the shape of the metadata
//! payload. Optional metadata (authors, topics, contained files, version)
//! becomes empty containers or `None`; only the package id, its title and the
//! metadata-XML locator are mandatory.
//!
//! The original payload is retained as [`RawMetadata`] and is the only thing
//! persisted. Derived fields are recomputed from it on every load.
//!
//! # Example
//!
//! ```
//! use ctanmirror_core::record::{RawMetadata, Record};
//!
//! let raw = RawMetadata::new(
//!     "https://www.ctan.org/xml/2.0/pkg/pgf",
//!     r#"<entry id="pgf"><caption>Graphics</caption></entry>"#,
//! );
//! let record = Record::parse(raw).unwrap();
//! assert_eq!(record.id, "pgf");
//! assert!(record.authors.is_empty());
//! ```

mod error;
mod xml;

use std::collections::BTreeSet;

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

pub use error::ParseError;

/// Kind of a remote document attached to a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// The per-package metadata document; the canonical source of a record.
    MetadataXml,
    /// A PDF documentation file.
    Pdf,
    /// Any other documentation locator (README, web page, ...).
    Other,
}

impl DocumentKind {
    /// Returns the stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MetadataXml => "metadata_xml",
            Self::Pdf => "pdf",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote document locator tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// What the locator points at.
    pub kind: DocumentKind,
    /// Absolute URL, or a `ctan:/path` locator relative to a CTAN mirror.
    pub locator: String,
    /// Free-text description from the catalog, if any.
    pub details: Option<String>,
}

impl DocumentRef {
    /// Creates the metadata-XML locator of a record.
    #[must_use]
    pub fn metadata(locator: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::MetadataXml,
            locator: locator.into(),
            details: None,
        }
    }

    /// Creates a documentation locator, classifying it by its extension.
    #[must_use]
    pub fn documentation(locator: impl Into<String>, details: Option<String>) -> Self {
        let locator = locator.into();
        let kind = if locator.to_ascii_lowercase().ends_with(".pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Other
        };
        Self {
            kind,
            locator,
            details,
        }
    }

    /// Resolves `ctan:` locators against a mirror base URL.
    ///
    /// Absolute locators are returned unchanged.
    #[must_use]
    pub fn resolve(&self, mirror_base: &str) -> String {
        match self.locator.strip_prefix("ctan:") {
            Some(path) => format!(
                "{}/{}",
                mirror_base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => self.locator.clone(),
        }
    }
}

/// The original metadata payload of one package plus the locator it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    /// Metadata-XML locator (absolute http(s) URL).
    pub source_url: String,
    /// The `<entry>` XML document as fetched.
    pub xml: String,
}

impl RawMetadata {
    /// Wraps a fetched payload.
    #[must_use]
    pub fn new(source_url: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            xml: xml.into(),
        }
    }

    /// Builds a minimal `<entry>` payload for a package known only from the remote index.
    #[must_use]
    pub fn minimal(
        source_url: impl Into<String>,
        id: &str,
        name: Option<&str>,
        caption: Option<&str>,
    ) -> Self {
        let name = name.unwrap_or(id);
        let caption = caption.unwrap_or(name);
        let xml = format!(
            "<entry id=\"{}\"><name>{}</name><caption>{}</caption></entry>",
            escape(id),
            escape(name),
            escape(caption)
        );
        Self::new(source_url, xml)
    }
}

/// One normalized catalog package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unique package key, stable across runs.
    pub id: String,
    /// Display name; defaults to the id.
    pub name: String,
    /// Package caption.
    pub title: String,
    /// Author names in catalog order.
    pub authors: Vec<String>,
    /// Topic tags.
    pub topics: BTreeSet<String>,
    /// License identifiers, comma-joined when several apply.
    pub license: Option<String>,
    /// Metadata-XML locator first, then documentation in catalog order.
    pub documentation_refs: Vec<DocumentRef>,
    /// Filenames shipped with the package.
    pub contained_files: Vec<String>,
    /// Version number.
    pub version: Option<String>,
    /// Version date.
    pub date: Option<String>,
    /// Payload this record was derived from.
    pub raw_source: RawMetadata,
}

impl Record {
    /// Parses a metadata payload into a record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the locator is missing or not an absolute
    /// http(s) URL, the XML is malformed, or the id or title are missing.
    #[instrument(level = "debug", skip(raw), fields(source_url = %raw.source_url))]
    pub fn parse(raw: RawMetadata) -> Result<Self, ParseError> {
        validate_locator(&raw.source_url)?;

        let fields = xml::parse_entry(&raw.xml)
            .map_err(|e| ParseError::malformed(&raw.source_url, e.to_string()))?;

        let id = fields
            .id
            .or_else(|| fields.name.clone())
            .ok_or_else(|| ParseError::missing_field("id", &raw.source_url))?;
        let name = fields.name.unwrap_or_else(|| id.clone());
        let title = fields
            .caption
            .ok_or_else(|| ParseError::missing_field("title", &raw.source_url))?;

        let mut documentation_refs = vec![DocumentRef::metadata(&raw.source_url)];
        documentation_refs.extend(
            fields
                .documentation
                .into_iter()
                .map(|(href, details)| DocumentRef::documentation(href, details)),
        );

        let mut contained_files = Vec::new();
        for file in fields.files {
            if !contained_files.contains(&file) {
                contained_files.push(file);
            }
        }

        let mut authors: Vec<String> = Vec::new();
        for author in fields.authors {
            if !authors.contains(&author) {
                authors.push(author);
            }
        }

        Ok(Self {
            id,
            name,
            title,
            authors,
            topics: fields.topics.into_iter().collect(),
            license: (!fields.licenses.is_empty()).then(|| fields.licenses.join(", ")),
            documentation_refs,
            contained_files,
            version: fields.version,
            date: fields.date,
            raw_source: raw,
        })
    }

    /// Returns the payload this record was derived from.
    #[must_use]
    pub fn to_raw(&self) -> RawMetadata {
        self.raw_source.clone()
    }

    /// Returns the metadata-XML locator.
    #[must_use]
    pub fn metadata_ref(&self) -> Option<&DocumentRef> {
        self.documentation_refs
            .iter()
            .find(|r| r.kind == DocumentKind::MetadataXml)
    }

    /// Returns true when the record carries exactly one metadata-XML locator.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.documentation_refs
            .iter()
            .filter(|r| r.kind == DocumentKind::MetadataXml)
            .count()
            == 1
    }

    /// Iterates over the PDF documentation locators.
    pub fn pdf_refs(&self) -> impl Iterator<Item = &DocumentRef> {
        self.documentation_refs
            .iter()
            .filter(|r| r.kind == DocumentKind::Pdf)
    }

    /// Iterates over all documentation locators except the metadata document.
    pub fn documentation(&self) -> impl Iterator<Item = &DocumentRef> {
        self.documentation_refs
            .iter()
            .filter(|r| r.kind != DocumentKind::MetadataXml)
    }
}

fn validate_locator(locator: &str) -> Result<(), ParseError> {
    if locator.trim().is_empty() {
        return Err(ParseError::invalid_locator(locator, "locator is empty"));
    }
    let url = Url::parse(locator).map_err(|e| ParseError::invalid_locator(locator, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ParseError::invalid_locator(
            locator,
            format!("scheme '{}' is not supported", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ParseError::invalid_locator(locator, "URL has no host"));
    }
    Ok(())
}
