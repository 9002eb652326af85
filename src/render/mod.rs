//! Rendering of selected records into LaTeX, BibLaTeX, RIS, plain text or TSV.
//!
//! A [`Renderer`] is chosen once per run from a [`Format`]. Rendering itself
//! ([`render_document`]) is pure: the same selection, store and context
//! always produce byte-identical output. [`RenderEngine`] adds the file
//! side, writing the primary document and the four auxiliary index lists
//! through temp files and renames.
//!
//! | Format | Primary | Index lists |
//! |--------|---------|-------------|
//! | LaTeX | `<base>.tex` | LaTeX fragments pulled in with `\InputIfFileExists` |
//! | BibLaTeX | `<base>.bib` | tab-separated text |
//! | RIS | `<base>.ris` | tab-separated text |
//! | Plain | `<base>.txt` | tab-separated text |
//! | TSV | `<base>.tsv` | tab-separated text |
//!
//! Index lists are written to `<base>.aut`, `<base>.pkg`, `<base>.top` and
//! `<base>.ftl`.

mod biblatex;
mod index;
mod latex;
mod plain;
mod ris;
mod tsv;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use index::{IndexEntry, IndexKind, IndexList};

use crate::catalog::CatalogStore;
use crate::download::DEFAULT_MIRROR_BASE;
use crate::filter::Selection;
use crate::fsutil::write_atomic;
use crate::record::Record;

/// Public landing page of a package on CTAN.
pub(crate) const CTAN_PACKAGE_PAGE: &str = "https://ctan.org/pkg/";

/// Output format of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// LaTeX document with a description list per package.
    Latex,
    /// BibLaTeX `@software` entries.
    Biblatex,
    /// RIS records of type `COMP`.
    Ris,
    /// Indented `key: value` text.
    Plain,
    /// Tab-separated values with a header row.
    Tsv,
}

impl Format {
    /// Every supported format.
    pub const ALL: [Self; 5] = [
        Self::Latex,
        Self::Biblatex,
        Self::Ris,
        Self::Plain,
        Self::Tsv,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Latex => "latex",
            Self::Biblatex => "biblatex",
            Self::Ris => "ris",
            Self::Plain => "plain",
            Self::Tsv => "tsv",
        }
    }

    /// File suffix of the primary document.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Latex => "tex",
            Self::Biblatex => "bib",
            Self::Ris => "ris",
            Self::Plain => "txt",
            Self::Tsv => "tsv",
        }
    }

    /// Returns the renderer implementing this format.
    #[must_use]
    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            Self::Latex => Box::new(latex::LatexRenderer),
            Self::Biblatex => Box::new(biblatex::BiblatexRenderer),
            Self::Ris => Box::new(ris::RisRenderer),
            Self::Plain => Box::new(plain::PlainRenderer),
            Self::Tsv => Box::new(tsv::TsvRenderer),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A format name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output format '{0}' (expected one of: latex, biblatex, ris, plain, tsv)")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latex" | "tex" => Ok(Self::Latex),
            "biblatex" | "bib" | "bibtex" => Ok(Self::Biblatex),
            "ris" => Ok(Self::Ris),
            "plain" | "text" | "txt" => Ok(Self::Plain),
            "tsv" => Ok(Self::Tsv),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Inputs that shape rendering besides the records themselves.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Base name of the output files (without suffix).
    pub base_name: String,
    /// Mirror used to turn `ctan:` documentation locators into URLs.
    pub mirror_base: String,
    /// Restricts the file-template list to matching file names.
    pub file_pattern: Option<Regex>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            base_name: "catalog".to_string(),
            mirror_base: DEFAULT_MIRROR_BASE.to_string(),
            file_pattern: None,
        }
    }
}

impl RenderContext {
    /// File name of an index list next to the primary document.
    #[must_use]
    pub fn index_file_name(&self, kind: IndexKind) -> String {
        format!("{}.{}", self.base_name, kind.extension())
    }

    /// Resolved documentation URLs of a record, in catalog order.
    #[must_use]
    pub fn documentation_urls(&self, record: &Record) -> Vec<String> {
        record
            .documentation()
            .map(|doc| doc.resolve(&self.mirror_base))
            .collect()
    }
}

/// Format-specific rendering rules.
///
/// Implementations receive raw field values and apply their own escaping.
/// All methods must be pure.
pub trait Renderer: Send + Sync {
    /// The format this renderer implements.
    fn format(&self) -> Format;

    /// Escapes free text for this format.
    fn escape(&self, text: &str) -> String;

    /// Text emitted once before the first record.
    fn header(&self, ctx: &RenderContext) -> String;

    /// The output unit of one record.
    fn record(&self, record: &Record, ctx: &RenderContext) -> String;

    /// Text emitted once after the last record.
    fn footer(&self, ctx: &RenderContext) -> String;

    /// An auxiliary index list. Defaults to `key<TAB>id, id` lines.
    fn index_list(&self, list: &IndexList, _ctx: &RenderContext) -> String {
        let mut out = String::new();
        for entry in &list.entries {
            let _ = writeln!(
                out,
                "{}\t{}",
                collapse_whitespace(&entry.key),
                entry.ids.join(", ")
            );
        }
        out
    }
}

/// Output of [`render_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Format rendered.
    pub format: Format,
    /// The primary document.
    pub primary: String,
    /// Rendered index lists, in [`IndexKind::ALL`] order.
    pub indexes: Vec<(IndexKind, String)>,
    /// Index lists before rendering, for callers that inspect them.
    pub index_lists: Vec<IndexList>,
    /// Ids that produced an output unit, in selection order.
    pub rendered_ids: Vec<String>,
    /// Selected ids that were absent from the store or invalid.
    pub skipped_ids: Vec<String>,
}

/// Renders the selected records. Pure: no clock, no I/O.
#[must_use]
#[instrument(skip_all, fields(format = %renderer.format(), selected = selection.len()))]
pub fn render_document(
    selection: &Selection,
    store: &CatalogStore,
    renderer: &dyn Renderer,
    ctx: &RenderContext,
) -> RenderedDocument {
    let mut records: Vec<&Record> = Vec::with_capacity(selection.len());
    let mut skipped_ids = Vec::new();
    for id in selection.iter() {
        match store.lookup(id) {
            Some(record) if record.is_valid() => records.push(record),
            _ => {
                warn!(%id, "selected id has no renderable record");
                skipped_ids.push(id.to_string());
            }
        }
    }

    let mut primary = renderer.header(ctx);
    for record in &records {
        primary.push_str(&renderer.record(record, ctx));
    }
    primary.push_str(&renderer.footer(ctx));

    let index_lists = IndexList::build_all(&records, ctx.file_pattern.as_ref());
    let indexes = index_lists
        .iter()
        .map(|list| (list.kind, renderer.index_list(list, ctx)))
        .collect();

    debug!(
        rendered = records.len(),
        skipped = skipped_ids.len(),
        bytes = primary.len(),
        "document rendered"
    );
    RenderedDocument {
        format: renderer.format(),
        primary,
        indexes,
        index_lists,
        rendered_ids: records.iter().map(|r| r.id.clone()).collect(),
        skipped_ids,
    }
}

/// Where rendered files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    /// Output directory.
    pub dir: PathBuf,
    /// Base name shared by all output files.
    pub base_name: String,
}

impl RenderTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
        }
    }

    /// Path of the primary document for `format`.
    #[must_use]
    pub fn primary_path(&self, format: Format) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.base_name, format.extension()))
    }

    /// Path of an index list.
    #[must_use]
    pub fn index_path(&self, kind: IndexKind) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.base_name, kind.extension()))
    }
}

/// Files written by a render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// The primary document.
    pub primary_path: PathBuf,
    /// The index lists, in [`IndexKind::ALL`] order.
    pub index_paths: Vec<PathBuf>,
    /// Number of records rendered.
    pub rendered: usize,
    /// Selected ids that were not rendered.
    pub skipped_ids: Vec<String>,
}

/// Result of a render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Nothing to render; no file was written.
    EmptyInput,
    /// Files were written.
    Rendered(RenderOutput),
}

/// Errors writing rendered output.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Output file could not be written.
    #[error("cannot write {path}: {source}")]
    Io {
        /// Output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Renders and writes output files for one format.
pub struct RenderEngine {
    renderer: Box<dyn Renderer>,
    context: RenderContext,
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("format", &self.renderer.format())
            .field("context", &self.context)
            .finish()
    }
}

impl RenderEngine {
    /// Selects the renderer for `format` once.
    #[must_use]
    pub fn new(format: Format, context: RenderContext) -> Self {
        Self {
            renderer: format.renderer(),
            context,
        }
    }

    /// The configured format.
    #[must_use]
    pub fn format(&self) -> Format {
        self.renderer.format()
    }

    /// Renders `selection` and writes the primary document plus all index lists.
    ///
    /// When nothing can be rendered, returns [`RenderResult::EmptyInput`] and
    /// leaves any previous output untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] if a file cannot be written; files already
    /// renamed into place stay there.
    #[instrument(skip(self, selection, store), fields(format = %self.format(), dir = %target.dir.display()))]
    pub fn render(
        &self,
        selection: &Selection,
        store: &CatalogStore,
        target: &RenderTarget,
    ) -> Result<RenderResult, RenderError> {
        if selection.is_empty() {
            info!("empty selection, nothing rendered");
            return Ok(RenderResult::EmptyInput);
        }

        let ctx = RenderContext {
            base_name: target.base_name.clone(),
            ..self.context.clone()
        };
        let document = render_document(selection, store, self.renderer.as_ref(), &ctx);
        if document.rendered_ids.is_empty() {
            info!(skipped = document.skipped_ids.len(), "no renderable records");
            return Ok(RenderResult::EmptyInput);
        }

        let primary_path = target.primary_path(document.format);
        write_output(&primary_path, &document.primary)?;

        let mut index_paths = Vec::with_capacity(document.indexes.len());
        for (kind, text) in &document.indexes {
            let path = target.index_path(*kind);
            write_output(&path, text)?;
            index_paths.push(path);
        }

        info!(
            path = %primary_path.display(),
            rendered = document.rendered_ids.len(),
            skipped = document.skipped_ids.len(),
            "output written"
        );
        Ok(RenderResult::Rendered(RenderOutput {
            primary_path,
            index_paths,
            rendered: document.rendered_ids.len(),
            skipped_ids: document.skipped_ids,
        }))
    }
}

fn write_output(path: &Path, text: &str) -> Result<(), RenderError> {
    write_atomic(path, text.as_bytes()).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Collapses every run of whitespace (including newlines) to one space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `version (date)`, `version`, `date` or empty.
pub(crate) fn version_label(record: &Record) -> String {
    match (record.version.as_deref(), record.date.as_deref()) {
        (Some(v), Some(d)) => format!("{v} ({d})"),
        (Some(v), None) => v.to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::metadata_locator;
    use crate::record::RawMetadata;
    use tempfile::TempDir;

    pub(super) fn knuth_store() -> CatalogStore {
        let xml = r#"<entry id="pkgA"><name>pkgA</name><caption>Typesetting &amp; more</caption>
            <authorref familyname="Knuth"/>
            <keyval key="topic" value="typesetting"/>
            <license type="knuth"/>
            <version number="3.14" date="2021-02-05"/>
            <documentation href="ctan:/systems/knuth/dist/tex/texbook.pdf"/>
            <file name="plain.tex"/>
            </entry>"#;
        CatalogStore::from_records([Record::parse(RawMetadata::new(
            metadata_locator("https://www.ctan.org/xml/2.0", "pkgA"),
            xml,
        ))
        .unwrap()])
    }

    #[test]
    fn test_format_from_str_and_extension() {
        assert_eq!("LaTeX".parse::<Format>().unwrap(), Format::Latex);
        assert_eq!("bib".parse::<Format>().unwrap(), Format::Biblatex);
        assert_eq!("txt".parse::<Format>().unwrap().extension(), "txt");
        assert!("docx".parse::<Format>().is_err());
        for format in Format::ALL {
            assert_eq!(format.renderer().format(), format);
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
    }

    #[test]
    fn test_render_document_is_byte_identical() {
        let store = knuth_store();
        let selection = Selection::from_ids(["pkgA"]);
        for format in Format::ALL {
            let renderer = format.renderer();
            let ctx = RenderContext::default();
            let first = render_document(&selection, &store, renderer.as_ref(), &ctx);
            let second = render_document(&selection, &store, renderer.as_ref(), &ctx);
            assert_eq!(first, second, "{format} output must be deterministic");
        }
    }

    #[test]
    fn test_render_document_skips_unknown_ids() {
        let store = knuth_store();
        let selection = Selection::from_ids(["ghost", "pkgA"]);
        let doc = render_document(
            &selection,
            &store,
            Format::Plain.renderer().as_ref(),
            &RenderContext::default(),
        );
        assert_eq!(doc.rendered_ids, vec!["pkgA"]);
        assert_eq!(doc.skipped_ids, vec!["ghost"]);
    }

    #[test]
    fn test_engine_writes_primary_and_indexes() {
        let temp = TempDir::new().unwrap();
        let engine = RenderEngine::new(Format::Ris, RenderContext::default());
        let target = RenderTarget::new(temp.path(), "out");

        let result = engine
            .render(&Selection::from_ids(["pkgA"]), &knuth_store(), &target)
            .unwrap();

        let RenderResult::Rendered(output) = result else {
            panic!("expected Rendered");
        };
        assert_eq!(output.primary_path, temp.path().join("out.ris"));
        assert_eq!(output.index_paths.len(), 4);
        for kind in IndexKind::ALL {
            assert!(target.index_path(kind).is_file());
        }
        let authors = std::fs::read_to_string(target.index_path(IndexKind::Authors)).unwrap();
        assert_eq!(authors, "Knuth\tpkgA\n");
    }

    #[test]
    fn test_engine_empty_selection_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let engine = RenderEngine::new(Format::Latex, RenderContext::default());
        let result = engine
            .render(
                &Selection::default(),
                &knuth_store(),
                &RenderTarget::new(temp.path(), "out"),
            )
            .unwrap();
        assert_eq!(result, RenderResult::EmptyInput);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_version_label_variants() {
        let store = knuth_store();
        assert_eq!(version_label(store.lookup("pkgA").unwrap()), "3.14 (2021-02-05)");
    }
}
