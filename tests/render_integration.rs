//! Integration tests for filtering and rendering through the public API.

use ctanmirror_core::catalog::{CatalogStore, metadata_locator};
use ctanmirror_core::filter::{FilterPredicates, Selection, select};
use ctanmirror_core::record::{RawMetadata, Record};
use ctanmirror_core::render::{
    Format, IndexKind, RenderContext, RenderEngine, RenderResult, RenderTarget,
};
use tempfile::TempDir;

const BASE: &str = "https://www.ctan.org/xml/2.0";

fn record(id: &str, xml_body: &str) -> Record {
    let xml = format!(r#"<entry id="{id}"><name>{id}</name>{xml_body}</entry>"#);
    Record::parse(RawMetadata::new(metadata_locator(BASE, id), xml)).unwrap()
}

fn three_packages() -> CatalogStore {
    CatalogStore::from_records([
        record(
            "amsmath",
            r#"<caption>AMS mathematical facilities</caption><authorref givenname="Barbara" familyname="Beeton"/><keyval key="topic" value="maths"/><license type="lppl1.3c"/>"#,
        ),
        record(
            "pgf",
            r#"<caption>Create PostScript and PDF graphics</caption><authorref givenname="Donald" familyname="Knuth"/><authorref givenname="Till" familyname="Tantau"/><keyval key="topic" value="graphics"/><license type="lppl1.3c"/><file name="pgfcore.sty"/><file name="pgf.cfg"/>"#,
        ),
        record(
            "hyperref",
            r#"<caption>Extensive support for hypertext</caption><authorref familyname="Rahtz"/><keyval key="topic" value="hyper"/><license type="lppl1.3"/>"#,
        ),
    ])
}

// ==================== Filter Scenario Tests ====================

#[test]
fn test_author_filter_selects_single_package() {
    let store = three_packages();
    let predicates = FilterPredicates::compile(None, None, Some("Knuth"), None, false).unwrap();
    let selection = select(&store, &predicates);
    assert_eq!(selection.ids(), ["pgf"]);
}

#[test]
fn test_filters_combine_with_and() {
    let store = three_packages();
    let predicates =
        FilterPredicates::compile(None, Some("graphics|maths"), None, Some("lppl1.3c"), false)
            .unwrap();
    assert_eq!(select(&store, &predicates).ids(), ["amsmath", "pgf"]);

    let predicates =
        FilterPredicates::compile(Some("hyper"), Some("graphics"), None, None, false).unwrap();
    assert!(select(&store, &predicates).is_empty());
}

// ==================== Render Scenario Tests ====================

#[test]
fn test_ris_knuth_scenario() {
    let temp = TempDir::new().unwrap();
    let store = CatalogStore::from_records([record(
        "pkgA",
        r#"<caption>A package</caption><authorref familyname="Knuth"/>"#,
    )]);
    let target = RenderTarget::new(temp.path(), "out");
    let engine = RenderEngine::new(Format::Ris, RenderContext::default());

    let result = engine
        .render(&Selection::from_ids(["pkgA"]), &store, &target)
        .unwrap();

    assert!(matches!(result, RenderResult::Rendered(ref out) if out.rendered == 1));
    let ris = std::fs::read_to_string(target.primary_path(Format::Ris)).unwrap();
    assert_eq!(ris.matches("TY  - ").count(), 1);
    assert_eq!(ris.lines().filter(|l| *l == "AU  - Knuth").count(), 1);
    let authors = std::fs::read_to_string(target.index_path(IndexKind::Authors)).unwrap();
    assert_eq!(authors, "Knuth\tpkgA\n");
}

#[test]
fn test_latex_document_and_index_fragments() {
    let temp = TempDir::new().unwrap();
    let store = three_packages();
    let target = RenderTarget::new(temp.path(), "ctan");
    let engine = RenderEngine::new(Format::Latex, RenderContext::default());
    let selection = Selection::from_ids(["pgf", "amsmath"]);

    engine.render(&selection, &store, &target).unwrap();

    let tex = std::fs::read_to_string(temp.path().join("ctan.tex")).unwrap();
    assert_eq!(tex.matches("\\subsection*{").count(), 2);
    assert!(tex.find("{pgf}").unwrap() < tex.find("{amsmath}").unwrap());
    for suffix in ["aut", "pkg", "top", "ftl"] {
        assert!(tex.contains(&format!("\\InputIfFileExists{{ctan.{suffix}}}{{}}{{}}")));
        assert!(temp.path().join(format!("ctan.{suffix}")).is_file());
    }
    let authors = std::fs::read_to_string(temp.path().join("ctan.aut")).unwrap();
    let barbara = authors.find("Barbara Beeton").unwrap();
    let donald = authors.find("Donald Knuth").unwrap();
    let till = authors.find("Till Tantau").unwrap();
    assert!(barbara < donald && donald < till, "authors sorted: {authors}");
}

#[test]
fn test_file_pattern_restricts_template_list() {
    let temp = TempDir::new().unwrap();
    let context = RenderContext {
        file_pattern: Some(regex::Regex::new(r"\.sty$").unwrap()),
        ..RenderContext::default()
    };
    let target = RenderTarget::new(temp.path(), "ctan");
    RenderEngine::new(Format::Plain, context)
        .render(&Selection::from_ids(["pgf"]), &three_packages(), &target)
        .unwrap();

    let templates = std::fs::read_to_string(target.index_path(IndexKind::FileTemplates)).unwrap();
    assert_eq!(templates, "pgfcore.sty\tpgf\n");
}

#[test]
fn test_every_format_renders_missing_fields_as_empty() {
    let store = CatalogStore::from_records([record("bare", "<caption>Bare</caption>")]);
    for format in Format::ALL {
        let temp = TempDir::new().unwrap();
        let target = RenderTarget::new(temp.path(), "bare");
        let result = RenderEngine::new(format, RenderContext::default())
            .render(&Selection::from_ids(["bare"]), &store, &target)
            .unwrap();
        assert!(
            matches!(result, RenderResult::Rendered(ref out) if out.rendered == 1),
            "{format} should render the bare record"
        );
        let text = std::fs::read_to_string(target.primary_path(format)).unwrap();
        assert!(text.contains("bare"), "{format} output lacks the id");
    }
}

#[test]
fn test_empty_selection_writes_no_files() {
    let temp = TempDir::new().unwrap();
    let target = RenderTarget::new(temp.path(), "out");
    let result = RenderEngine::new(Format::Biblatex, RenderContext::default())
        .render(&Selection::default(), &three_packages(), &target)
        .unwrap();
    assert_eq!(result, RenderResult::EmptyInput);
    assert!(!target.primary_path(Format::Biblatex).exists());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
