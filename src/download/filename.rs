//! Local file names for cached artifacts.
//!
//! Metadata documents are stored as `<id>.xml`; documentation files as
//! `<id>-<basename>` so two packages shipping a `manual.pdf` never collide.

use std::path::{Component, Path};

use crate::record::{DocumentKind, DocumentRef};

/// Returns the local file name of an artifact belonging to `record_id`.
///
/// The name is derived from the last path segment of the locator, URL-decoded
/// and sanitized; it never contains path separators or dot segments.
///
/// # Example
///
/// ```
/// use ctanmirror_core::download::artifact_file_name;
/// use ctanmirror_core::record::DocumentRef;
///
/// let xml = DocumentRef::metadata("https://www.ctan.org/xml/2.0/pkg/pgf");
/// assert_eq!(artifact_file_name(&xml, "pgf"), "pgf.xml");
///
/// let pdf = DocumentRef::documentation("ctan:/graphics/pgf/doc/pgfmanual.pdf", None);
/// assert_eq!(artifact_file_name(&pdf, "pgf"), "pgf-pgfmanual.pdf");
/// ```
#[must_use]
pub fn artifact_file_name(doc: &DocumentRef, record_id: &str) -> String {
    let id = sanitize_filename(record_id);
    match doc.kind {
        DocumentKind::MetadataXml => {
            let stem = basename(&doc.locator).unwrap_or_else(|| id.clone());
            if stem.ends_with(".xml") {
                stem
            } else {
                format!("{stem}.xml")
            }
        }
        DocumentKind::Pdf | DocumentKind::Other => match basename(&doc.locator) {
            Some(base) => format!("{id}-{base}"),
            None => format!("{id}-{}", doc.kind.as_str()),
        },
    }
}

fn basename(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    let last = last.strip_prefix("ctan:").unwrap_or(last);
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    (!sanitized.trim_matches('_').is_empty()).then_some(sanitized)
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) and neutralizes `.`/`..`.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file/name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file\\name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("a:b*c?.pdf"), "a_b_c_.pdf");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(""), "_");
    }

    #[test]
    fn test_metadata_name_uses_last_segment() {
        let doc = DocumentRef::metadata("https://www.ctan.org/xml/2.0/pkg/tikz-cd");
        assert_eq!(artifact_file_name(&doc, "tikz-cd"), "tikz-cd.xml");
    }

    #[test]
    fn test_metadata_name_decodes_percent_escapes() {
        let doc = DocumentRef::metadata("https://www.ctan.org/xml/2.0/pkg/a%20b");
        assert_eq!(artifact_file_name(&doc, "a b"), "a b.xml");
    }

    #[test]
    fn test_metadata_name_falls_back_to_id() {
        let doc = DocumentRef::metadata("https://www.ctan.org/xml/2.0/pkg/..");
        assert_eq!(artifact_file_name(&doc, "pgf"), "pgf.xml");
    }

    #[test]
    fn test_pdf_name_is_prefixed_with_id() {
        let doc = DocumentRef::documentation(
            "https://mirrors.ctan.org/macros/latex/contrib/x/manual.pdf?raw=1",
            None,
        );
        assert_eq!(artifact_file_name(&doc, "x"), "x-manual.pdf");
    }

    #[test]
    fn test_pdf_name_never_escapes_directory() {
        let doc = DocumentRef::documentation("ctan:/../..", None);
        let name = artifact_file_name(&doc, "../evil");
        assert!(!name.contains('/'));
        assert!(is_safe_filename_segment(&name));
    }
}
