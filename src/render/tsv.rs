//! Tab-separated output: a header row and one row per package.

use super::{Format, RenderContext, Renderer};
use crate::record::Record;

pub(super) struct TsvRenderer;

const COLUMNS: [&str; 9] = [
    "id",
    "name",
    "title",
    "authors",
    "topics",
    "license",
    "version",
    "date",
    "documentation",
];

impl Renderer for TsvRenderer {
    fn format(&self) -> Format {
        Format::Tsv
    }

    fn escape(&self, text: &str) -> String {
        text.chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect()
    }

    fn header(&self, _ctx: &RenderContext) -> String {
        format!("{}\n", COLUMNS.join("\t"))
    }

    fn record(&self, record: &Record, ctx: &RenderContext) -> String {
        let joined_authors = record.authors.join("; ");
        let joined_topics = record
            .topics
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ");
        let docs = ctx.documentation_urls(record).join("; ");
        let row = [
            record.id.as_str(),
            record.name.as_str(),
            record.title.as_str(),
            joined_authors.as_str(),
            joined_topics.as_str(),
            record.license.as_deref().unwrap_or_default(),
            record.version.as_deref().unwrap_or_default(),
            record.date.as_deref().unwrap_or_default(),
            docs.as_str(),
        ];
        let cells: Vec<String> = row.iter().map(|cell| self.escape(cell)).collect();
        format!("{}\n", cells.join("\t"))
    }

    fn footer(&self, _ctx: &RenderContext) -> String {
        String::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::Selection;
    use crate::render::render_document;
    use crate::render::tests::knuth_store;

    #[test]
    fn test_header_and_row_have_same_width() {
        let doc = render_document(
            &Selection::from_ids(["pkgA"]),
            &knuth_store(),
            &TsvRenderer,
            &RenderContext::default(),
        );
        let lines: Vec<&str> = doc.primary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split('\t').count(), COLUMNS.len());
        assert_eq!(lines[1].split('\t').count(), COLUMNS.len());
        assert!(lines[1].starts_with("pkgA\tpkgA\tTypesetting & more\tKnuth\t"));
    }

    #[test]
    fn test_escape_replaces_tabs_and_newlines() {
        assert_eq!(TsvRenderer.escape("a\tb\nc\r"), "a b c ");
    }
}
