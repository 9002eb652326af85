//! RIS output: one `TY  - COMP` ... `ER  - ` block per package.

use std::fmt::Write as _;

use super::{CTAN_PACKAGE_PAGE, Format, RenderContext, Renderer, collapse_whitespace};
use crate::record::Record;

pub(super) struct RisRenderer;

fn tag(out: &mut String, name: &str, value: &str) {
    let _ = writeln!(out, "{name}  - {value}");
}

impl Renderer for RisRenderer {
    fn format(&self) -> Format {
        Format::Ris
    }

    fn escape(&self, text: &str) -> String {
        collapse_whitespace(text)
    }

    fn header(&self, _ctx: &RenderContext) -> String {
        String::new()
    }

    fn record(&self, record: &Record, ctx: &RenderContext) -> String {
        let mut out = String::new();
        tag(&mut out, "TY", "COMP");
        tag(&mut out, "ID", &self.escape(&record.id));
        tag(&mut out, "TI", &self.escape(&record.title));
        tag(&mut out, "ST", &self.escape(&record.name));
        for author in &record.authors {
            tag(&mut out, "AU", &self.escape(author));
        }
        for topic in &record.topics {
            tag(&mut out, "KW", &self.escape(topic));
        }
        tag(
            &mut out,
            "ET",
            &self.escape(record.version.as_deref().unwrap_or_default()),
        );
        tag(
            &mut out,
            "DA",
            &self.escape(record.date.as_deref().unwrap_or_default()),
        );
        tag(&mut out, "UR", &format!("{CTAN_PACKAGE_PAGE}{}", record.id));
        for url in ctx.documentation_urls(record) {
            tag(&mut out, "L1", &url);
        }
        let license = record
            .license
            .as_deref()
            .map(|l| format!("License: {}", self.escape(l)))
            .unwrap_or_default();
        tag(&mut out, "N1", &license);
        tag(&mut out, "ER", "");
        out.push('\n');
        out
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
    fn test_single_record_single_block() {
        let doc = render_document(
            &Selection::from_ids(["pkgA"]),
            &knuth_store(),
            &RisRenderer,
            &RenderContext::default(),
        );
        assert_eq!(doc.primary.matches("TY  - ").count(), 1);
        assert_eq!(doc.primary.matches("ER  - ").count(), 1);
        assert_eq!(
            doc.primary.lines().filter(|l| *l == "AU  - Knuth").count(),
            1
        );
        assert!(doc.primary.starts_with("TY  - COMP\n"));
        assert!(doc.primary.contains("N1  - License: knuth\n"));
        assert!(doc.primary.contains(
            "L1  - https://mirrors.ctan.org/systems/knuth/dist/tex/texbook.pdf\n"
        ));
    }

    #[test]
    fn test_escape_collapses_newlines() {
        assert_eq!(RisRenderer.escape("a\nb\t c"), "a b c");
    }
}
