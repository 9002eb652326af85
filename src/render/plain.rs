//! Plain text output: the id on its own line, then indented `key: value` lines.

use std::fmt::Write as _;

use super::{Format, RenderContext, Renderer, version_label};
use crate::record::Record;

pub(super) struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn format(&self) -> Format {
        Format::Plain
    }

    fn escape(&self, text: &str) -> String {
        text.split(char::is_control)
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn header(&self, _ctx: &RenderContext) -> String {
        String::new()
    }

    fn record(&self, record: &Record, ctx: &RenderContext) -> String {
        let authors: Vec<String> = record.authors.iter().map(|a| self.escape(a)).collect();
        let topics: Vec<String> = record.topics.iter().map(|t| self.escape(t)).collect();
        let fields = [
            ("name", self.escape(&record.name)),
            ("title", self.escape(&record.title)),
            ("authors", authors.join("; ")),
            ("topics", topics.join(", ")),
            (
                "license",
                self.escape(record.license.as_deref().unwrap_or_default()),
            ),
            ("version", self.escape(&version_label(record))),
            ("documentation", ctx.documentation_urls(record).join("; ")),
        ];

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.escape(&record.id));
        for (key, value) in fields {
            let _ = writeln!(out, "  {key}: {value}");
        }
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
    use crate::render::tests::knuth_store;

    #[test]
    fn test_record_layout() {
        let store = knuth_store();
        let unit = PlainRenderer.record(store.lookup("pkgA").unwrap(), &RenderContext::default());
        let lines: Vec<&str> = unit.lines().collect();
        assert_eq!(lines[0], "pkgA");
        assert_eq!(lines[2], "  title: Typesetting & more");
        assert_eq!(lines[3], "  authors: Knuth");
        assert_eq!(lines[6], "  version: 3.14 (2021-02-05)");
        assert!(unit.ends_with("\n\n"));
    }

    #[test]
    fn test_escape_strips_control_characters() {
        assert_eq!(PlainRenderer.escape("a\u{7}b\r\nc"), "a b c");
    }
}
