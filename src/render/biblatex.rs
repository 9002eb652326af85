//! BibLaTeX output: one `@software` entry per package.

use std::fmt::Write as _;

use super::latex::escape_latex;
use super::{CTAN_PACKAGE_PAGE, Format, RenderContext, Renderer};
use crate::record::Record;

pub(super) struct BiblatexRenderer;

/// Citation keys may not contain whitespace, commas, braces or quotes.
fn citation_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '+' | '/') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn field(out: &mut String, name: &str, value: &str) {
    let _ = writeln!(out, "  {name:<9} = {{{value}}},");
}

impl Renderer for BiblatexRenderer {
    fn format(&self) -> Format {
        Format::Biblatex
    }

    fn escape(&self, text: &str) -> String {
        escape_latex(text)
    }

    fn header(&self, _ctx: &RenderContext) -> String {
        "% Generated by ctanmirror. Do not edit.\n".to_string()
    }

    fn record(&self, record: &Record, ctx: &RenderContext) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n@software{{{},", citation_key(&record.id));
        let authors: Vec<String> = record.authors.iter().map(|a| self.escape(a)).collect();
        field(&mut out, "author", &authors.join(" and "));
        field(&mut out, "title", &self.escape(&record.title));
        field(&mut out, "shorthand", &self.escape(&record.name));
        field(
            &mut out,
            "version",
            &self.escape(record.version.as_deref().unwrap_or_default()),
        );
        field(
            &mut out,
            "date",
            &self.escape(record.date.as_deref().unwrap_or_default()),
        );
        field(
            &mut out,
            "license",
            &self.escape(record.license.as_deref().unwrap_or_default()),
        );
        let topics: Vec<String> = record.topics.iter().map(|t| self.escape(t)).collect();
        field(&mut out, "keywords", &topics.join(", "));
        field(&mut out, "url", &format!("{CTAN_PACKAGE_PAGE}{}", record.id));
        let docs = ctx.documentation_urls(record);
        field(&mut out, "file", &docs.first().cloned().unwrap_or_default());
        out.push_str("}\n");
        out
    }

    fn footer(&self, _ctx: &RenderContext) -> String {
        String::new()
    }
}
