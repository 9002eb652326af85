//! LaTeX output: one `\subsection*` with a description list per package.

use std::fmt::Write as _;

use super::{
    CTAN_PACKAGE_PAGE, Format, IndexKind, IndexList, RenderContext, Renderer, collapse_whitespace,
    version_label,
};
use crate::record::Record;

pub(super) struct LatexRenderer;

/// Escapes the ten LaTeX special characters and collapses whitespace.
///
/// Square brackets are braced so that escaped text can stand in an
/// optional argument such as an `\item` label.
pub(super) fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in collapse_whitespace(text).chars() {
        match ch {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                out.push('\\');
                out.push(ch);
            }
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '[' => out.push_str("{[}"),
            ']' => out.push_str("{]}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes the characters `\url` cannot take verbatim inside another argument.
pub(super) fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for ch in url.chars() {
        if matches!(ch, '%' | '#' | '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn item(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "  \\item[{label}] {value}");
}

impl Renderer for LatexRenderer {
    fn format(&self) -> Format {
        Format::Latex
    }

    fn escape(&self, text: &str) -> String {
        escape_latex(text)
    }

    fn header(&self, _ctx: &RenderContext) -> String {
        concat!(
            "% Generated by ctanmirror. Do not edit.\n",
            "\\documentclass{article}\n",
            "\\usepackage[T1]{fontenc}\n",
            "\\usepackage{hyperref}\n",
            "\\begin{document}\n",
            "\\section*{CTAN packages}\n",
        )
        .to_string()
    }

    fn record(&self, record: &Record, ctx: &RenderContext) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n\\subsection*{{{}}}", self.escape(&record.name));
        out.push_str("\\begin{description}\n");
        item(&mut out, "Id", &self.escape(&record.id));
        item(&mut out, "Title", &self.escape(&record.title));
        let authors: Vec<String> = record.authors.iter().map(|a| self.escape(a)).collect();
        item(&mut out, "Authors", &authors.join("; "));
        let topics: Vec<String> = record.topics.iter().map(|t| self.escape(t)).collect();
        item(&mut out, "Topics", &topics.join(", "));
        item(
            &mut out,
            "License",
            &self.escape(record.license.as_deref().unwrap_or_default()),
        );
        item(&mut out, "Version", &self.escape(&version_label(record)));
        let docs: Vec<String> = ctx
            .documentation_urls(record)
            .iter()
            .map(|u| format!("\\url{{{}}}", escape_url(u)))
            .collect();
        item(&mut out, "Documentation", &docs.join("; "));
        item(
            &mut out,
            "CTAN",
            &format!("\\url{{{}}}", escape_url(&format!("{CTAN_PACKAGE_PAGE}{}", record.id))),
        );
        out.push_str("\\end{description}\n");
        out
    }

    fn footer(&self, ctx: &RenderContext) -> String {
        let mut out = String::from("\n");
        for kind in IndexKind::ALL {
            let _ = writeln!(out, "\\InputIfFileExists{{{}}}{{}}{{}}", ctx.index_file_name(kind));
        }
        out.push_str("\\end{document}\n");
        out
    }

    fn index_list(&self, list: &IndexList, _ctx: &RenderContext) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\\section*{{{}}}", list.kind.title());
        if list.is_empty() {
            return out;
        }
        out.push_str("\\begin{description}\n");
        for entry in &list.entries {
            let ids: Vec<String> = entry.ids.iter().map(|id| self.escape(id)).collect();
            item(&mut out, &self.escape(&entry.key), &ids.join(", "));
        }
        out.push_str("\\end{description}\n");
        out
    }
}
