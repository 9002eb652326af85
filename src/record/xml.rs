//! Streaming extraction of CTAN `<entry>` metadata documents.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Raw field values pulled out of one `<entry>` document, before normalization.
#[derive(Debug, Default)]
pub(super) struct EntryFields {
    pub(super) id: Option<String>,
    pub(super) name: Option<String>,
    pub(super) caption: Option<String>,
    pub(super) authors: Vec<String>,
    pub(super) topics: Vec<String>,
    pub(super) licenses: Vec<String>,
    pub(super) version: Option<String>,
    pub(super) date: Option<String>,
    /// `(href, details)` pairs in document order.
    pub(super) documentation: Vec<(String, Option<String>)>,
    pub(super) files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Name,
    Caption,
    Author,
}

/// Parses an `<entry>` document into its raw fields.
///
/// Unknown elements are ignored, so payloads from newer schema revisions still parse.
pub(super) fn parse_entry(xml: &str) -> Result<EntryFields, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = EntryFields::default();
    let mut target: Option<TextTarget> = None;
    let mut text = String::new();
    // Author id used when an <authorref> carries neither names nor text.
    let mut author_fallback: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"name" => {
                    target = Some(TextTarget::Name);
                    text.clear();
                }
                b"caption" => {
                    target = Some(TextTarget::Caption);
                    text.clear();
                }
                b"authorref" => {
                    if let Some(author) = author_from_attributes(&e)? {
                        fields.authors.push(author);
                    } else {
                        target = Some(TextTarget::Author);
                        author_fallback = attribute(&e, b"id")?;
                        text.clear();
                    }
                }
                _ => collect_attributes(&e, &mut fields)?,
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"authorref" {
                    let author = match author_from_attributes(&e)? {
                        Some(author) => Some(author),
                        None => attribute(&e, b"id")?,
                    };
                    fields.authors.extend(author);
                } else {
                    collect_attributes(&e, &mut fields)?;
                }
            }
            Event::Text(t) => {
                if target.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if target.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let finished = match (e.local_name().as_ref(), target) {
                    (b"name", Some(TextTarget::Name)) => Some(TextTarget::Name),
                    (b"caption", Some(TextTarget::Caption)) => Some(TextTarget::Caption),
                    (b"authorref", Some(TextTarget::Author)) => Some(TextTarget::Author),
                    _ => None,
                };
                if let Some(finished) = finished {
                    let value = collapse_whitespace(&text);
                    match finished {
                        TextTarget::Name => fields.name = non_empty(value),
                        TextTarget::Caption => fields.caption = non_empty(value),
                        TextTarget::Author => {
                            fields
                                .authors
                                .extend(non_empty(value).or_else(|| author_fallback.take()));
                        }
                    }
                    target = None;
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

fn collect_attributes(e: &BytesStart<'_>, fields: &mut EntryFields) -> Result<(), quick_xml::Error> {
    match e.local_name().as_ref() {
        b"entry" => {
            if fields.id.is_none() {
                fields.id = attribute(e, b"id")?.and_then(non_empty);
            }
        }
        b"keyval" => {
            if attribute(e, b"key")?.as_deref() == Some("topic")
                && let Some(topic) = attribute(e, b"value")?.and_then(non_empty)
            {
                fields.topics.push(topic);
            }
        }
        b"license" => {
            fields
                .licenses
                .extend(attribute(e, b"type")?.and_then(non_empty));
        }
        b"version" => {
            fields.version = attribute(e, b"number")?.and_then(non_empty);
            fields.date = attribute(e, b"date")?.and_then(non_empty);
        }
        b"documentation" => {
            if let Some(href) = attribute(e, b"href")?.and_then(non_empty) {
                let details = attribute(e, b"details")?.and_then(non_empty);
                fields.documentation.push((href, details));
            }
        }
        b"ctan" => {
            if attribute(e, b"file")?.as_deref() == Some("true")
                && let Some(path) = attribute(e, b"path")?
                && let Some(file) = path.rsplit('/').next().and_then(|f| non_empty(f.to_string()))
            {
                fields.files.push(file);
            }
        }
        b"file" => {
            fields.files.extend(attribute(e, b"name")?.and_then(non_empty));
        }
        _ => {}
    }
    Ok(())
}

fn author_from_attributes(e: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    let given = attribute(e, b"givenname")?.unwrap_or_default();
    let family = attribute(e, b"familyname")?.unwrap_or_default();
    let joined = collapse_whitespace(&format!("{given} {family}"));
    Ok(non_empty(joined))
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_reads_attribute_and_text_fields() {
        let xml = r#"<entry id="pgf">
            <name>pgf</name>
            <caption>Create PostScript and PDF graphics in TeX</caption>
            <authorref givenname="Till" familyname="Tantau" id="tantau"/>
            <license type="lppl1.3c"/>
            <version number="3.1.10" date="2023-01-13"/>
            <keyval key="topic" value="graphics"/>
            <keyval key="other" value="ignored"/>
            <documentation details="Manual" href="ctan:/graphics/pgf/base/doc/pgfmanual.pdf"/>
        </entry>"#;
        let fields = parse_entry(xml).unwrap();
        assert_eq!(fields.id.as_deref(), Some("pgf"));
        assert_eq!(fields.name.as_deref(), Some("pgf"));
        assert_eq!(
            fields.caption.as_deref(),
            Some("Create PostScript and PDF graphics in TeX")
        );
        assert_eq!(fields.authors, vec!["Till Tantau"]);
        assert_eq!(fields.topics, vec!["graphics"]);
        assert_eq!(fields.licenses, vec!["lppl1.3c"]);
        assert_eq!(fields.version.as_deref(), Some("3.1.10"));
        assert_eq!(fields.date.as_deref(), Some("2023-01-13"));
        assert_eq!(fields.documentation.len(), 1);
        assert_eq!(fields.documentation[0].1.as_deref(), Some("Manual"));
    }

    #[test]
    fn test_parse_entry_author_text_and_id_fallback() {
        let xml = r#"<entry id="x"><authorref id="knuth">Donald  Knuth</authorref><authorref id="anon"/></entry>"#;
        let fields = parse_entry(xml).unwrap();
        assert_eq!(fields.authors, vec!["Donald Knuth", "anon"]);
    }

    #[test]
    fn test_parse_entry_unescapes_entities() {
        let xml = r#"<entry id="amp"><caption>Tables &amp; figures</caption></entry>"#;
        let fields = parse_entry(xml).unwrap();
        assert_eq!(fields.caption.as_deref(), Some("Tables & figures"));
    }

    #[test]
    fn test_parse_entry_collects_files() {
        let xml = r#"<entry id="f"><ctan path="/macros/latex/contrib/f/f.sty" file="true"/><ctan path="/macros/latex/contrib/g"/><file name="f.cls"/></entry>"#;
        let fields = parse_entry(xml).unwrap();
        assert_eq!(fields.files, vec!["f.sty", "f.cls"]);
    }

    #[test]
    fn test_parse_entry_rejects_mismatched_tags() {
        let result = parse_entry("<entry id=\"x\"><caption>broken</name></entry>");
        assert!(result.is_err());
    }
}
