//! Parsing of the remote CTAN package index.
//!
//! The index is a flat `<packages>` document with one empty `<package>`
//! element per catalog entry:
//!
//! ```text
//! <packages>
//!   <package key="pgf" name="pgf" caption="Create PostScript and PDF graphics in TeX"/>
//! </packages>
//! ```

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

use super::CatalogError;

/// One package listed in the remote index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Package key, used as the record id.
    pub key: String,
    /// Display name.
    pub name: Option<String>,
    /// Short description.
    pub caption: Option<String>,
}

/// The parsed remote index, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    entries: Vec<IndexEntry>,
}

impl RemoteIndex {
    /// Builds an index from already-parsed entries.
    #[must_use]
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    /// Parses the index document.
    ///
    /// `<package>` elements without a `key` attribute are skipped; duplicate
    /// keys keep their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Index`] when the document is not well-formed XML
    /// or contains no `<packages>` root.
    #[instrument(skip(xml), fields(len = xml.len()))]
    pub fn parse(xml: &str) -> Result<Self, CatalogError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut saw_root = false;
        let mut skipped = 0usize;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| CatalogError::index(e.to_string()))?;
            match event {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"packages" => saw_root = true,
                    b"package" => match index_entry(&e)? {
                        Some(entry) if seen.insert(entry.key.clone()) => entries.push(entry),
                        _ => skipped += 1,
                    },
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(CatalogError::index("missing <packages> root element"));
        }

        debug!(entries = entries.len(), skipped, "parsed remote index");
        Ok(Self { entries })
    }

    /// Returns the entries in document order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index lists no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_entry(element: &BytesStart<'_>) -> Result<Option<IndexEntry>, CatalogError> {
    let mut key = None;
    let mut name = None;
    let mut caption = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| CatalogError::index(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| CatalogError::index(e.to_string()))?
            .trim()
            .to_string();
        if value.is_empty() {
            continue;
        }
        match attr.key.as_ref() {
            b"key" => key = Some(value),
            b"name" => name = Some(value),
            b"caption" => caption = Some(value),
            _ => {}
        }
    }
    Ok(key.map(|key| IndexEntry { key, name, caption }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_in_document_order() {
        let xml = r#"<?xml version="1.0"?>
            <packages>
              <package key="12many" name="12many" caption="Generalising mathematical index sets"/>
              <package key="pgf" name="PGF" caption="Graphics &amp; drawing"/>
            </packages>"#;
        let index = RemoteIndex::parse(xml).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries()[0].key, "12many");
        assert_eq!(index.entries()[1].name.as_deref(), Some("PGF"));
        assert_eq!(
            index.entries()[1].caption.as_deref(),
            Some("Graphics & drawing")
        );
    }

    #[test]
    fn test_parse_index_skips_keyless_and_duplicate_entries() {
        let xml = r#"<packages><package name="nokey"/><package key="a"/><package key="a" caption="dup"/></packages>"#;
        let index = RemoteIndex::parse(xml).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.entries()[0].caption.is_none());
    }

    #[test]
    fn test_parse_index_without_root_fails() {
        let err = RemoteIndex::parse("<html><body>Service unavailable</body></html>").unwrap_err();
        assert!(matches!(err, CatalogError::Index { .. }));
    }

    #[test]
    fn test_parse_index_malformed_fails() {
        let err = RemoteIndex::parse("<packages><package key=\"a\"></packages>").unwrap_err();
        assert!(matches!(err, CatalogError::Index { .. }));
    }
}
