//! Auxiliary index lists: cross references from authors, package names,
//! topics and shipped files back to the records that carry them.

use std::collections::BTreeMap;

use regex::Regex;

use crate::record::Record;

/// Which cross reference a list holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKind {
    /// Author name → packages.
    Authors,
    /// Package display name → packages.
    Packages,
    /// Topic tag → packages.
    Topics,
    /// Shipped file name → packages.
    FileTemplates,
}

impl IndexKind {
    /// All kinds, in the order their files are written.
    pub const ALL: [Self; 4] = [
        Self::Authors,
        Self::Packages,
        Self::Topics,
        Self::FileTemplates,
    ];

    /// File suffix of the list.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Authors => "aut",
            Self::Packages => "pkg",
            Self::Topics => "top",
            Self::FileTemplates => "ftl",
        }
    }

    /// Heading used when the list is rendered.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Authors => "Authors",
            Self::Packages => "Packages",
            Self::Topics => "Topics",
            Self::FileTemplates => "Files",
        }
    }
}

/// One key of an index list and the records carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The indexed value.
    pub key: String,
    /// Record ids in selection order, without duplicates.
    pub ids: Vec<String>,
}

/// A sorted, deduplicated cross-reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexList {
    /// What the keys are.
    pub kind: IndexKind,
    /// Entries sorted case-insensitively, ties broken by the exact key.
    pub entries: Vec<IndexEntry>,
}

impl IndexList {
    /// Builds one list from `records` (in selection order).
    ///
    /// File names are only indexed when they match `file_pattern` (all
    /// files when `None`).
    #[must_use]
    pub fn build(kind: IndexKind, records: &[&Record], file_pattern: Option<&Regex>) -> Self {
        let mut keyed: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for record in records {
            let keys: Vec<&str> = match kind {
                IndexKind::Authors => record.authors.iter().map(String::as_str).collect(),
                IndexKind::Packages => vec![record.name.as_str()],
                IndexKind::Topics => record.topics.iter().map(String::as_str).collect(),
                IndexKind::FileTemplates => record
                    .contained_files
                    .iter()
                    .map(String::as_str)
                    .filter(|f| file_pattern.is_none_or(|re| re.is_match(f)))
                    .collect(),
            };
            for key in keys {
                let ids = keyed
                    .entry((key.to_lowercase(), key.to_string()))
                    .or_default();
                if !ids.contains(&record.id) {
                    ids.push(record.id.clone());
                }
            }
        }

        Self {
            kind,
            entries: keyed
                .into_iter()
                .map(|((_, key), ids)| IndexEntry { key, ids })
                .collect(),
        }
    }

    /// Builds all four lists.
    #[must_use]
    pub fn build_all(records: &[&Record], file_pattern: Option<&Regex>) -> Vec<Self> {
        IndexKind::ALL
            .iter()
            .map(|&kind| Self::build(kind, records, file_pattern))
            .collect()
    }

    /// Looks up the ids recorded for `key`.
    #[must_use]
    pub fn ids_for(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.ids.as_slice())
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::RawMetadata;

    fn record(id: &str, authors: &[&str], files: &[&str]) -> Record {
        let mut xml = format!(r#"<entry id="{id}"><caption>{id}</caption>"#);
        for author in authors {
            xml.push_str(&format!("<authorref>{author}</authorref>"));
        }
        for file in files {
            xml.push_str(&format!(r#"<file name="{file}"/>"#));
        }
        xml.push_str("</entry>");
        Record::parse(RawMetadata::new(
            format!("https://www.ctan.org/xml/2.0/pkg/{id}"),
            xml,
        ))
        .unwrap()
    }

    #[test]
    fn test_authors_sorted_case_insensitively_with_ids_in_order() {
        let b = record("b", &["knuth", "Lamport"], &[]);
        let a = record("a", &["Knuth"], &[]);
        let list = IndexList::build(IndexKind::Authors, &[&b, &a], None);
        let keys: Vec<&str> = list.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["Knuth", "knuth", "Lamport"]);
        assert_eq!(list.ids_for("Knuth").unwrap(), ["a"]);
    }

    #[test]
    fn test_shared_key_collects_ids_in_selection_order() {
        let z = record("z", &["Knuth"], &[]);
        let a = record("a", &["Knuth"], &[]);
        let list = IndexList::build(IndexKind::Authors, &[&z, &a], None);
        assert_eq!(list.len(), 1);
        assert_eq!(list.ids_for("Knuth").unwrap(), ["z", "a"]);
    }

    #[test]
    fn test_file_templates_respect_pattern() {
        let r = record("pgf", &[], &["pgf.sty", "pgfmanual.pdf", "tikz.sty"]);
        let re = Regex::new(r"\.sty$").unwrap();
        let list = IndexList::build(IndexKind::FileTemplates, &[&r], Some(&re));
        let keys: Vec<&str> = list.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["pgf.sty", "tikz.sty"]);
    }

    #[test]
    fn test_build_all_returns_every_kind() {
        let r = record("pgf", &[], &[]);
        let lists = IndexList::build_all(&[&r], None);
        assert_eq!(
            lists.iter().map(|l| l.kind).collect::<Vec<_>>(),
            IndexKind::ALL.to_vec()
        );
        assert!(lists[0].is_empty());
        assert_eq!(lists[1].ids_for("pgf").unwrap(), ["pgf"]);
    }
}
