//! Selection of catalog records by name, topic, author and license patterns.
//!
//! Patterns are unanchored regular expressions. A record is selected when it
//! matches every configured predicate kind; within a multi-valued field
//! (authors, topics) one matching value is enough. The result keeps the
//! store's insertion order, so the same store and predicates always yield
//! the same selection.

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::catalog::CatalogStore;
use crate::record::Record;

/// A pattern that failed to compile.
#[derive(Debug, Error)]
#[error("invalid {field} pattern '{pattern}': {source}")]
pub struct PatternError {
    /// Which predicate the pattern belongs to.
    pub field: &'static str,
    /// The rejected pattern.
    pub pattern: String,
    /// Compiler diagnostics.
    #[source]
    pub source: regex::Error,
}

/// Compiled filter predicates. `None` means "match everything".
#[derive(Debug, Clone, Default)]
pub struct FilterPredicates {
    name: Option<Regex>,
    topic: Option<Regex>,
    author: Option<Regex>,
    license: Option<Regex>,
}

impl FilterPredicates {
    /// Predicates that select every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Compiles the given patterns. Empty strings count as absent.
    ///
    /// Matching is case-insensitive when `ignore_case` is set.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first pattern that does not compile.
    pub fn compile(
        name: Option<&str>,
        topic: Option<&str>,
        author: Option<&str>,
        license: Option<&str>,
        ignore_case: bool,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            name: compile_one("name", name, ignore_case)?,
            topic: compile_one("topic", topic, ignore_case)?,
            author: compile_one("author", author, ignore_case)?,
            license: compile_one("license", license, ignore_case)?,
        })
    }

    /// Returns true when no predicate is configured.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.name.is_none() && self.topic.is_none() && self.author.is_none() && self.license.is_none()
    }

    /// Returns true when a predicate reads fields that only a full metadata
    /// document provides (topics, authors, license).
    #[must_use]
    pub fn needs_full_metadata(&self) -> bool {
        self.topic.is_some() || self.author.is_some() || self.license.is_some()
    }

    /// The name predicate alone.
    #[must_use]
    pub fn names_only(&self) -> Self {
        Self {
            name: self.name.clone(),
            ..Self::default()
        }
    }

    /// Evaluates all predicates against one record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let name_ok = self
            .name
            .as_ref()
            .is_none_or(|re| re.is_match(&record.id) || re.is_match(&record.name));
        let topic_ok = self
            .topic
            .as_ref()
            .is_none_or(|re| record.topics.iter().any(|t| re.is_match(t)));
        let author_ok = self
            .author
            .as_ref()
            .is_none_or(|re| record.authors.iter().any(|a| re.is_match(a)));
        let license_ok = self
            .license
            .as_ref()
            .is_none_or(|re| record.license.as_deref().is_some_and(|l| re.is_match(l)));
        name_ok && topic_ok && author_ok && license_ok
    }
}

fn compile_one(
    field: &'static str,
    pattern: Option<&str>,
    ignore_case: bool,
) -> Result<Option<Regex>, PatternError> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map(Some)
        .map_err(|source| PatternError {
            field,
            pattern: pattern.to_string(),
            source,
        })
}

/// Ordered ids of the selected records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    /// Builds a selection from ids, dropping duplicates but keeping first positions.
    #[must_use]
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    /// Selected ids in catalog order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Iterates over the selected ids.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of selected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Evaluates `predicates` against every valid record of `store`.
#[must_use]
#[instrument(skip_all, fields(records = store.len()))]
pub fn select(store: &CatalogStore, predicates: &FilterPredicates) -> Selection {
    let ids: Vec<String> = store
        .records()
        .iter()
        .filter(|record| record.is_valid() && predicates.matches(record))
        .map(|record| record.id.clone())
        .collect();
    debug!(selected = ids.len(), "filter applied");
    Selection { ids }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::metadata_locator;
    use crate::record::RawMetadata;

    fn record(id: &str, authors: &[&str], topics: &[&str], license: Option<&str>) -> Record {
        let mut xml = format!(r#"<entry id="{id}"><name>{id}</name><caption>Caption of {id}</caption>"#);
        for author in authors {
            xml.push_str(&format!("<authorref>{author}</authorref>"));
        }
        for topic in topics {
            xml.push_str(&format!(r#"<keyval key="topic" value="{topic}"/>"#));
        }
        if let Some(license) = license {
            xml.push_str(&format!(r#"<license type="{license}"/>"#));
        }
        xml.push_str("</entry>");
        Record::parse(RawMetadata::new(
            metadata_locator("https://www.ctan.org/xml/2.0", id),
            xml,
        ))
        .unwrap()
    }

    fn store() -> CatalogStore {
        CatalogStore::from_records([
            record("amsmath", &["American Mathematical Society"], &["maths"], Some("lppl1.3c")),
            record("pgf", &["Till Tantau", "Donald Knuth"], &["graphics", "pgf-tikz"], Some("gpl")),
            record("etoolbox", &["Philipp Lehman"], &["macro-supp"], None),
        ])
    }

    #[test]
    fn test_select_without_predicates_keeps_store_order() {
        let selection = select(&store(), &FilterPredicates::all());
        assert_eq!(selection.ids(), ["amsmath", "pgf", "etoolbox"]);
    }

    #[test]
    fn test_names_only_drops_metadata_predicates() {
        let predicates =
            FilterPredicates::compile(Some("^(pgf|amsmath)$"), None, Some("Knuth"), None, false)
                .unwrap();
        assert!(predicates.needs_full_metadata());

        let names = predicates.names_only();
        assert!(!names.needs_full_metadata());
        assert_eq!(select(&store(), &names).ids(), ["amsmath", "pgf"]);
        assert!(!FilterPredicates::compile(Some("pgf"), None, None, None, false)
            .unwrap()
            .needs_full_metadata());
    }

    #[test]
    fn test_select_by_author() {
        let predicates = FilterPredicates::compile(None, None, Some("Knuth"), None, false).unwrap();
        assert_eq!(select(&store(), &predicates).ids(), ["pgf"]);
    }

    #[test]
    fn test_select_predicates_are_anded() {
        let predicates =
            FilterPredicates::compile(Some("^a"), Some("graphics"), None, None, false).unwrap();
        assert!(select(&store(), &predicates).is_empty());
    }

    #[test]
    fn test_select_topic_matches_any_value() {
        let predicates = FilterPredicates::compile(None, Some("tikz"), None, None, false).unwrap();
        assert_eq!(select(&store(), &predicates).ids(), ["pgf"]);
    }

    #[test]
    fn test_select_license_requires_a_license() {
        let predicates = FilterPredicates::compile(None, None, None, Some("."), false).unwrap();
        assert_eq!(select(&store(), &predicates).ids(), ["amsmath", "pgf"]);
    }

    #[test]
    fn test_select_ignore_case() {
        let predicates = FilterPredicates::compile(Some("PGF"), None, None, None, true).unwrap();
        assert_eq!(select(&store(), &predicates).ids(), ["pgf"]);
    }

    #[test]
    fn test_select_is_deterministic() {
        let predicates = FilterPredicates::compile(Some("o"), None, None, None, false).unwrap();
        let store = store();
        assert_eq!(select(&store, &predicates), select(&store, &predicates));
    }

    #[test]
    fn test_compile_rejects_invalid_pattern() {
        let err = FilterPredicates::compile(None, Some("("), None, None, false).unwrap_err();
        assert_eq!(err.field, "topic");
        assert!(err.to_string().contains("invalid topic pattern"));
    }

    #[test]
    fn test_empty_pattern_counts_as_absent() {
        let predicates = FilterPredicates::compile(Some(""), None, None, None, false).unwrap();
        assert!(predicates.is_unrestricted());
    }

    #[test]
    fn test_selection_from_ids_deduplicates() {
        let selection = Selection::from_ids(["b", "a", "b"]);
        assert_eq!(selection.ids(), ["b", "a"]);
        assert_eq!(selection.len(), 2);
    }
}
