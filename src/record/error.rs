//! Error types for package metadata parsing.

use thiserror::Error;

/// Errors that can occur while turning a metadata payload into a [`Record`](super::Record).
///
/// A parse error is always local to one package; callers count it and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A mandatory field (`id`, `title`) is absent or empty.
    #[error("missing mandatory field '{field}' in metadata from {source_url}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// Locator of the payload that was parsed.
        source_url: String,
    },

    /// The metadata-XML locator is missing or not an absolute http(s) URL.
    #[error("invalid metadata locator '{locator}': {reason}")]
    InvalidLocator {
        /// The offending locator.
        locator: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The payload is not well-formed XML.
    #[error("malformed metadata from {source_url}: {reason}")]
    Malformed {
        /// Locator of the payload that was parsed.
        source_url: String,
        /// Underlying parser message.
        reason: String,
    },
}

impl ParseError {
    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(field: &'static str, source_url: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            source_url: source_url.into(),
        }
    }

    /// Creates an invalid-locator error.
    #[must_use]
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-payload error.
    #[must_use]
    pub fn malformed(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }
}
