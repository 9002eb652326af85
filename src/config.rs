//! Run configuration: defaults, the optional TOML file and validation.
//!
//! A [`RunConfig`] is the fully resolved input of one run. The binary builds
//! it from [`RunConfig::default`], applies a [`FileConfig`] on top and
//! finally its own command-line values, so the precedence is
//! CLI > file > defaults. [`RunConfig::validate`] runs before any I/O.
//!
//! Config file lookup order:
//! 1. `--config PATH`
//! 2. `$XDG_CONFIG_HOME/ctanmirror/config.toml`
//! 3. `$HOME/.config/ctanmirror/config.toml`
//!
//! ```toml
//! work_dir = "/var/cache/ctan"
//! format = "biblatex"
//! download_docs = true
//! max_retries = 5
//! mirror_url = "https://ctan.math.example.edu/tex-archive"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::CATALOG_FILE_NAME;
use crate::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CATALOG_BASE, DEFAULT_MAX_RETRIES, DEFAULT_MIRROR_BASE,
    READ_TIMEOUT_SECS, RetrievalOptions, RetryPolicy,
};
use crate::filter::{FilterPredicates, PatternError};
use crate::render::{Format, RenderContext, RenderTarget, UnknownFormat};

/// Default base name of rendered files.
pub const DEFAULT_OUTPUT_BASE: &str = "catalog";

/// Default working directory holding the store and downloaded artifacts.
pub const DEFAULT_WORK_DIR: &str = "ctan-mirror";

const MAX_RETRIES_LIMIT: u32 = 10;
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Errors raised while resolving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two options that cannot be combined.
    #[error("conflicting options: --{first} cannot be combined with --{second}")]
    Conflict {
        /// First option.
        first: &'static str,
        /// Second option.
        second: &'static str,
    },

    /// A filter pattern that does not compile.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    /// A numeric value outside its accepted range.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Option name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Accepted range, human readable.
        expected: &'static str,
    },

    /// A base URL that is not absolute http(s).
    #[error("invalid value for `{field}`: '{url}' is not an absolute http(s) URL")]
    InvalidUrl {
        /// Option name.
        field: &'static str,
        /// Rejected URL.
        url: String,
    },

    /// An output base name containing a path separator or nothing at all.
    #[error("invalid output base name '{0}'")]
    InvalidOutputBase(String),

    /// Unknown output format name.
    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),

    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser diagnostics.
        #[source]
        source: toml::de::Error,
    },
}

/// Fully resolved configuration of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Directory holding `catalog.json`, `xml/` and `pdf/`.
    pub work_dir: PathBuf,
    /// Directory for rendered files; the working directory when `None`.
    pub output_dir: Option<PathBuf>,
    /// Base name of rendered files.
    pub output_base: String,
    /// Output format.
    pub format: Format,
    /// Pattern on package id or name.
    pub name_pattern: Option<String>,
    /// Pattern on topics.
    pub topic_pattern: Option<String>,
    /// Pattern on authors.
    pub author_pattern: Option<String>,
    /// Pattern on the license.
    pub license_pattern: Option<String>,
    /// Restricts the file-template index list.
    pub file_pattern: Option<String>,
    /// Case-insensitive pattern matching.
    pub ignore_case: bool,
    /// Also fetch documentation PDFs.
    pub download_docs: bool,
    /// Re-fetch artifacts already present.
    pub force_download: bool,
    /// Cap on successful network fetches.
    pub max_downloads: Option<usize>,
    /// Rebuild the store from the remote index.
    pub regenerate: bool,
    /// Check the store against the files on disk.
    pub check: bool,
    /// Never touch the network.
    pub offline: bool,
    /// Retries after the first attempt of each fetch.
    pub max_retries: u32,
    /// HTTP connect timeout.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout.
    pub read_timeout_secs: u64,
    /// Catalog base URL.
    pub catalog_base: String,
    /// Mirror base URL for documentation.
    pub mirror_base: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            output_dir: None,
            output_base: DEFAULT_OUTPUT_BASE.to_string(),
            format: Format::Latex,
            name_pattern: None,
            topic_pattern: None,
            author_pattern: None,
            license_pattern: None,
            file_pattern: None,
            ignore_case: false,
            download_docs: false,
            force_download: false,
            max_downloads: None,
            regenerate: false,
            check: false,
            offline: false,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            catalog_base: DEFAULT_CATALOG_BASE.to_string(),
            mirror_base: DEFAULT_MIRROR_BASE.to_string(),
        }
    }
}

impl RunConfig {
    /// Creates a default configuration rooted at `work_dir`.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// Rejects conflicting options, bad ranges and invalid patterns.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offline {
            for (set, name) in [
                (self.regenerate, "regenerate"),
                (self.force_download, "force"),
                (self.download_docs, "docs"),
            ] {
                if set {
                    return Err(ConfigError::Conflict {
                        first: "offline",
                        second: name,
                    });
                }
            }
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                value: u64::from(self.max_retries),
                expected: "0..=10",
            });
        }
        validate_timeout("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout("read_timeout_secs", self.read_timeout_secs)?;
        validate_base_url("catalog_url", &self.catalog_base)?;
        validate_base_url("mirror_url", &self.mirror_base)?;

        if self.output_base.trim().is_empty()
            || self.output_base.contains(['/', '\\'])
            || self.output_base == ".."
        {
            return Err(ConfigError::InvalidOutputBase(self.output_base.clone()));
        }

        self.predicates()?;
        self.file_regex()?;
        Ok(())
    }

    /// Compiles the filter patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for a pattern that does not compile.
    pub fn predicates(&self) -> Result<FilterPredicates, ConfigError> {
        Ok(FilterPredicates::compile(
            self.name_pattern.as_deref(),
            self.topic_pattern.as_deref(),
            self.author_pattern.as_deref(),
            self.license_pattern.as_deref(),
            self.ignore_case,
        )?)
    }

    /// Compiles the file-template pattern, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile.
    pub fn file_regex(&self) -> Result<Option<Regex>, ConfigError> {
        let Some(pattern) = self.file_pattern.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        RegexBuilder::new(pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map(Some)
            .map_err(|source| {
                ConfigError::InvalidPattern(PatternError {
                    field: "file",
                    pattern: pattern.to_string(),
                    source,
                })
            })
    }

    /// Path of the persisted store.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.work_dir.join(CATALOG_FILE_NAME)
    }

    /// Retrieval settings derived from this configuration.
    #[must_use]
    pub fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            download_docs: self.download_docs,
            force_download: self.force_download,
            max_downloads: self.max_downloads,
            catalog_base: self.catalog_base.clone(),
            mirror_base: self.mirror_base.clone(),
            ..RetrievalOptions::new(&self.work_dir)
        }
    }

    /// Retry policy derived from `max_retries`.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Where rendered files are written.
    #[must_use]
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget::new(
            self.output_dir.clone().unwrap_or_else(|| self.work_dir.clone()),
            self.output_base.clone(),
        )
    }

    /// Rendering context derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the file pattern does not compile.
    pub fn render_context(&self) -> Result<RenderContext, ConfigError> {
        Ok(RenderContext {
            base_name: self.output_base.clone(),
            mirror_base: self.mirror_base.clone(),
            file_pattern: self.file_regex()?,
        })
    }
}

fn validate_timeout(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if TIMEOUT_RANGE_SECS.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "1..=3600",
        })
    }
}

fn validate_base_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            field,
            url: value.to_string(),
        }),
    }
}

/// TOML-backed defaults. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default working directory.
    pub work_dir: Option<PathBuf>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default base name of rendered files.
    pub output_base: Option<String>,
    /// Default output format name.
    pub format: Option<String>,
    /// Default case-insensitivity of patterns.
    pub ignore_case: Option<bool>,
    /// Default file-template pattern.
    pub file_pattern: Option<String>,
    /// Fetch documentation PDFs by default.
    pub download_docs: Option<bool>,
    /// Default cap on network fetches.
    pub max_downloads: Option<usize>,
    /// Default retry budget.
    pub max_retries: Option<u32>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Catalog base URL.
    pub catalog_url: Option<String>,
    /// Mirror base URL.
    pub mirror_url: Option<String>,
}

impl FileConfig {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw, path)?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Loads the file at the default location, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing file cannot be read or parsed.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.is_file() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    /// Applies every key present in the file to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] for an unrecognized format name.
    pub fn apply_to(&self, config: &mut RunConfig) -> Result<(), ConfigError> {
        if let Some(work_dir) = &self.work_dir {
            config.work_dir.clone_from(work_dir);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = Some(output_dir.clone());
        }
        if let Some(output_base) = &self.output_base {
            config.output_base.clone_from(output_base);
        }
        if let Some(format) = &self.format {
            config.format = format.parse()?;
        }
        if let Some(ignore_case) = self.ignore_case {
            config.ignore_case = ignore_case;
        }
        if let Some(file_pattern) = &self.file_pattern {
            config.file_pattern = Some(file_pattern.clone());
        }
        if let Some(download_docs) = self.download_docs {
            config.download_docs = download_docs;
        }
        if let Some(max_downloads) = self.max_downloads {
            config.max_downloads = Some(max_downloads);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout_secs = secs;
        }
        if let Some(url) = &self.catalog_url {
            config.catalog_base.clone_from(url);
        }
        if let Some(url) = &self.mirror_url {
            config.mirror_base.clone_from(url);
        }
        Ok(())
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/ctanmirror/config.toml`
/// 2. `$HOME/.config/ctanmirror/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("ctanmirror")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("ctanmirror")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Validation Tests ====================

    #[test]
    fn test_default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_offline_conflicts() {
        for second in ["regenerate", "force", "docs"] {
            let mut config = RunConfig {
                offline: true,
                ..RunConfig::default()
            };
            match second {
                "regenerate" => config.regenerate = true,
                "force" => config.force_download = true,
                _ => config.download_docs = true,
            }
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::Conflict { first: "offline", second: s } if s == second),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn test_offline_alone_is_valid() {
        let config = RunConfig {
            offline: true,
            check: true,
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = RunConfig {
            author_pattern: Some("Knuth(".to_string()),
            ..RunConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid author pattern"));
    }

    #[test]
    fn test_invalid_file_pattern_rejected() {
        let config = RunConfig {
            file_pattern: Some("[".to_string()),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern(PatternError { field: "file", .. }))
        ));
    }

    #[test]
    fn test_ranges_enforced() {
        let config = RunConfig {
            max_retries: 11,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "max_retries", .. })
        ));

        let config = RunConfig {
            read_timeout_secs: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "read_timeout_secs", .. })
        ));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let config = RunConfig {
            mirror_base: "ftp://mirror.example".to_string(),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "mirror_url", .. })
        ));
    }

    #[test]
    fn test_output_base_with_separator_rejected() {
        let config = RunConfig {
            output_base: "../out".to_string(),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOutputBase(_))
        ));
    }

    // ==================== Derived Settings Tests ====================

    #[test]
    fn test_derived_paths() {
        let config = RunConfig::new("/tmp/mirror");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/mirror/catalog.json"));
        let options = config.retrieval_options();
        assert_eq!(options.xml_dir, PathBuf::from("/tmp/mirror/xml"));
        assert_eq!(options.pdf_dir, PathBuf::from("/tmp/mirror/pdf"));
        let target = config.render_target();
        assert_eq!(target.dir, PathBuf::from("/tmp/mirror"));
        assert_eq!(target.base_name, "catalog");
    }

    #[test]
    fn test_retry_policy_from_max_retries() {
        let config = RunConfig {
            max_retries: 0,
            ..RunConfig::default()
        };
        assert_eq!(config.retry_policy().max_attempts(), 1);
    }

    // ==================== File Config Tests ====================

    #[test]
    fn test_file_config_parse_and_apply() {
        let raw = r#"
            work_dir = "/srv/ctan"
            format = "ris"
            download_docs = true
            max_retries = 5
            mirror_url = "https://mirror.example/tex-archive"
        "#;
        let file = FileConfig::parse(raw, Path::new("config.toml")).unwrap();
        let mut config = RunConfig::default();
        file.apply_to(&mut config).unwrap();

        assert_eq!(config.work_dir, PathBuf::from("/srv/ctan"));
        assert_eq!(config.format, Format::Ris);
        assert!(config.download_docs);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.mirror_base, "https://mirror.example/tex-archive");
        assert_eq!(config.catalog_base, DEFAULT_CATALOG_BASE);
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let err = FileConfig::parse("concurrency = 4", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_file_config_unknown_format() {
        let file = FileConfig {
            format: Some("docx".to_string()),
            ..FileConfig::default()
        };
        let err = file.apply_to(&mut RunConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFormat(_)));
    }

    #[test]
    fn test_file_config_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = FileConfig::load(&dir.path().join("none.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
