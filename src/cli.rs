//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use ctanmirror_core::{ConfigError, FileConfig, Format, RunConfig};

/// Mirror the CTAN package catalog and render it.
///
/// ctanmirror keeps a local copy of the CTAN catalog, fetches metadata (and
/// optionally documentation) for the packages matching the given patterns,
/// and writes them as LaTeX, BibLaTeX, RIS, plain text or TSV.
#[derive(Parser, Debug)]
#[command(name = "ctanmirror")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory holding the catalog, metadata and documentation
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Output format: latex, biblatex, ris, plain or tsv
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<Format>,

    /// Base name of the rendered files
    #[arg(short, long, value_name = "NAME")]
    pub output: Option<String>,

    /// Directory for the rendered files (defaults to the work directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Select packages whose id or name matches this pattern
    #[arg(short, long, value_name = "REGEX")]
    pub name: Option<String>,

    /// Select packages with a topic matching this pattern
    #[arg(short, long, value_name = "REGEX")]
    pub topic: Option<String>,

    /// Select packages with an author matching this pattern
    #[arg(short, long, value_name = "REGEX")]
    pub author: Option<String>,

    /// Select packages whose license matches this pattern
    #[arg(short = 'L', long, value_name = "REGEX")]
    pub license: Option<String>,

    /// Only list file names matching this pattern in the file-template index
    #[arg(long, value_name = "REGEX")]
    pub file_pattern: Option<String>,

    /// Match patterns case-insensitively
    #[arg(short, long)]
    pub ignore_case: bool,

    /// Also download documentation PDFs
    #[arg(short = 'f', long = "docs")]
    pub docs: bool,

    /// Download artifacts again even if present
    #[arg(long)]
    pub force: bool,

    /// Stop after this many successful downloads
    #[arg(long, value_name = "N")]
    pub max_downloads: Option<usize>,

    /// Rebuild the catalog from the remote index
    #[arg(short, long)]
    pub regenerate: bool,

    /// Compare the catalog with the cached metadata files
    #[arg(short, long)]
    pub check: bool,

    /// Never access the network
    #[arg(long)]
    pub offline: bool,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,

    /// Catalog base URL
    #[arg(long, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Mirror base URL for documentation
    #[arg(long, value_name = "URL")]
    pub mirror_url: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/ctanmirror/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Resolves the run configuration: CLI values over file values over defaults.
    pub fn into_run_config(self, file: Option<&FileConfig>) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::default();
        if let Some(file) = file {
            file.apply_to(&mut config)?;
        }

        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(output) = self.output {
            config.output_base = output;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = Some(output_dir);
        }
        if let Some(pattern) = self.file_pattern {
            config.file_pattern = Some(pattern);
        }
        if let Some(max_downloads) = self.max_downloads {
            config.max_downloads = Some(max_downloads);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(url) = self.catalog_url {
            config.catalog_base = url;
        }
        if let Some(url) = self.mirror_url {
            config.mirror_base = url;
        }

        config.name_pattern = self.name;
        config.topic_pattern = self.topic;
        config.author_pattern = self.author;
        config.license_pattern = self.license;
        config.ignore_case |= self.ignore_case;
        config.download_docs |= self.docs;
        config.force_download = self.force;
        config.regenerate = self.regenerate;
        config.check = self.check;
        config.offline = self.offline;
        Ok(config)
    }

    /// Default log filter from `-q` / `-v`.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["ctanmirror"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.format.is_none());
        assert!(args.max_retries.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["ctanmirror", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.default_log_level(), "trace");

        let args = Args::try_parse_from(["ctanmirror", "-q"]).unwrap();
        assert_eq!(args.default_log_level(), "error");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["ctanmirror", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["ctanmirror", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    // ==================== Format Tests ====================

    #[test]
    fn test_cli_format_parsed() {
        let args = Args::try_parse_from(["ctanmirror", "--format", "bib"]).unwrap();
        assert_eq!(args.format, Some(Format::Biblatex));
    }

    #[test]
    fn test_cli_unknown_format_rejected() {
        let err = Args::try_parse_from(["ctanmirror", "--format", "docx"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Max Retries Tests ====================

    #[test]
    fn test_cli_max_retries_zero_allowed() {
        let args = Args::try_parse_from(["ctanmirror", "--max-retries", "0"]).unwrap();
        assert_eq!(args.max_retries, Some(0));
    }

    #[test]
    fn test_cli_max_retries_over_max_rejected() {
        let err = Args::try_parse_from(["ctanmirror", "--max-retries", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Resolution Tests ====================

    #[test]
    fn test_cli_short_flags() {
        let args = Args::try_parse_from([
            "ctanmirror", "-a", "Knuth", "-t", "font", "-n", "pgf", "-L", "lppl", "-f", "-r",
            "-c", "-i",
        ])
        .unwrap();
        let config = args.into_run_config(None).unwrap();
        assert_eq!(config.author_pattern.as_deref(), Some("Knuth"));
        assert_eq!(config.topic_pattern.as_deref(), Some("font"));
        assert_eq!(config.name_pattern.as_deref(), Some("pgf"));
        assert_eq!(config.license_pattern.as_deref(), Some("lppl"));
        assert!(config.download_docs);
        assert!(config.regenerate);
        assert!(config.check);
        assert!(config.ignore_case);
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let file = FileConfig {
            format: Some("tsv".to_string()),
            max_retries: Some(7),
            output_base: Some("from-file".to_string()),
            ..FileConfig::default()
        };
        let args =
            Args::try_parse_from(["ctanmirror", "--format", "ris", "--output", "cli"]).unwrap();
        let config = args.into_run_config(Some(&file)).unwrap();
        assert_eq!(config.format, Format::Ris);
        assert_eq!(config.output_base, "cli");
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_cli_defaults_without_file() {
        let args = Args::try_parse_from(["ctanmirror"]).unwrap();
        assert_eq!(args.into_run_config(None).unwrap(), RunConfig::default());
    }
}
