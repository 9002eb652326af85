//! ctanmirror Core Library
//!
//! This library keeps a local mirror of the CTAN package catalog and renders
//! selected packages as LaTeX, BibLaTeX, RIS, plain text or TSV, together
//! with author, package, topic and file-template index lists.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf first:
//! - [`record`] - Normalized package records parsed from metadata XML
//! - [`catalog`] - Persisted catalog store and remote index parser
//! - [`filter`] - Pattern predicates producing a selection
//! - [`download`] - HTTP retrieval with retries and a per-artifact state machine
//! - [`render`] - Format-specific renderers and the render engine
//! - [`config`] - Run configuration and the TOML config file
//! - [`pipeline`] - Orchestration of one complete run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod download;
pub mod filter;
pub mod fsutil;
pub mod pipeline;
pub mod record;
pub mod render;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use catalog::{CatalogError, CatalogStore, RemoteIndex};
pub use config::{ConfigError, FileConfig, RunConfig};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, FailureType, Fetcher, HttpClient, RetrievalEngine,
    RetrievalOptions, RetryPolicy,
};
pub use filter::{FilterPredicates, Selection, select};
pub use pipeline::{Orchestrator, PipelineError, RunReport, RunStats};
pub use record::{ParseError, RawMetadata, Record};
pub use render::{Format, RenderContext, RenderEngine, RenderResult, RenderTarget};
