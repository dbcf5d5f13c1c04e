//! Error types for map building and name resolution.
//!
//! A name that cannot be resolved is not an error: it is reported as a
//! [`Resolution`](crate::object_map::Resolution) with no path.

use std::path::PathBuf;

/// Invalid or insufficient configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The source tree is absent and fetching has been disabled.
    #[error(
        "Ruby {version} source is not present at {} and fetching is disabled \
         (pass --make-missing or run `link-stdlib add {version}`)",
        .path.display()
    )]
    SourceMissing { version: String, path: PathBuf },

    #[error(
        "fallback mode must be one of minimum-supported, latest-stable or current-runtime; found {0:?}"
    )]
    InvalidFallbackMode(String),

    #[error("temp dir mode must be one of system, user, install or project; found {0:?}")]
    InvalidTmpDirMode(String),

    /// A custom data directory must already exist.
    #[error("custom data dir must be an existing directory, found {}", .0.display())]
    InvalidDataDir(PathBuf),

    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),

    #[error("invalid search pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to resolve {0} directory")]
    NoDirectory(&'static str),
}

/// Failure while acquiring a source tree.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} exceeded {limit} redirects")]
    TooManyRedirects { url: String, limit: usize },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract {}: {reason}", .archive.display())]
    Extract { archive: PathBuf, reason: String },
}

/// Failure while running the documentation extraction pass.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to execute {program} (ensure Ruby is installed, or use --ruby): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("documentation extraction failed ({status}): {stderr}")]
    Exit { status: String, stderr: String },

    #[error("failed to read extractor output {}: {source}", .path.display())]
    ReadTree {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor output {} is not a valid object tree: {source}", .path.display())]
    DecodeTree {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write object map {}: {source}", .path.display())]
    WriteMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to read object map {}: {source}", .path.display())]
    ReadMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("object map {} is corrupt: {source}", .path.display())]
    DecodeMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
