//! Download and unpack Ruby source trees.
//!
//! Everything lives under one temp root, keyed by version:
//!
//! - `ruby-<M_m_p>.tar.gz`: the release archive from GitHub
//! - `ruby-<M_m_p>/`: the extracted tree
//!
//! Both steps are idempotent and publish their result with a rename, so an
//! interrupted run never leaves something that looks complete.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FetchError, Result};
use crate::version::Version;

/// Blocking HTTP GET returning the final response body.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Unpacks an archive into `dest`, which exists and is empty.
pub trait Unpacker: Send + Sync {
    fn unpack(&self, archive: &Path, dest: &Path) -> std::result::Result<(), FetchError>;
}

/// An extracted, immutable copy of one version's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    path: PathBuf,
}

impl SourceTree {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where a version's artifacts live.
#[derive(Debug, Clone)]
pub struct RubySource {
    version: Version,
    tmp_dir: PathBuf,
}

impl RubySource {
    pub fn new(version: Version, tmp_dir: PathBuf) -> Self {
        Self { version, tmp_dir }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    fn dir_name(&self) -> String {
        format!("ruby-{}", self.version.underscored())
    }

    pub fn url(&self) -> String {
        format!(
            "https://github.com/ruby/ruby/archive/v{}.tar.gz",
            self.version.underscored()
        )
    }

    pub fn tar_path(&self) -> PathBuf {
        self.tmp_dir.join(format!("{}.tar.gz", self.dir_name()))
    }

    pub fn src_path(&self) -> PathBuf {
        self.tmp_dir.join(self.dir_name())
    }

    fn staging_path(&self) -> PathBuf {
        self.tmp_dir.join(format!(".{}.extracting", self.dir_name()))
    }
}

pub struct SourceFetcher {
    tmp_dir: PathBuf,
    make_missing: bool,
    transport: Box<dyn Transport>,
    unpacker: Box<dyn Unpacker>,
}

impl SourceFetcher {
    pub fn new(
        tmp_dir: PathBuf,
        make_missing: bool,
        transport: Box<dyn Transport>,
        unpacker: Box<dyn Unpacker>,
    ) -> Self {
        Self {
            tmp_dir,
            make_missing,
            transport,
            unpacker,
        }
    }

    pub fn source(&self, version: &Version) -> RubySource {
        RubySource::new(version.clone(), self.tmp_dir.clone())
    }

    pub fn ensure(&self, version: &Version) -> Result<SourceTree> {
        let source = self.source(version);
        let src_path = source.src_path();
        if src_path.is_dir() {
            tracing::debug!("Ruby {version} source present at {}", src_path.display());
            return Ok(SourceTree::new(src_path));
        }

        if !self.make_missing {
            return Err(ConfigError::SourceMissing {
                version: version.to_string(),
                path: src_path,
            }
            .into());
        }

        std::fs::create_dir_all(&self.tmp_dir).map_err(|source| FetchError::Write {
            path: self.tmp_dir.clone(),
            source,
        })?;

        if !source.tar_path().is_file() {
            self.download(&source)?;
        }
        self.extract(&source)?;

        Ok(SourceTree::new(src_path))
    }

    fn download(&self, source: &RubySource) -> std::result::Result<(), FetchError> {
        let url = source.url();
        let tar_path = source.tar_path();
        tracing::info!("Downloading Ruby {} source from {url}", source.version());

        let body = self.transport.get(&url)?;

        let part = crate::index::partial_path(&tar_path);
        let wrap = |source| FetchError::Write {
            path: tar_path.clone(),
            source,
        };
        std::fs::write(&part, &body).map_err(wrap)?;
        std::fs::rename(&part, &tar_path).map_err(wrap)?;
        tracing::info!("Saved {} ({} bytes)", tar_path.display(), body.len());
        Ok(())
    }

    fn extract(&self, source: &RubySource) -> std::result::Result<(), FetchError> {
        let tar_path = source.tar_path();
        let staging = source.staging_path();
        let src_path = source.src_path();
        tracing::info!("Extracting {}", tar_path.display());

        let wrap = |source| FetchError::Write {
            path: staging.clone(),
            source,
        };
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(wrap)?;
        }
        std::fs::create_dir_all(&staging).map_err(wrap)?;

        self.unpacker.unpack(&tar_path, &staging)?;

        let root = archive_root(&staging, &source.dir_name()).ok_or_else(|| {
            FetchError::Extract {
                archive: tar_path.clone(),
                reason: format!("expected a single top-level {} directory", source.dir_name()),
            }
        })?;
        std::fs::rename(&root, &src_path).map_err(|source| FetchError::Write {
            path: src_path.clone(),
            source,
        })?;
        let _ = std::fs::remove_dir_all(&staging);
        Ok(())
    }
}

/// The directory inside `staging` that holds the tree: the expected name if
/// present, otherwise the only top-level directory.
fn archive_root(staging: &Path, expected: &str) -> Option<PathBuf> {
    let named = staging.join(expected);
    if named.is_dir() {
        return Some(named);
    }
    let dirs: Vec<PathBuf> = std::fs::read_dir(staging)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    match dirs.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    }
}
