//! Picks which Ruby version to link against.
//!
//! First match wins: an explicit override, then the minimum version the
//! project's gemspecs require, then the configured [`FallbackMode`].

use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{LazyLock, OnceLock};

use crate::error::ConfigError;
use crate::ruby::RubyRuntime;
use crate::version::{Requirement, Version};

pub const MINIMUM_SUPPORTED: &str = "2.3.0";
pub const LATEST_STABLE: &str = "2.5.1";

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("static regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FallbackMode {
    #[default]
    MinimumSupported,
    LatestStable,
    CurrentRuntime,
}

impl FromStr for FallbackMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "minimum-supported" => Ok(Self::MinimumSupported),
            "latest-stable" => Ok(Self::LatestStable),
            "current-runtime" => Ok(Self::CurrentRuntime),
            _ => Err(ConfigError::InvalidFallbackMode(s.to_string())),
        }
    }
}

/// Gemspecs are read and the interpreter is probed at most once per
/// selector; [`get`](Self::get) runs for every resolved reference.
#[derive(Debug, Clone)]
pub struct VersionSelector {
    explicit: Option<Version>,
    project_dir: PathBuf,
    fallback: FallbackMode,
    runtime: RubyRuntime,
    required: OnceLock<Option<Version>>,
    runtime_version: OnceLock<Version>,
}

impl VersionSelector {
    pub fn new(project_dir: PathBuf, fallback: FallbackMode, runtime: RubyRuntime) -> Self {
        Self {
            explicit: None,
            project_dir,
            fallback,
            runtime,
            required: OnceLock::new(),
            runtime_version: OnceLock::new(),
        }
    }

    pub fn with_explicit(mut self, version: Option<Version>) -> Self {
        self.explicit = version;
        self
    }

    pub fn set(&mut self, version: Version) {
        self.explicit = Some(version);
    }

    pub fn get(&self) -> Version {
        if let Some(v) = self.explicit.clone() {
            return v;
        }
        if let Some(v) = self.min_required() {
            tracing::debug!("Using Ruby {v} inferred from gemspec requirements");
            return v;
        }
        self.fallback()
    }

    pub fn fallback(&self) -> Version {
        match self.fallback {
            FallbackMode::MinimumSupported => minimum_supported(),
            FallbackMode::LatestStable => latest_stable(),
            FallbackMode::CurrentRuntime => self
                .runtime_version
                .get_or_init(|| match self.runtime.version() {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(
                            "Could not determine the running Ruby version ({e}), using {MINIMUM_SUPPORTED}"
                        );
                        minimum_supported()
                    }
                })
                .clone(),
        }
    }

    /// The lowest version named by a `=`, `>=` or `~>` constraint that
    /// satisfies every gemspec's `required_ruby_version`.
    pub fn min_required(&self) -> Option<Version> {
        self.required
            .get_or_init(|| min_satisfying(&gemspec_requirements(&self.project_dir)))
            .clone()
    }
}

pub fn minimum_supported() -> Version {
    Version::new(2, 3, 0)
}

pub fn latest_stable() -> Version {
    Version::new(2, 5, 1)
}

pub fn min_satisfying(reqs: &[Requirement]) -> Option<Version> {
    let mut candidates: Vec<Version> = reqs
        .iter()
        .flat_map(|r| r.constraints.iter())
        .filter(|c| c.op.is_lower_bound())
        .map(|c| c.version.clone())
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .find(|v| reqs.iter().all(|r| r.satisfied_by(v)))
}

fn gemspec_requirements(project_dir: &Path) -> Vec<Requirement> {
    let Ok(entries) = std::fs::read_dir(project_dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "gemspec"))
        .collect();
    paths.sort();

    let mut reqs = Vec::new();
    for path in paths {
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        match parse_required_ruby_version(&content) {
            Some(req) => reqs.push(req),
            None => tracing::debug!("No usable required_ruby_version in {}", path.display()),
        }
    }
    reqs
}

/// Reads the constraint strings assigned to `required_ruby_version`.
///
/// Handles the common literal forms: a single string, an array of strings,
/// and `Gem::Requirement.new(...)` with string arguments.
pub fn parse_required_ruby_version(gemspec: &str) -> Option<Requirement> {
    for line in gemspec.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some(pos) = line.find("required_ruby_version") else {
            continue;
        };
        let rhs = &line[pos + "required_ruby_version".len()..];
        let Some(rhs) = rhs.trim_start().strip_prefix('=') else {
            continue;
        };
        let parts: Vec<&str> = QUOTED
            .captures_iter(rhs)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if let Ok(req) = Requirement::parse(parts)
            && !req.is_empty()
        {
            return Some(req);
        }
    }
    None
}
