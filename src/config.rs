use anyhow::{Context, Result};
use clap::ValueEnum;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::{Cli, Commands, UrlArgs, VersionArgs};
use crate::error::ConfigError;
use crate::selector::FallbackMode;
use crate::url::{DEFAULT_DOMAIN, DEFAULT_LANGUAGE, UrlOptions};
use crate::version::Version;

pub const DATA_DIR_ENV: &str = "LINK_STDLIB_DATA_DIR";
pub const TMP_DIR_ENV: &str = "LINK_STDLIB_TMP_DIR";
pub const FALLBACK_ENV: &str = "LINK_STDLIB_FALLBACK";
pub const RUBY_ENV: &str = "LINK_STDLIB_RUBY";
pub const RUBY_VERSION_ENV: &str = "LINK_STDLIB_RUBY_VERSION";

/// Where source archives and extracted trees go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TmpDirMode {
    /// The operating system's temp directory
    System,
    /// The per-user cache directory
    #[default]
    User,
    /// Next to the installed executable
    Install,
    /// Inside the project directory
    Project,
}

impl FromStr for TmpDirMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "install" => Ok(Self::Install),
            "project" => Ok(Self::Project),
            _ => Err(ConfigError::InvalidTmpDirMode(s.to_string())),
        }
    }
}

/// Everything a [`LinkContext`](crate::context::LinkContext) needs, with
/// flags, environment and defaults already applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub project_dir: PathBuf,
    pub ruby_bin: PathBuf,
    pub fallback: FallbackMode,
    pub ruby_version: Option<Version>,
    pub make_missing: bool,
    pub url_options: UrlOptions,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_dir = resolve_project_dir(cli)?;
        let (version_args, url_args, make_missing) = match &cli.command {
            Commands::Url { version, url, .. } | Commands::Search { version, url, .. } => {
                (Some(version), Some(url), version.make_missing)
            }
            Commands::Add { .. } => (None, None, true),
            Commands::List => (None, None, false),
        };

        Ok(Self {
            data_dir: resolve_data_dir(cli)?,
            tmp_dir: resolve_tmp_dir(cli, &project_dir)?,
            ruby_bin: resolve_ruby_bin(cli)?,
            fallback: resolve_fallback(cli)?,
            ruby_version: resolve_ruby_version(version_args)?,
            make_missing,
            url_options: url_args.map(url_options).unwrap_or_default(),
            project_dir,
        })
    }
}

pub fn resolve_project_dir(cli: &Cli) -> Result<PathBuf> {
    match cli.project.clone() {
        Some(p) => absolute(&p),
        None => env::current_dir().context("Failed to read the current directory"),
    }
}

/// A custom data directory must already exist; the default one is created.
pub fn resolve_data_dir(cli: &Cli) -> Result<PathBuf> {
    let custom = cli
        .data_dir
        .clone()
        .or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from));
    if let Some(p) = custom {
        if !p.is_dir() {
            return Err(ConfigError::InvalidDataDir(p).into());
        }
        return absolute(&p);
    }

    let default_path = link_stdlib_home()?.join("maps");
    std::fs::create_dir_all(&default_path)
        .with_context(|| format!("Failed to create directory: {}", default_path.display()))?;
    Ok(default_path)
}

pub fn resolve_tmp_dir(cli: &Cli, project_dir: &Path) -> Result<PathBuf> {
    let mode = match cli.tmp_dir {
        Some(mode) => mode,
        None => match env::var(TMP_DIR_ENV) {
            Ok(raw) => raw.parse::<TmpDirMode>()?,
            Err(_) => TmpDirMode::default(),
        },
    };
    tmp_dir_for(mode, project_dir)
}

pub fn tmp_dir_for(mode: TmpDirMode, project_dir: &Path) -> Result<PathBuf> {
    let dir = match mode {
        TmpDirMode::System => env::temp_dir().join("link-stdlib"),
        TmpDirMode::User => dirs::cache_dir()
            .ok_or(ConfigError::NoDirectory("cache"))?
            .join("link-stdlib"),
        TmpDirMode::Install => {
            let exe = env::current_exe().context("Failed to locate the running executable")?;
            exe.parent()
                .ok_or(ConfigError::NoDirectory("install"))?
                .join("tmp")
        }
        TmpDirMode::Project => project_dir.join("tmp").join("link-stdlib"),
    };
    absolute(&dir)
}

/// Paths containing a separator are made absolute, since extraction runs
/// with the source tree as its working directory. Bare names go through
/// `PATH`.
pub fn resolve_ruby_bin(cli: &Cli) -> Result<PathBuf> {
    let bin = cli
        .ruby
        .clone()
        .or_else(|| env::var_os(RUBY_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("ruby"));
    if bin.components().count() > 1 {
        return absolute(&bin);
    }
    Ok(bin)
}

pub fn resolve_fallback(cli: &Cli) -> Result<FallbackMode> {
    if let Some(mode) = cli.fallback {
        return Ok(mode);
    }
    match env::var(FALLBACK_ENV) {
        Ok(raw) => Ok(raw.parse::<FallbackMode>()?),
        Err(_) => Ok(FallbackMode::default()),
    }
}

fn resolve_ruby_version(args: Option<&VersionArgs>) -> Result<Option<Version>> {
    if let Some(v) = args.and_then(|a| a.ruby_version.clone()) {
        return Ok(Some(v));
    }
    match env::var(RUBY_VERSION_ENV) {
        Ok(raw) if !raw.trim().is_empty() => Ok(Some(raw.parse::<Version>()?)),
        _ => Ok(None),
    }
}

fn url_options(args: &UrlArgs) -> UrlOptions {
    UrlOptions {
        use_https: !args.http,
        domain: args
            .domain
            .clone()
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
        language: args
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    }
}

fn link_stdlib_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoDirectory("data"))?;
    Ok(base.join("link-stdlib"))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path: {}", path.display()))
}
