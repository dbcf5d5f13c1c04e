//! One Ruby version's object map: build it, load it, resolve names in it.
//!
//! Lookups fall back in a fixed order when a name is not indexed verbatim:
//!
//! 1. direct lookup of the normalized name
//! 2. the name with its leading namespace de-aliased (`YAML::x` → `Psych::x`)
//! 3. the table of rewritten index keys
//! 4. the query rewritten by the first matching rule, looked up directly
//!
//! Anything else resolves to a [`Resolution`] without a path.

use rayon::prelude::*;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ConfigError, Result};
use crate::index::{self, IndexBuilder, MapData};
use crate::rules::{NameRules, normalize_name};
use crate::source::SourceFetcher;
use crate::url::{self, UrlOptions};
use crate::version::Version;

const FILE_PREFIX: &str = "ruby-";
const FILE_SUFFIX: &str = ".json.gz";

pub fn file_name(version: &Version) -> String {
    format!("{FILE_PREFIX}{version}{FILE_SUFFIX}")
}

/// The outcome of resolving a name. `path` is `None` both for unknown
/// names and for known objects without a page of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub path: Option<String>,
}

impl Resolution {
    fn new(name: String, path: Option<String>) -> Self {
        Self { name, path }
    }

    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }
}

/// Fetches sources and runs the extraction pass for [`ObjectMap::make`].
pub struct MapBuilder {
    fetcher: SourceFetcher,
    indexer: IndexBuilder,
}

impl MapBuilder {
    pub fn new(fetcher: SourceFetcher, indexer: IndexBuilder) -> Self {
        Self { fetcher, indexer }
    }

    pub fn build(&self, version: &Version, dest: &Path) -> Result<usize> {
        let tree = self.fetcher.ensure(version)?;
        tracing::info!("Building object map for Ruby {version}");
        let count = self.indexer.build(&tree, dest)?;
        Ok(count)
    }
}

pub struct ObjectMap {
    version: Version,
    path: PathBuf,
    rules: Arc<NameRules>,
    data: Mutex<Option<Arc<MapData>>>,
    rewritten: Mutex<Option<Arc<MapData>>>,
}

impl ObjectMap {
    pub fn new(version: Version, data_dir: &Path, rules: Arc<NameRules>) -> Self {
        let path = data_dir.join(file_name(&version));
        Self {
            version,
            path,
            rules,
            data: Mutex::new(None),
            rewritten: Mutex::new(None),
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted file is the only record of a version being built.
    pub fn is_present(&self) -> bool {
        self.path.is_file()
    }

    /// Builds the persisted map if it is missing, or always when `force`.
    pub fn make(&self, builder: &MapBuilder, force: bool) -> Result<&Self> {
        if self.is_present() && !force {
            tracing::debug!("Object map for Ruby {} already present", self.version);
            return Ok(self);
        }

        let count = builder.build(&self.version, &self.path)?;
        tracing::info!(
            "Wrote {} names for Ruby {} to {}",
            count,
            self.version,
            self.path.display()
        );
        self.clear();
        Ok(self)
    }

    /// The loaded map, read from disk on first use or when `reload` is set.
    pub fn data(&self, reload: bool) -> Result<Arc<MapData>> {
        let mut cached = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        if !reload && let Some(data) = cached.as_ref() {
            return Ok(Arc::clone(data));
        }

        let loaded = Arc::new(index::read_map(&self.path)?);
        tracing::debug!(
            "Loaded {} names for Ruby {} from {}",
            loaded.len(),
            self.version,
            self.path.display()
        );
        *cached = Some(Arc::clone(&loaded));
        drop(cached);

        if reload {
            *self
                .rewritten
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
        }
        Ok(loaded)
    }

    fn clear(&self) {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .rewritten
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Every key passed through the rewrite rules, mapped to the original
    /// key's path. Computed once per loaded map.
    fn rewritten(&self) -> Result<Arc<MapData>> {
        let mut cached = self
            .rewritten
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cached.as_ref() {
            return Ok(Arc::clone(table));
        }

        let data = self.data(false)?;
        let mut pairs: Vec<(String, &String, &Option<String>)> = data
            .par_iter()
            .filter_map(|(key, path)| self.rules.rewrite(key).map(|new| (new, key, path)))
            .collect();
        // Deterministic winner when two keys rewrite to the same name.
        pairs.sort_by(|a, b| a.1.cmp(b.1));

        let mut table = MapData::with_capacity(pairs.len());
        for (new, _, path) in pairs {
            table.entry(new).or_insert_with(|| path.clone());
        }
        let table = Arc::new(table);
        *cached = Some(Arc::clone(&table));
        Ok(table)
    }

    pub fn resolve(&self, raw: &str) -> Result<Resolution> {
        let name = normalize_name(raw);
        let data = self.data(false)?;

        if let Some(path) = data.get(&name) {
            return Ok(Resolution::new(name, path.clone()));
        }

        if let Some(real) = self.rules.dealias(&name)
            && let Some(path) = data.get(&real)
        {
            tracing::debug!("Resolved {name} via alias as {real}");
            return Ok(Resolution::new(real, path.clone()));
        }

        if !self.rules.has_rewrites() {
            return Ok(Resolution::new(name, None));
        }

        if let Some(path) = self.rewritten()?.get(&name) {
            tracing::debug!("Resolved {name} via rewritten index keys");
            return Ok(Resolution::new(name, path.clone()));
        }

        if let Some(rewritten) = self.rules.rewrite(&name)
            && let Some(path) = data.get(&rewritten)
        {
            tracing::debug!("Resolved {name} via rewrite to {rewritten}");
            return Ok(Resolution::new(name, path.clone()));
        }

        tracing::debug!("{name} not found in Ruby {} map", self.version);
        Ok(Resolution::new(name, None))
    }

    pub fn url_for(&self, name: &str, options: &UrlOptions) -> Result<Option<String>> {
        let resolution = self.resolve(name)?;
        Ok(resolution
            .path
            .map(|path| url::build(&path, &self.version, options)))
    }

    /// All indexed names, sorted case-insensitively.
    pub fn names(&self) -> Result<Vec<String>> {
        let data = self.data(false)?;
        let mut names: Vec<String> = data.keys().cloned().collect();
        sort_names(&mut names);
        Ok(names)
    }

    /// Names matching every term, as substrings or, with `regexp`, as
    /// patterns. No terms matches everything.
    pub fn grep(&self, terms: &[String], regexp: bool) -> Result<Vec<String>> {
        if terms.is_empty() {
            return self.names();
        }

        let patterns = if regexp {
            terms
                .iter()
                .map(|t| term_pattern(t))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let data = self.data(false)?;
        let mut names: Vec<String> = data
            .par_iter()
            .map(|(name, _)| name)
            .filter(|name| {
                if regexp {
                    patterns.iter().all(|re| re.is_match(name))
                } else {
                    terms.iter().all(|t| name.contains(t.as_str()))
                }
            })
            .cloned()
            .collect();
        sort_names(&mut names);
        Ok(names)
    }
}

/// A term that does not compile as a pattern matches as a literal name.
fn term_pattern(term: &str) -> Result<Regex> {
    match Regex::new(term) {
        Ok(re) => Ok(re),
        Err(err) => {
            tracing::debug!("Searching for {term:?} literally: {err}");
            let literal = regex::escape(&normalize_name(term));
            Regex::new(&literal).map_err(|source| {
                ConfigError::InvalidPattern {
                    pattern: term.to_string(),
                    source,
                }
                .into()
            })
        }
    }
}

fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

impl std::fmt::Debug for ObjectMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectMap")
            .field("version", &self.version)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ObjectMap {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for ObjectMap {}

impl PartialOrd for ObjectMap {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectMap {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

/// Maps with a persisted file in `data_dir`, ascending by version.
pub fn list(data_dir: &Path, rules: &Arc<NameRules>) -> Result<Vec<ObjectMap>> {
    let mut maps = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(raw) = name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        else {
            continue;
        };
        match raw.parse::<Version>() {
            Ok(version) => maps.push(ObjectMap::new(version, data_dir, Arc::clone(rules))),
            Err(_) => tracing::debug!("Ignoring {name} in {}", data_dir.display()),
        }
    }
    maps.sort();
    Ok(maps)
}
