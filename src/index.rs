//! Building and persisting object maps.
//!
//! The extraction pass produces a tree of documented namespaces; we flatten
//! it into `(full name, relative doc path)` entries and store the result as
//! a gzip-compressed JSON object, one file per Ruby version.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Error, Result};
use crate::source::SourceTree;

/// Full name → relative documentation path. `None` marks an object that
/// exists but has no page of its own.
pub type MapData = HashMap<String, Option<String>>;

/// Runs the documentation extraction pass over a source tree in an isolated
/// process, writing the object tree as JSON to `out`.
pub trait TreeExtractor: Send + Sync {
    fn extract(&self, src: &Path, out: &Path) -> std::result::Result<(), BuildError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocMember {
    pub full_name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// One class or module as reported by the extraction pass.
#[derive(Debug, Clone, Deserialize)]
pub struct DocObject {
    pub full_name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub constants: Vec<DocMember>,
    #[serde(default)]
    pub class_attributes: Vec<DocMember>,
    #[serde(default)]
    pub class_methods: Vec<DocMember>,
    #[serde(default)]
    pub instance_attributes: Vec<DocMember>,
    #[serde(default)]
    pub instance_methods: Vec<DocMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIndexEntry {
    pub name: String,
    pub path: Option<String>,
}

pub fn flatten(objects: &[DocObject]) -> Vec<RawIndexEntry> {
    let mut entries = Vec::new();
    for obj in objects {
        entries.push(RawIndexEntry {
            name: obj.full_name.clone(),
            path: obj.path.clone(),
        });
        let members = obj
            .constants
            .iter()
            .chain(&obj.class_attributes)
            .chain(&obj.class_methods)
            .chain(&obj.instance_attributes)
            .chain(&obj.instance_methods);
        entries.extend(members.map(|m| RawIndexEntry {
            name: m.full_name.clone(),
            path: m.path.clone(),
        }));
    }
    entries
}

/// Collapses entries into a map. When two entries share a name the later
/// one wins, matching what the extraction tool itself does.
pub fn fold(entries: impl IntoIterator<Item = RawIndexEntry>) -> MapData {
    let mut map = MapData::new();
    for entry in entries {
        map.insert(entry.name, entry.path);
    }
    map
}

pub fn write_map(path: &Path, data: &MapData) -> std::result::Result<(), BuildError> {
    let wrap = |source| BuildError::WriteMap {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }

    let sorted: BTreeMap<&String, &Option<String>> = data.iter().collect();
    let tmp = partial_path(path);
    {
        let file = File::create(&tmp).map_err(wrap)?;
        let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer_pretty(&mut gz, &sorted)
            .map_err(|e| wrap(std::io::Error::other(e)))?;
        let mut inner = gz.finish().map_err(wrap)?;
        inner.flush().map_err(wrap)?;
    }
    std::fs::rename(&tmp, path).map_err(wrap)?;
    Ok(())
}

pub fn read_map(path: &Path) -> Result<MapData> {
    let file = File::open(path).map_err(|source| Error::ReadMap {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
    serde_json::from_reader(reader).map_err(|source| Error::DecodeMap {
        path: path.to_path_buf(),
        source,
    })
}

/// Sibling path used while a file is being written; renamed into place once
/// complete so readers never observe a partial file.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}

pub struct IndexBuilder {
    extractor: Box<dyn TreeExtractor>,
}

impl IndexBuilder {
    pub fn new(extractor: Box<dyn TreeExtractor>) -> Self {
        Self { extractor }
    }

    /// Extracts, flattens and persists the map for `tree` to `dest`.
    /// Returns the number of names written.
    pub fn build(&self, tree: &SourceTree, dest: &Path) -> std::result::Result<usize, BuildError> {
        let tree_path = partial_path(dest).with_extension("tree.json");
        if let Some(parent) = tree_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BuildError::WriteMap {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let result = self.build_from(tree, &tree_path, dest);
        let _ = std::fs::remove_file(&tree_path);
        result
    }

    fn build_from(
        &self,
        tree: &SourceTree,
        tree_path: &Path,
        dest: &Path,
    ) -> std::result::Result<usize, BuildError> {
        self.extractor.extract(tree.path(), tree_path)?;

        let raw = std::fs::read(tree_path).map_err(|source| BuildError::ReadTree {
            path: tree_path.to_path_buf(),
            source,
        })?;
        let objects: Vec<DocObject> =
            serde_json::from_slice(&raw).map_err(|source| BuildError::DecodeTree {
                path: tree_path.to_path_buf(),
                source,
            })?;

        let data = fold(flatten(&objects));
        tracing::debug!(
            "Extracted {} namespaces, {} names",
            objects.len(),
            data.len()
        );
        write_map(dest, &data)?;
        Ok(data.len())
    }
}
