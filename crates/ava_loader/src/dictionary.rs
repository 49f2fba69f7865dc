//! The content dictionary maps logical asset paths to the archive pairs that hold them.
//!
//! The dictionary is a JSON object keyed by logical path. A value is either the list of candidate
//! archive locations, or an object carrying an explicit hash next to that list:
//!
//! ```json
//! {
//!     "models/jc_characters/rico.modelc": ["archives_win64/game0"],
//!     "textures/rico_dif.ddsc": { "hash": "0x3f2a9c11", "path": ["archives_win64/game1"] }
//! }
//! ```
//!
//! The first candidate is authoritative. It is split at its last `/` into the directory and the
//! base name of the pair (`{directory}/{archive}.tab` and `.arc`).

use std::fmt;

use ava_tab::hash::hash_path;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// A logical asset known to the dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub content_hash: u32,
    pub canonical_path: String,
    /// Archive locations holding the asset, the first one is used for reads
    pub candidate_paths: Vec<String>,
}

impl ContentEntry {
    /// The archive pair named by the first candidate path
    pub fn location(&self) -> Option<PairLocation> {
        self.candidate_paths
            .first()
            .map(|path| PairLocation::from_candidate(path))
    }
}

/// Directory and base name of an archive pair, relative to the game directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairLocation {
    pub directory: String,
    pub archive: String,
}

impl PairLocation {
    /// Split a candidate path at its last `/`
    pub fn from_candidate(path: &str) -> Self {
        match path.rsplit_once('/') {
            Some((directory, archive)) => Self {
                directory: directory.to_owned(),
                archive: archive.to_owned(),
            },
            None => Self {
                directory: String::new(),
                archive: path.to_owned(),
            },
        }
    }
}

impl fmt::Display for PairLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.directory.is_empty() {
            f.write_str(&self.archive)
        } else {
            write!(f, "{}/{}", self.directory, self.archive)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHash {
    Number(u32),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Paths(Vec<String>),
    Detailed {
        #[serde(default)]
        hash: Option<RawHash>,
        path: Vec<String>,
    },
}

fn parse_hash(raw: &RawHash) -> Option<u32> {
    match raw {
        RawHash::Number(hash) => Some(*hash),
        RawHash::Text(text) => {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            u32::from_str_radix(digits, 16).ok()
        }
    }
}

/// Normalised form of a logical path used for hashing
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Immutable index of every asset the game ships
#[derive(Debug, Clone, Default)]
pub struct ContentDictionary {
    entries: IndexMap<u32, ContentEntry>,
}

impl ContentDictionary {
    /// A dictionary with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the JSON form of the dictionary
    #[instrument(skip(json), fields(len = json.len()), err)]
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: IndexMap<String, RawEntry> = serde_json::from_str(json)?;

        let mut entries = IndexMap::with_capacity(raw.len());
        for (canonical_path, value) in raw {
            let (hash, candidate_paths) = match value {
                RawEntry::Paths(paths) => (None, paths),
                RawEntry::Detailed { hash, path } => (hash, path),
            };

            let content_hash = match hash {
                Some(raw_hash) => parse_hash(&raw_hash).ok_or_else(|| {
                    Error::CustomError(format!("{canonical_path} has an invalid hash"))
                })?,
                None => hash_path(&normalize_path(&canonical_path)),
            };

            if entries.contains_key(&content_hash) {
                warn!(
                    "{} collides with an earlier entry on hash {:#010x}, keeping the first",
                    canonical_path, content_hash
                );
                continue;
            }

            entries.insert(
                content_hash,
                ContentEntry {
                    content_hash,
                    canonical_path,
                    candidate_paths,
                },
            );
        }

        debug!("loaded {} dictionary entries", entries.len());
        Ok(Self { entries })
    }

    /// Build a dictionary from already resolved entries
    pub fn from_entries(entries: impl IntoIterator<Item = ContentEntry>) -> Self {
        let mut map = IndexMap::new();
        for entry in entries {
            map.entry(entry.content_hash).or_insert(entry);
        }
        Self { entries: map }
    }

    pub fn resolve_by_hash(&self, hash: u32) -> Option<&ContentEntry> {
        self.entries.get(&hash)
    }

    /// Look up a logical path by hash, falling back to a scan for a path ending in `path`
    ///
    /// The scan only accepts entries with the same extension, so `rico_dif.ddsc` can find
    /// `textures/rico_dif.ddsc` but never `textures/rico_dif.hmddsc`.
    pub fn resolve_by_path(&self, path: &str) -> Option<&ContentEntry> {
        if path.is_empty() {
            return None;
        }
        let path = normalize_path(path);
        if let Some(entry) = self.resolve_by_hash(hash_path(&path)) {
            return Some(entry);
        }

        let wanted = extension(&path);
        let found = self.entries.values().find(|entry| {
            entry.canonical_path == path
                || (entry.canonical_path.ends_with(path.as_str())
                    && extension(&entry.canonical_path) == wanted)
        });

        if let Some(entry) = found {
            debug!("{} resolved by suffix to {}", path, entry.canonical_path);
        }
        found
    }

    /// The archive pair holding `path`
    pub fn locate(&self, path: &str) -> Option<(u32, PairLocation)> {
        self.resolve_by_path(path)
            .and_then(|entry| entry.location().map(|l| (entry.content_hash, l)))
    }

    /// Like [`locate`](Self::locate), telling an unknown path apart from an entry that lists no
    /// archive
    pub fn find_location(&self, path: &str) -> Result<(u32, PairLocation)> {
        let entry = self
            .resolve_by_path(path)
            .ok_or_else(|| Error::NotInDictionary(path.to_owned()))?;
        let location = entry
            .location()
            .ok_or_else(|| Error::NoArchiveLocation(entry.canonical_path.clone()))?;
        Ok((entry.content_hash, location))
    }

    /// The archive pair holding the asset with `hash`
    pub fn locate_hash(&self, hash: u32) -> Option<PairLocation> {
        self.resolve_by_hash(hash).and_then(ContentEntry::location)
    }

    pub fn contains_hash(&self, hash: u32) -> bool {
        self.entries.contains_key(&hash)
    }

    /// Whether `path` hashes to a known asset, without the suffix scan
    pub fn contains_path(&self, path: &str) -> bool {
        self.contains_hash(hash_path(&normalize_path(path)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical paths in dictionary order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.canonical_path.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ContentEntry> {
        self.entries.values()
    }
}
