//! Stream archives currently open in memory.

use std::sync::Arc;

use ava_sarc::{ArchiveEntry, FlatArchive};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::dictionary::normalize_path;

/// An open archive, shared between the registry and its editors
pub type SharedArchive = Arc<RwLock<FlatArchive>>;

/// A registry entry matching a requested path
#[derive(Debug, Clone)]
pub struct RegistryHit {
    pub archive: SharedArchive,
    pub entry: ArchiveEntry,
}

/// Open archives keyed by name
///
/// In-memory archives take precedence over the archive pairs on disk because they may hold
/// unsaved edits. The lock only guards the map, archives are locked individually.
#[derive(Debug, Default)]
pub struct LoadedArchiveRegistry {
    archives: RwLock<IndexMap<String, SharedArchive>>,
}

impl LoadedArchiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `archive`, replacing any archive with the same name
    pub fn insert(&self, archive: FlatArchive) -> SharedArchive {
        let name = archive.name().to_owned();
        let shared = Arc::new(RwLock::new(archive));
        if self
            .archives
            .write()
            .insert(name.clone(), shared.clone())
            .is_some()
        {
            info!("replaced loaded archive {}", name);
        }
        shared
    }

    /// Forget the archive called `name`
    pub fn remove(&self, name: &str) -> Option<SharedArchive> {
        self.archives.write().shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<SharedArchive> {
        self.archives.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.archives.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.archives.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.read().is_empty()
    }

    pub fn clear(&self) {
        self.archives.write().clear();
    }

    fn snapshot(&self) -> Vec<SharedArchive> {
        self.archives.read().values().cloned().collect()
    }

    /// First archive entry named `path`, or whose name contains `path`
    ///
    /// Exact names are preferred over partial matches across all archives. The match may be an
    /// entry whose bytes live in a patch.
    pub fn find(&self, path: &str) -> Option<RegistryHit> {
        if path.is_empty() {
            return None;
        }
        let path = normalize_path(path);
        let archives = self.snapshot();

        for archive in &archives {
            if let Some(entry) = archive.read().entry(&path) {
                return Some(RegistryHit {
                    archive: archive.clone(),
                    entry: entry.clone(),
                });
            }
        }

        for archive in &archives {
            let guard = archive.read();
            if let Some(entry) = guard.entries().find(|e| e.name.contains(path.as_str())) {
                return Some(RegistryHit {
                    archive: archive.clone(),
                    entry: entry.clone(),
                });
            };
        }

        None
    }

    /// Bytes of `path` from a loaded archive, when they are resident there
    pub fn read_resident(&self, path: &str) -> Option<Bytes> {
        let hit = self.find(path)?;
        if !hit.entry.is_resident() {
            debug!(
                "{} is in a loaded archive but has been patched, reading the patch instead",
                hit.entry.name
            );
            return None;
        }

        let archive = hit.archive.read();
        match archive.get_entry_bytes(&hit.entry) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("{} not readable from {}: {}", hit.entry.name, archive.name(), e);
                None
            }
        }
    }

    /// Whether any loaded archive lists `path`
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }
}
