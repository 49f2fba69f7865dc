//! The file resolution service turns logical asset paths into bytes.
//!
//! A read is resolved in this order:
//!
//! 1. absolute paths are read straight from disk
//! 2. `.ddsc` textures fall back to their high resolution source file when they cannot be read
//! 3. archives loaded into the [`LoadedArchiveRegistry`] win when they hold the bytes
//! 4. everything else goes through the [`ContentDictionary`] to an archive pair, either directly
//!    on the executor or queued in a [`BatchScope`]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ava_sarc::FlatArchive;
use ava_tab::{compression::LzDecompressor, Codec, TableFormat};
use bon::Builder;
use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    dictionary::{normalize_path, ContentDictionary},
    error::{Error, ReadResult},
    executor::{Executor, ReadHandle, ThreadExecutor},
    registry::{LoadedArchiveRegistry, SharedArchive},
    scheduler::{ArchiveBackend, DiskBackend, FlushReport, RequestScheduler, Waiter},
};

/// Game generation, deciding the table layout and texture source extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Generation {
    /// 12 byte table entries, `.hmddsc` texture sources
    Legacy,
    /// 20 byte table entries with block tables, `.atx1` texture sources
    #[default]
    Current,
}

impl Generation {
    pub fn table_format(self) -> TableFormat {
        match self {
            Generation::Legacy => TableFormat::Legacy,
            Generation::Current => TableFormat::Current,
        }
    }

    /// Extension of the high resolution companion of a `.ddsc` texture
    pub fn texture_source_extension(self) -> &'static str {
        match self {
            Generation::Legacy => "hmddsc",
            Generation::Current => "atx1",
        }
    }
}

fn default_executor() -> Arc<dyn Executor> {
    Arc::new(ThreadExecutor)
}

/// Options for building a [`FileResolutionService`]
#[derive(Builder)]
pub struct ServiceOptions {
    /// Root that dictionary locations are relative to
    #[builder(into)]
    pub game_directory: PathBuf,

    #[builder(default)]
    pub generation: Generation,

    /// Where reads and flushes run
    #[builder(default = default_executor())]
    pub executor: Arc<dyn Executor>,

    /// Decoder for proprietary LZ entries, they fail to read without one
    pub lz_decompressor: Option<Arc<dyn LzDecompressor>>,

    /// JSON form of the content dictionary
    #[builder(into)]
    pub dictionary_json: Option<String>,

    /// Replaces the archive pairs below `game_directory`
    pub backend: Option<Arc<dyn ArchiveBackend>>,
}

/// Per read options
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ReadOptions {
    /// Do not retry a failed `.ddsc` read with its source file
    #[builder(default)]
    pub skip_texture_fallback: bool,
}

/// A texture and its high resolution source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureParts {
    pub ddsc: Bytes,
    /// The `.hmddsc`/`.atx1` companion, when the dictionary knows one
    pub source: Option<Bytes>,
}

fn extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

fn with_extension(path: &str, extension: &str) -> String {
    let stem_end = match path.rfind('.') {
        Some(dot) if !path[dot..].contains(['/', '\\']) => dot,
        _ => path.len(),
    };
    format!("{}.{}", &path[..stem_end], extension)
}

#[instrument(err)]
fn read_from_disk(path: &Path) -> ReadResult {
    Ok(std::fs::read(path)?.into())
}

#[derive(Debug)]
struct Inner {
    game_directory: PathBuf,
    generation: Generation,
    executor: Arc<dyn Executor>,
    dictionary: ContentDictionary,
    dictionary_error: Option<Error>,
    registry: LoadedArchiveRegistry,
    scheduler: RequestScheduler,
    backend: Arc<dyn ArchiveBackend>,
}

impl Inner {
    fn read_from_dictionary(&self, path: &str) -> ReadResult {
        let (hash, location) = self.dictionary.find_location(path).map_err(|e| {
            error!("can't resolve {}: {}", path, e);
            e
        })?;

        debug!("reading {} ({:#010x}) from {}", path, hash, location);
        let result = self
            .backend
            .open_pair(&location)
            .and_then(|mut pair| pair.read_entry(hash));

        result.map_err(|e| {
            error!("failed to read {} from {}: {}", path, location, e);
            e.into()
        })
    }

    /// Blocking read without texture fallback or batching
    fn read_now(&self, path: &str) -> ReadResult {
        if Path::new(path).is_absolute() {
            return read_from_disk(Path::new(path));
        }

        match self.registry.read_resident(path) {
            Some(bytes) => Ok(bytes),
            None => self.read_from_dictionary(path),
        }
    }

    fn has_file(&self, path: &str) -> bool {
        self.registry.contains(path) || self.dictionary.resolve_by_path(path).is_some()
    }

    fn read_texture(&self, path: &str) -> ReadResult<TextureParts> {
        let ddsc = self.read_now(path)?;

        let source_path = with_extension(path, self.generation.texture_source_extension());
        let source = if self.has_file(&source_path) {
            match self.read_now(&source_path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("{} is listed but could not be read: {}", source_path, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(TextureParts { ddsc, source })
    }

    fn open_archive(&self, path: &str) -> ReadResult<SharedArchive> {
        let bytes = self.read_now(path)?;

        let toc_path = format!("{path}.toc");
        let toc = if Path::new(&toc_path).is_absolute() {
            std::fs::read(&toc_path).ok()
        } else if self.has_file(&toc_path) {
            self.read_now(&toc_path).ok().map(|b| b.to_vec())
        } else {
            None
        };

        let archive = FlatArchive::open(path, bytes, toc.as_deref())?;
        info!("loaded {} ({} files)", path, archive.len());
        Ok(self.registry.insert(archive))
    }
}

/// Resolves logical paths to bytes
///
/// Cheap to clone, all clones share the dictionary, registry and batch queue.
///
/// ```no_run
/// use ava_loader::{FileResolutionService, ReadOptions, ServiceOptions};
///
/// let service = FileResolutionService::new(
///     ServiceOptions::builder()
///         .game_directory("C:/Games/Just Cause 4")
///         .dictionary_json(std::fs::read_to_string("dictionary.json").unwrap())
///         .build(),
/// );
///
/// let model = service
///     .read("models/jc_characters/main_characters/rico/rico_body_lod1.modelc", ReadOptions::default())
///     .wait();
/// ```
#[derive(Debug, Clone)]
pub struct FileResolutionService {
    inner: Arc<Inner>,
}

impl FileResolutionService {
    /// Build the service
    ///
    /// A dictionary that fails to parse leaves the service running without one, see
    /// [`is_degraded`](Self::is_degraded).
    #[instrument(skip_all, fields(game_directory = %options.game_directory.display()))]
    pub fn new(options: ServiceOptions) -> Self {
        let (dictionary, dictionary_error) = match options.dictionary_json.as_deref() {
            None => (ContentDictionary::empty(), None),
            Some(json) => match ContentDictionary::from_json(json) {
                Ok(dictionary) => {
                    info!("content dictionary has {} entries", dictionary.len());
                    (dictionary, None)
                }
                Err(e) => {
                    error!("failed to load the content dictionary: {}", e);
                    warn!("some features will be disabled");
                    (ContentDictionary::empty(), Some(e))
                }
            },
        };

        let codec = match options.lz_decompressor {
            Some(lz) => Codec::with_lz(lz),
            None => {
                debug!("no proprietary decompressor installed");
                Codec::new()
            }
        };

        let backend: Arc<dyn ArchiveBackend> = match options.backend {
            Some(backend) => backend,
            None => Arc::new(DiskBackend::new(
                options.game_directory.clone(),
                options.generation.table_format(),
                codec,
            )),
        };

        Self {
            inner: Arc::new(Inner {
                game_directory: options.game_directory,
                generation: options.generation,
                executor: options.executor,
                dictionary,
                dictionary_error,
                registry: LoadedArchiveRegistry::new(),
                scheduler: RequestScheduler::new(),
                backend,
            }),
        }
    }

    /// Read `path` on the executor
    pub fn read(&self, path: &str, options: ReadOptions) -> ReadHandle {
        let (sender, handle) = ReadHandle::channel();
        self.dispatch(path, options, false, sender.into());
        handle
    }

    /// Start collecting reads that are resolved together
    pub fn batch(&self) -> BatchScope<'_> {
        BatchScope {
            service: self,
            flushed: false,
        }
    }

    #[instrument(level = "debug", skip(self, options, waiter))]
    fn dispatch(&self, path: &str, options: ReadOptions, batched: bool, waiter: Waiter) {
        if Path::new(path).is_absolute() {
            let path = PathBuf::from(path);
            self.inner
                .executor
                .spawn(Box::new(move || waiter.complete(read_from_disk(&path))));
            return;
        }

        let path = normalize_path(path);

        if !options.skip_texture_fallback && extension(&path) == Some("ddsc") {
            let service = self.clone();
            let source = with_extension(&path, self.generation().texture_source_extension());
            let fallback = Waiter::new(move |result| match result {
                Ok(bytes) => waiter.complete(Ok(bytes)),
                Err(e) => {
                    debug!("texture read failed ({}), trying {}", e, source);
                    let options = ReadOptions {
                        skip_texture_fallback: true,
                    };
                    service.dispatch(&source, options, false, waiter);
                }
            });

            let options = ReadOptions {
                skip_texture_fallback: true,
            };
            return self.dispatch(&path, options, batched, fallback);
        }

        if let Some(bytes) = self.inner.registry.read_resident(&path) {
            debug!("{} served from a loaded archive", path);
            return waiter.complete(Ok(bytes));
        }

        if batched {
            self.inner.scheduler.enqueue(path, waiter);
            return;
        }

        let inner = self.inner.clone();
        self.inner.executor.spawn(Box::new(move || {
            waiter.complete(inner.read_from_dictionary(&path));
        }));
    }

    /// Resolve everything queued by batch scopes
    pub fn flush(&self) -> ReadHandle<FlushReport> {
        let (sender, handle) = ReadHandle::channel();
        let inner = self.inner.clone();
        self.inner.executor.spawn(Box::new(move || {
            let report = inner
                .scheduler
                .flush(&inner.dictionary, inner.backend.as_ref());
            let _ = sender.send(Ok(report));
        }));
        handle
    }

    /// Read a `.ddsc` texture together with its high resolution source
    pub fn read_texture(&self, path: &str) -> ReadHandle<TextureParts> {
        let (sender, handle) = ReadHandle::channel();
        let inner = self.inner.clone();
        let path = normalize_path(path);
        self.inner.executor.spawn(Box::new(move || {
            let _ = sender.send(inner.read_texture(&path));
        }));
        handle
    }

    /// Read a stream archive and its `.toc`, then register it
    pub fn open_archive(&self, path: &str) -> ReadHandle<SharedArchive> {
        let (sender, handle) = ReadHandle::channel();
        let inner = self.inner.clone();
        let path = match Path::new(path).is_absolute() {
            true => path.to_owned(),
            false => normalize_path(path),
        };
        self.inner.executor.spawn(Box::new(move || {
            let _ = sender.send(inner.open_archive(&path));
        }));
        handle
    }

    /// Unregister a loaded archive
    pub fn close_archive(&self, name: &str) -> Option<SharedArchive> {
        let closed = self.inner.registry.remove(name);
        if closed.is_some() {
            info!("closed {}", name);
        }
        closed
    }

    /// Whether a loaded archive or the dictionary knows `path`
    pub fn has_file(&self, path: &str) -> bool {
        self.inner.has_file(path)
    }

    pub fn dictionary(&self) -> &ContentDictionary {
        &self.inner.dictionary
    }

    pub fn registry(&self) -> &LoadedArchiveRegistry {
        &self.inner.registry
    }

    /// The dictionary failed to load and every dictionary lookup misses
    pub fn is_degraded(&self) -> bool {
        self.inner.dictionary_error.is_some()
    }

    /// Why the dictionary failed to load
    pub fn dictionary_error(&self) -> Option<&Error> {
        self.inner.dictionary_error.as_ref()
    }

    pub fn game_directory(&self) -> &Path {
        &self.inner.game_directory
    }

    pub fn generation(&self) -> Generation {
        self.inner.generation
    }
}

/// Reads issued through a scope are queued and resolved together when it ends
///
/// Dropping the scope flushes as well, [`finish`](Self::finish) also reports what the flush did.
#[derive(Debug)]
pub struct BatchScope<'a> {
    service: &'a FileResolutionService,
    flushed: bool,
}

impl BatchScope<'_> {
    pub fn read(&self, path: &str, options: ReadOptions) -> ReadHandle {
        let (sender, handle) = ReadHandle::channel();
        self.service.dispatch(path, options, true, sender.into());
        handle
    }

    /// Flush the queued reads
    pub fn finish(mut self) -> ReadHandle<FlushReport> {
        self.flushed = true;
        self.service.flush()
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if !self.flushed {
            drop(self.service.flush());
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{extension, with_extension, Generation};

    #[test]
    fn texture_paths() {
        assert_eq!(extension("textures/rico_dif.ddsc"), Some("ddsc"));
        assert_eq!(extension("textures\\rico_dif.atx2"), Some("atx2"));
        assert_eq!(extension("textures.ddsc/readme"), None);

        assert_eq!(extension("a/b.c/d"), None);
        assert_eq!(
            with_extension("textures/rico_dif.ddsc", Generation::Current.texture_source_extension()),
            "textures/rico_dif.atx1"
        );
        assert_eq!(
            with_extension("textures/rico_dif.ddsc", Generation::Legacy.texture_source_extension()),
            "textures/rico_dif.hmddsc"
        );
        assert_eq!(with_extension("a.dir/noext", "bin"), "a.dir/noext.bin");
    }
}
