//! Batched reads.
//!
//! Requests are queued by logical path and resolved together on flush, so every archive pair is
//! opened once and every asset is read and decoded once no matter how many callers asked for it.

use std::{fmt, path::PathBuf};

use ava_tab::{ArchivePair, Codec, TableFormat};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument};

use crate::{
    dictionary::{ContentDictionary, PairLocation},
    error::{ReadError, ReadResult, Result},
    executor::Completion,
};

/// Receives the result of a read
pub struct Waiter(Box<dyn FnOnce(ReadResult) + Send>);

impl Waiter {
    pub fn new(f: impl FnOnce(ReadResult) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn complete(self, result: ReadResult) {
        (self.0)(result)
    }
}

impl From<Completion> for Waiter {
    fn from(sender: Completion) -> Self {
        Self::new(move |result| {
            // the receiver may have been dropped, nobody is left to tell
            let _ = sender.send(result);
        })
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Waiter")
    }
}

/// An archive pair opened for reading
pub trait OpenPair {
    fn read_entry(&mut self, hash: u32) -> Result<Bytes>;
}

/// Opens archive pairs for the scheduler and the direct read path
pub trait ArchiveBackend: Send + Sync + fmt::Debug {
    fn open_pair(&self, location: &PairLocation) -> Result<Box<dyn OpenPair + '_>>;
}

/// Archive pairs below a game directory
#[derive(Debug, Clone)]
pub struct DiskBackend {
    root: PathBuf,
    format: TableFormat,
    codec: Codec,
}

impl DiskBackend {
    pub fn new(root: impl Into<PathBuf>, format: TableFormat, codec: Codec) -> Self {
        Self {
            root: root.into(),
            format,
            codec,
        }
    }
}

struct DiskPair<'a> {
    pair: ArchivePair,
    codec: &'a Codec,
}

impl OpenPair for DiskPair<'_> {
    fn read_entry(&mut self, hash: u32) -> Result<Bytes> {
        Ok(self.pair.read_entry(hash, self.codec)?)
    }
}

impl ArchiveBackend for DiskBackend {
    fn open_pair(&self, location: &PairLocation) -> Result<Box<dyn OpenPair + '_>> {
        let pair = ArchivePair::open(
            self.root.join(&location.directory),
            &location.archive,
            self.format,
        )?;
        Ok(Box::new(DiskPair {
            pair,
            codec: &self.codec,
        }))
    }
}

/// What a flush did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Queued paths found in the dictionary
    pub resolved: usize,
    /// Queued paths failed because the dictionary does not know them
    pub unresolved: usize,
    pub pairs_opened: usize,
    /// Pairs that could not be opened, all of their requests failed
    pub pairs_failed: usize,
    /// Distinct assets read, successfully or not
    pub entries_read: usize,
}

/// Queue of batched read requests
#[derive(Debug, Default)]
pub struct RequestScheduler {
    pending: Mutex<IndexMap<String, Vec<Waiter>>>,
}

impl RequestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a read of `path`
    pub fn enqueue(&self, path: impl Into<String>, waiter: Waiter) {
        self.pending.lock().entry(path.into()).or_default().push(waiter);
    }

    /// Number of distinct queued paths
    pub fn pending_paths(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Resolve and read everything queued so far
    ///
    /// The queue is taken at the start, requests queued while a flush runs wait for the next one.
    /// Results of one pair are delivered in the order their assets were first requested.
    #[instrument(skip_all)]
    pub fn flush(&self, dictionary: &ContentDictionary, backend: &dyn ArchiveBackend) -> FlushReport {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut report = FlushReport::default();

        let mut groups: IndexMap<PairLocation, IndexMap<u32, Vec<Waiter>>> = IndexMap::new();
        for (path, waiters) in pending {
            match dictionary.find_location(&path) {
                Ok((hash, location)) => {
                    report.resolved += 1;
                    groups
                        .entry(location)
                        .or_default()
                        .entry(hash)
                        .or_default()
                        .extend(waiters);
                }
                Err(e) => {
                    report.unresolved += 1;
                    error!("can't resolve {}: {}", path, e);
                    fail_all(waiters, e.into());
                }
            }
        }

        for (location, assets) in groups {
            let requests: usize = assets.values().map(Vec::len).sum();
            debug!("will read {} files from {}", requests, location);

            let mut pair = match backend.open_pair(&location) {
                Ok(pair) => {
                    report.pairs_opened += 1;
                    pair
                }
                Err(e) => {
                    report.pairs_failed += 1;
                    error!("failed to open {}: {}", location, e);
                    fail_all(assets.into_values().flatten(), e.into());
                    continue;
                }
            };

            for (hash, waiters) in assets {
                report.entries_read += 1;
                let result = pair.read_entry(hash).map_err(ReadError::from);
                if let Err(e) = &result {
                    error!("failed to read {:#010x} from {}: {}", hash, location, e);
                }

                for waiter in waiters {
                    waiter.complete(result.clone());
                }
            }
        }

        info!(
            "flushed {} paths from {} archive pairs",
            report.resolved + report.unresolved,
            report.pairs_opened + report.pairs_failed
        );
        report
    }
}

fn fail_all(waiters: impl IntoIterator<Item = Waiter>, error: ReadError) {
    for waiter in waiters {
        waiter.complete(Err(error.clone()));
    }
}
