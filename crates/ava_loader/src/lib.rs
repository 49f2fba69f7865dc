//! This library resolves logical asset paths of *Avalanche engine* games to their bytes.
//!
//! Assets live in `.tab`/`.arc` archive pairs below the game directory. A content dictionary maps
//! every logical path to the pair holding it, stream archives opened by the user are kept in a
//! registry and take precedence, and batched reads are coalesced so each pair is opened once.
//!
//! | Component                     | Role                                                        |
//! |-------------------------------|-------------------------------------------------------------|
//! | [`ContentDictionary`]         | logical path, content hash and archive pair location        |
//! | [`LoadedArchiveRegistry`]     | stream archives open in memory                              |
//! | [`RequestScheduler`]          | queued reads, grouped per archive pair and content hash     |
//! | [`Executor`]                  | where reads run                                             |
//! | [`FileResolutionService`]     | the entry point tying the above together                    |
//!

pub mod dictionary;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use dictionary::{ContentDictionary, ContentEntry, PairLocation};
pub use executor::{Executor, InlineExecutor, ReadHandle, ThreadExecutor, TokioExecutor};
pub use registry::{LoadedArchiveRegistry, SharedArchive};
pub use scheduler::{ArchiveBackend, DiskBackend, FlushReport, RequestScheduler};
pub use service::{
    BatchScope, FileResolutionService, Generation, ReadOptions, ServiceOptions, TextureParts,
};
