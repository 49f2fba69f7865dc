use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ava_loader::{
    error::{Error, Result},
    scheduler::OpenPair,
    ArchiveBackend, DiskBackend, FileResolutionService, FlushReport, Generation, InlineExecutor,
    PairLocation, ReadOptions, ServiceOptions, TokioExecutor,
};
use ava_sarc::FlatArchive;
use ava_tab::{
    pair::pair_paths,
    write::{ArchivePairWriter, ArchivePairWriterOptions},
    Codec, CompressionKind, TableFormat,
};
use bytes::Bytes;
use pretty_assertions::assert_eq;
use tracing::info;
use tracing_test::traced_test;

const DICTIONARY: &str = r#"{
    "models/rico.modelc": ["archives_win64/game0"],
    "models/sheldon.modelc": ["archives_win64/game0"],
    "settings/world.bin": ["archives_win64/game1"],
    "textures/rico_dif.ddsc": ["archives_win64/game1"],
    "textures/rico_dif.atx1": ["archives_win64/game1"],
    "textures/sky.atx1": ["archives_win64/game1"],
    "textures/sky.ddsc": ["archives_win64/game2"],
    "missing/pair.bin": ["archives_win64/nowhere"]
}"#;

fn write_pair(directory: &Path, name: &str, format: TableFormat, files: &[(&str, &[u8])]) -> Result<()> {
    fs::create_dir_all(directory)?;
    let (index_path, data_path) = pair_paths(directory, name);
    let mut pair = ArchivePairWriter::new(
        File::create(index_path)?,
        File::create(data_path)?,
        ArchivePairWriterOptions::builder().format(format).build(),
    );

    for (path, data) in files {
        info!("packing {}", path);
        pair.start_file(path, CompressionKind::Zlib)?;
        pair.write_all(data)?;
    }
    pair.finish()?;

    Ok(())
}

/// game0 and game1 in the current format, game2 is listed but never written
fn game_directory(root: &Path) -> Result<()> {
    let archives = root.join("archives_win64");
    write_pair(
        &archives,
        "game0",
        TableFormat::Current,
        &[
            ("models/rico.modelc", b"rico model"),
            ("models/sheldon.modelc", &[7u8; 512]),
        ],
    )?;
    write_pair(
        &archives,
        "game1",
        TableFormat::Current,
        &[
            ("settings/world.bin", b"world settings"),
            ("textures/rico_dif.ddsc", b"ddsc header"),
            ("textures/rico_dif.atx1", b"high resolution"),
            ("textures/sky.atx1", b"sky source"),
        ],
    )?;
    Ok(())
}

/// Disk backend that counts how often pairs are opened
#[derive(Debug)]
struct CountingBackend {
    disk: DiskBackend,
    opens: AtomicUsize,
}

impl ArchiveBackend for CountingBackend {
    fn open_pair(&self, location: &PairLocation) -> Result<Box<dyn OpenPair + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.disk.open_pair(location)
    }
}

fn service(root: &Path) -> FileResolutionService {
    FileResolutionService::new(
        ServiceOptions::builder()
            .game_directory(root)
            .executor(Arc::new(InlineExecutor))
            .dictionary_json(DICTIONARY)
            .build(),
    )
}

#[traced_test]
#[test]
fn read_through_the_dictionary() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());
    assert!(!service.is_degraded());

    let model = service.read("models\\rico.modelc", ReadOptions::default()).wait();
    assert_eq!(model.ok(), Some(Bytes::from_static(b"rico model")));

    let sheldon = service.read("models/sheldon.modelc", ReadOptions::default()).wait();
    assert_eq!(sheldon.ok().map(|b| b.len()), Some(512));

    Ok(())
}

#[traced_test]
#[test]
fn unknown_path_and_missing_pair() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());

    let unknown = service.read("nothing/here.bin", ReadOptions::default()).wait();
    assert!(matches!(
        unknown.as_ref().map_err(|e| e.inner()),
        Err(Error::NotInDictionary(path)) if path == "nothing/here.bin"
    ));

    let missing = service.read("missing/pair.bin", ReadOptions::default()).wait();
    assert!(matches!(
        missing.as_ref().map_err(|e| e.inner()),
        Err(Error::Tab(ava_tab::error::Error::FileNotFound(_)))
    ));
    assert!(logs_contain("failed to read missing/pair.bin"));

    Ok(())
}

#[traced_test]
#[test]
fn batch_opens_each_pair_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;

    let backend = Arc::new(CountingBackend {
        disk: DiskBackend::new(dir.path(), TableFormat::Current, Codec::new()),
        opens: AtomicUsize::new(0),
    });
    let service = FileResolutionService::new(
        ServiceOptions::builder()
            .game_directory(dir.path())
            .executor(Arc::new(InlineExecutor))
            .dictionary_json(DICTIONARY)
            .backend(backend.clone())
            .build(),
    );

    let batch = service.batch();
    let handles = [
        "models/rico.modelc",
        "models/sheldon.modelc",
        "models/rico.modelc",
        "settings/world.bin",
        "models/rico.modelc",
        "nothing/here.bin",
    ]
    .map(|path| batch.read(path, ReadOptions::default()));
    assert_eq!(backend.opens.load(Ordering::SeqCst), 0);

    let report = batch.finish().wait().ok();
    assert_eq!(
        report,
        Some(FlushReport {
            resolved: 3,
            unresolved: 1,
            pairs_opened: 2,
            pairs_failed: 0,
            entries_read: 3,
        })
    );
    assert_eq!(backend.opens.load(Ordering::SeqCst), 2);

    let results = handles.map(|h| h.wait().ok());
    assert_eq!(results[0], Some(Bytes::from_static(b"rico model")));
    assert_eq!(results[2], results[0]);
    assert_eq!(results[4], results[0]);
    assert_eq!(results[3], Some(Bytes::from_static(b"world settings")));
    assert_eq!(results[5], None);

    Ok(())
}

#[traced_test]
#[test]
fn dropping_a_batch_flushes_it() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());

    let handle = {
        let batch = service.batch();
        batch.read("settings/world.bin", ReadOptions::default())
    };
    assert_eq!(handle.wait().ok(), Some(Bytes::from_static(b"world settings")));

    Ok(())
}

#[traced_test]
#[test]
fn ddsc_falls_back_to_source() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());

    // sky.ddsc lives in a pair that does not exist
    let sky = service.read("textures/sky.ddsc", ReadOptions::default()).wait();
    assert_eq!(sky.ok(), Some(Bytes::from_static(b"sky source")));

    let options = ReadOptions::builder().skip_texture_fallback(true).build();
    assert!(service.read("textures/sky.ddsc", options).wait().is_err());

    // the same rule applies to batched reads
    let batch = service.batch();
    let batched = batch.read("textures/sky.ddsc", ReadOptions::default());
    drop(batch);
    assert_eq!(batched.wait().ok(), Some(Bytes::from_static(b"sky source")));

    let rico = service.read("textures/rico_dif.ddsc", ReadOptions::default()).wait();
    assert_eq!(rico.ok(), Some(Bytes::from_static(b"ddsc header")));

    Ok(())
}

#[traced_test]
#[test]
fn texture_parts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());

    let parts = service.read_texture("textures/rico_dif.ddsc").wait().ok();
    assert_eq!(
        parts.map(|p| (p.ddsc, p.source)),
        Some((
            Bytes::from_static(b"ddsc header"),
            Some(Bytes::from_static(b"high resolution"))
        ))
    );

    Ok(())
}

#[traced_test]
#[test]
fn legacy_generation_uses_hmddsc() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_pair(
        &dir.path().join("archives_win64"),
        "game0",
        TableFormat::Legacy,
        &[("textures/rico_dif.hmddsc", b"legacy source")],
    )?;

    let service = FileResolutionService::new(
        ServiceOptions::builder()
            .game_directory(dir.path())
            .generation(Generation::Legacy)
            .executor(Arc::new(InlineExecutor))
            .dictionary_json(r#"{ "textures/rico_dif.hmddsc": ["archives_win64/game0"] }"#)
            .build(),
    );

    let texture = service.read("textures/rico_dif.ddsc", ReadOptions::default()).wait();
    assert_eq!(texture.ok(), Some(Bytes::from_static(b"legacy source")));

    Ok(())
}

#[traced_test]
#[test]
fn loaded_archives_take_precedence() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = service(dir.path());

    let mut archive = FlatArchive::new("editor/entities/rico.ee");
    archive.add_file("models/rico.modelc", b"edited in memory")?;
    archive.add_file("settings/world.bin", b"stale")?;
    // world.bin has been patched, its bytes live in the archive pair
    let mut toc = Vec::new();
    toc.extend_from_slice(&18u32.to_le_bytes());
    toc.extend_from_slice(b"settings/world.bin");
    toc.extend_from_slice(&0u32.to_le_bytes());
    toc.extend_from_slice(&5u32.to_le_bytes());
    archive.apply_overlay(&toc)?;
    service.registry().insert(archive);

    let model = service.read("models/rico.modelc", ReadOptions::default()).wait();
    assert_eq!(model.ok(), Some(Bytes::from_static(b"edited in memory")));

    let world = service.read("settings/world.bin", ReadOptions::default()).wait();
    assert_eq!(world.ok(), Some(Bytes::from_static(b"world settings")));

    // an empty path must not match whatever entry comes first
    let empty = service.read("", ReadOptions::default()).wait();
    assert!(matches!(
        empty.as_ref().map_err(|e| e.inner()),
        Err(Error::NotInDictionary(path)) if path.is_empty()
    ));

    assert!(service.close_archive("editor/entities/rico.ee").is_some());
    let model = service.read("models/rico.modelc", ReadOptions::default()).wait();
    assert_eq!(model.ok(), Some(Bytes::from_static(b"rico model")));

    Ok(())
}

#[traced_test]
#[test]
fn open_archive_from_disk_with_toc() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service(dir.path());

    let mut archive = FlatArchive::new("props.ee");
    archive.add_file("props/crate.modelc", b"crate")?;
    archive.add_file("props/barrel.modelc", b"barrel")?;
    let path = dir.path().join("props.ee");
    fs::write(&path, archive.compress(1024)?)?;

    // the TOC points barrel at a patch
    let mut toc = Vec::new();
    toc.extend_from_slice(&19u32.to_le_bytes());
    toc.extend_from_slice(b"props/barrel.modelc");
    toc.extend_from_slice(&0u32.to_le_bytes());
    toc.extend_from_slice(&6u32.to_le_bytes());
    fs::write(dir.path().join("props.ee.toc"), toc)?;

    let path = path.to_string_lossy().into_owned();
    let opened = service.open_archive(&path).wait();
    assert!(opened.as_ref().is_ok_and(|a| a.read().is_using_toc()));
    assert_eq!(service.registry().len(), 1);
    assert!(service.has_file("props/crate.modelc"));

    let crate_model = service.read("props/crate.modelc", ReadOptions::default()).wait();
    assert_eq!(crate_model.ok(), Some(Bytes::from_static(b"crate")));
    assert!(service
        .read("props/barrel.modelc", ReadOptions::default())
        .wait()
        .is_err());

    assert!(service.close_archive(&path).is_some());
    assert!(!service.has_file("props/crate.modelc"));

    Ok(())
}

#[traced_test]
#[test]
fn absolute_paths_bypass_the_dictionary() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service(dir.path());
    let path = dir.path().join("loose.bin");
    fs::write(&path, b"loose file")?;

    let path = path.to_string_lossy().into_owned();
    let loose = service.read(&path, ReadOptions::default()).wait();
    assert_eq!(loose.ok(), Some(Bytes::from_static(b"loose file")));

    let missing = dir.path().join("missing.bin");
    let missing = service
        .read(&missing.to_string_lossy(), ReadOptions::default())
        .wait();
    assert!(matches!(
        missing.as_ref().map_err(|e| e.inner()),
        Err(Error::IOError(_))
    ));

    Ok(())
}

#[traced_test]
#[test]
fn malformed_dictionary_degrades() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;
    let service = FileResolutionService::new(
        ServiceOptions::builder()
            .game_directory(dir.path())
            .executor(Arc::new(InlineExecutor))
            .dictionary_json("{ \"truncated\": [")
            .build(),
    );

    assert!(service.is_degraded());
    assert!(matches!(service.dictionary_error(), Some(Error::Dictionary(_))));
    assert!(service.dictionary().is_empty());
    assert!(logs_contain("some features will be disabled"));

    let model = service.read("models/rico.modelc", ReadOptions::default()).wait();
    assert!(model.is_err());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn await_reads_on_a_tokio_runtime() -> Result<()> {
    let dir = tempfile::tempdir()?;
    game_directory(dir.path())?;

    let executor = TokioExecutor::current()
        .ok_or_else(|| Error::CustomError("not inside a runtime".into()))?;
    let service = FileResolutionService::new(
        ServiceOptions::builder()
            .game_directory(dir.path())
            .executor(Arc::new(executor))
            .dictionary_json(DICTIONARY)
            .build(),
    );

    let (rico, world) = tokio::join!(
        service.read("models/rico.modelc", ReadOptions::default()),
        service.read("settings/world.bin", ReadOptions::default()),
    );
    assert_eq!(rico.ok(), Some(Bytes::from_static(b"rico model")));
    assert_eq!(world.ok(), Some(Bytes::from_static(b"world settings")));

    Ok(())
}
