use std::fs::File;
use std::io::Write;
use std::path::Path;

use ava_tab::{
    error::{Error, FileNotFoundError, Result},
    hash_path,
    pair::{pair_paths, read_entry},
    write::{ArchivePairWriter, ArchivePairWriterOptions},
    ArchivePair, Codec, CompressionKind, TableFormat,
};
use tracing::info;
use tracing_test::traced_test;

fn write_pair(
    directory: &Path,
    name: &str,
    format: TableFormat,
    files: &[(&str, &[u8])],
) -> Result<()> {
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

#[traced_test]
#[test]
fn read_every_entry_of_a_pair() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let text = "modules/ai/rico.xml ".repeat(64);
    let files: [(&str, &[u8]); 3] = [
        ("editor/entities/rico.ee", b"entity"),
        ("settings/hp_settings.bin", &[0u8; 300]),
        ("modules/ai/rico.xml", text.as_bytes()),
    ];

    for format in [TableFormat::Legacy, TableFormat::Current] {
        let name = format!("game{:?}", format);
        write_pair(dir.path(), &name, format, &files)?;

        let mut pair = ArchivePair::open(dir.path(), &name, format)?;
        assert_eq!(pair.name(), name);
        assert_eq!(pair.table().len(), files.len());

        for (path, data) in &files {
            let actual = pair.read_entry(hash_path(path), &Codec::new())?;
            assert_eq!(&actual[..], *data);
        }
    }

    Ok(())
}

#[traced_test]
#[test]
fn missing_index_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    File::create(dir.path().join("game0.arc"))?;

    let actual = read_entry(dir.path(), "game0", 1, TableFormat::Legacy, &Codec::new());
    assert!(matches!(
        actual,
        Err(Error::FileNotFound(FileNotFoundError::Index(_)))
    ));

    Ok(())
}

#[traced_test]
#[test]
fn missing_data_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_pair(dir.path(), "game1", TableFormat::Legacy, &[("a", b"a")])?;
    std::fs::remove_file(dir.path().join("game1.arc"))?;

    let actual = read_entry(dir.path(), "game1", hash_path("a"), TableFormat::Legacy, &Codec::new());
    assert!(matches!(
        actual,
        Err(Error::FileNotFound(FileNotFoundError::Data(_)))
    ));

    Ok(())
}

#[traced_test]
#[test]
fn entry_not_in_index() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_pair(dir.path(), "game2", TableFormat::Current, &[("a", b"a")])?;

    let missing = hash_path("b");
    let actual = read_entry(dir.path(), "game2", missing, TableFormat::Current, &Codec::new());
    assert!(matches!(actual, Err(Error::EntryNotFound(h)) if h == missing));

    Ok(())
}

#[traced_test]
#[test]
fn proprietary_entry_without_decoder() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (index_path, data_path) = pair_paths(dir.path(), "game3");

    let mut table = ava_tab::ArchiveTable::new(TableFormat::Current);
    table.push_entry(ava_tab::TableEntry {
        content_hash: 5,
        offset: 0,
        compressed_size: 4,
        uncompressed_size: 64,
        compression: CompressionKind::ProprietaryLz,
        compressed_block_index: 0,
        flags: 0,
    });
    std::fs::write(index_path, table.to_bytes()?)?;
    std::fs::write(data_path, [0x8C, 0x06, 0x00, 0x00])?;

    let actual = read_entry(dir.path(), "game3", 5, TableFormat::Current, &Codec::new());
    assert!(matches!(actual, Err(Error::Codec(_))));

    Ok(())
}
