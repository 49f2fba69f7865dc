use std::path::{Path, PathBuf};

use ava_tab::{CompressionKind, TableFormat};
use clap::ValueEnum;
use miette::{miette, Result};

pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum TabCommands {
    /// List the entries of a TAB index
    List(list::ListArgs),
    /// Extract entries of an archive pair into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an archive pair
    Pack(pack::PackArgs),
}

impl TabCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            TabCommands::List(list) => list.handle(),
            TabCommands::Extract(extract) => extract.handle(),
            TabCommands::Pack(pack) => pack.handle(),
        }
    }
}

/// Index layout, legacy for Just Cause 3, current for Just Cause 4 and later
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Legacy,
    #[default]
    Current,
}

impl From<Format> for TableFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Legacy => TableFormat::Legacy,
            Format::Current => TableFormat::Current,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    None,
    #[default]
    Zlib,
}

impl From<Compression> for CompressionKind {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionKind::None,
            Compression::Zlib => CompressionKind::Zlib,
        }
    }
}

/// Parse a content hash written as hex, with or without `0x`
pub fn parse_hash(value: &str) -> std::result::Result<u32, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("{value} is not a hex hash: {e}"))
}

/// Split `dir/name.tab` (or `.arc`, or no extension) into the directory and pair name
pub fn split_pair_path(path: &Path) -> Result<(PathBuf, String)> {
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some("tab") | Some("arc") => path.file_stem(),
        _ => path.file_name(),
    }
    .and_then(|n| n.to_str())
    .ok_or_else(|| miette!("unable to take a pair name from {}", path.display()))?;

    Ok((directory, name.to_owned()))
}
