use std::path::{Path, PathBuf};

use ava_sarc::FlatArchive;
use miette::{Context, Result};
use tracing::info;

use crate::commands::read_input;

pub mod add;
pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum SarcCommands {
    /// List the entries of a stream archive
    List(list::ListArgs),
    /// Extract the resident entries of a stream archive
    Extract(extract::ExtractArgs),
    /// Add or replace a file in a stream archive
    Add(add::AddArgs),
    /// Pack a directory into a stream archive
    Pack(pack::PackArgs),
}

impl SarcCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            SarcCommands::List(list) => list.handle(),
            SarcCommands::Extract(extract) => extract.handle(),
            SarcCommands::Add(add) => add.handle(),
            SarcCommands::Pack(pack) => pack.handle(),
        }
    }
}

/// `{file}.toc` next to an archive
pub fn toc_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".toc");
    PathBuf::from(name)
}

/// Open an archive, merging its `.toc` when there is one and `use_toc` is set
pub fn open_archive(file: &Path, use_toc: bool) -> Result<FlatArchive> {
    let bytes = read_input(file)?;

    let toc_file = toc_path(file);
    let toc = if use_toc && toc_file.is_file() {
        info!("using {}", toc_file.display());
        Some(read_input(&toc_file)?)
    } else {
        None
    };

    let name = file.to_string_lossy();
    FlatArchive::open(&name, bytes.into(), toc.as_deref())
        .context(format!("opening {}", file.display()))
}
