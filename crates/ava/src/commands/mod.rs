use std::{
    fs::File,
    path::{Component, Path, PathBuf},
};

use miette::{miette, Context, IntoDiagnostic, Result};

pub mod aaf;
pub mod read;
pub mod sarc;
pub mod tab;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle TAB/ARC archive pairs
    Tab {
        #[command(subcommand)]
        command: tab::TabCommands,
    },
    /// Handle SARC stream archives
    Sarc {
        #[command(subcommand)]
        command: sarc::SarcCommands,
    },
    /// Handle AAF compressed containers
    Aaf {
        #[command(subcommand)]
        command: aaf::AafCommands,
    },
    /// Resolve logical paths through the content dictionary
    Read(read::ReadArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Tab { command } => command.handle(),
            Commands::Sarc { command } => command.handle(),
            Commands::Aaf { command } => command.handle(),
            Commands::Read(read) => read.handle(),
        }
    }
}

/// Create `path` and its parents, refusing to replace an existing file unless `overwrite` is set
pub(crate) fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    if !overwrite {
        File::create_new(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    } else {
        File::create(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    }
}

/// Read a whole file, naming it in the error
pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))
}

/// Where `logical` is written below `directory`
///
/// Roots and drive prefixes are dropped so absolute logical paths stay inside `directory`.
pub(crate) fn output_path(directory: &Path, logical: &str) -> Result<PathBuf> {
    let normalized = logical.replace('\\', "/");
    let mut out = directory.to_path_buf();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(miette!("{logical} leaves the target directory"));
            }
        }
    }
    if out == directory {
        return Err(miette!("{logical} does not name a file"));
    }
    Ok(out)
}
