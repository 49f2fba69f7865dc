use std::{fs::File, path::PathBuf};

use ava_tab::{
    pair::pair_paths,
    write::{ArchivePairWriter, ArchivePairWriterOptions},
};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;
use walkdir::WalkDir;

use super::{split_pair_path, Compression, Format};
use crate::commands::create_output;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// The target pair, `game0` writes `game0.tab` and `game0.arc`
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Layout of the index
    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// Compression for every entry, ignored by the legacy layout
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,

    /// Payload alignment in the data file
    #[arg(long, default_value_t = 16)]
    alignment: u32,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let (directory, name) = split_pair_path(&self.file)?;
        let (index_path, data_path) = pair_paths(&directory, &name);
        info!("creating {} and {}", index_path.display(), data_path.display());

        let mut pair = ArchivePairWriter::new(
            create_output(&index_path, self.overwrite)?,
            create_output(&data_path, self.overwrite)?,
            ArchivePairWriterOptions::builder()
                .format(self.format.into())
                .alignment(self.alignment)
                .build(),
        );

        for file in files {
            let name = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = name
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?
                .replace('\\', "/");
            info!("packing {}", name);

            pair.start_file(&name, self.compression.into())
                .context(format!("starting entry for {name}"))?;

            let mut f = File::open(file.path())
                .into_diagnostic()
                .context(format!("opening {}", file.path().display()))?;

            std::io::copy(&mut f, &mut pair)
                .into_diagnostic()
                .context(format!("copying {}", file.path().display()))?;
        }

        pair.finish().context("finalizing archive pair")?;

        Ok(())
    }
}
