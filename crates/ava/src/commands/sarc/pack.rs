use std::{io::Write, path::PathBuf};

use ava_sarc::{aaf, FlatArchive};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;

use super::toc_path;
use crate::commands::create_output;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Write the archive as an AAF container
    #[arg(long, default_value_t = false)]
    compress: bool,

    /// Largest uncompressed chunk of the AAF container
    #[arg(long, default_value_t = aaf::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Write a `.toc` next to the archive
    #[arg(long, default_value_t = false)]
    toc: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", self.file.display());

        let name = self.file.to_string_lossy();
        let mut archive = FlatArchive::new(name);
        let count = archive
            .add_directory(&self.directory, &self.directory)
            .context(format!("packing {}", self.directory.display()))?;

        if count == 0 {
            return Err(miette!("directory is empty"));
        }

        let bytes = if self.compress {
            archive.compress(self.chunk_size)?
        } else {
            archive.as_bytes().to_vec()
        };

        create_output(&self.file, self.overwrite)?
            .write_all(&bytes)
            .into_diagnostic()
            .context(format!("writing {}", self.file.display()))?;

        if self.toc {
            let toc = toc_path(&self.file);
            info!("writing {}", toc.display());
            create_output(&toc, self.overwrite)?
                .write_all(&archive.write_toc()?)
                .into_diagnostic()
                .context(format!("writing {}", toc.display()))?;
        }

        info!("packed {} files", count);
        Ok(())
    }
}
