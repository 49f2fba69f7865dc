use std::{io::Write, path::PathBuf};

use ava_sarc::aaf;
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;

use super::{open_archive, toc_path};
use crate::commands::{create_output, read_input};

#[derive(Args)]
pub struct AddArgs {
    /// The archive to modify
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The file to add
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Path of the file inside the archive
    #[arg(short, long)]
    name: String,

    /// Where to write the result, defaults to replacing the archive
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the result as an AAF container
    #[arg(long, default_value_t = false)]
    compress: bool,

    /// Write a `.toc` next to the result
    #[arg(long, default_value_t = false)]
    toc: bool,
}

impl AddArgs {
    pub fn handle(&self) -> Result<()> {
        let mut archive = open_archive(&self.file, false)?;
        let data = read_input(&self.input)?;

        archive
            .add_file(&self.name, &data)
            .context(format!("adding {}", self.name))?;
        info!("added {} ({} bytes)", self.name, data.len());

        let output = self.output.as_ref().unwrap_or(&self.file);
        let bytes = if self.compress {
            archive.compress(aaf::DEFAULT_CHUNK_SIZE)?
        } else {
            archive.as_bytes().to_vec()
        };

        info!("writing {}", output.display());
        create_output(output, true)?
            .write_all(&bytes)
            .into_diagnostic()
            .context(format!("writing {}", output.display()))?;

        if self.toc {
            let toc = toc_path(output);
            info!("writing {}", toc.display());
            create_output(&toc, true)?
                .write_all(&archive.write_toc()?)
                .into_diagnostic()
                .context(format!("writing {}", toc.display()))?;
        }

        Ok(())
    }
}
