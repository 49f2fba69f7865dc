use std::{io::Write, path::PathBuf};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use super::open_archive;
use crate::commands::{create_output, output_path};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive, plain or AAF compressed
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Ignore the `.toc` next to the archive
    #[arg(long, default_value_t = false)]
    no_toc: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, !self.no_toc)?;

        for entry in archive.entries() {
            let data = match archive.get_entry_bytes(entry) {
                Ok(data) => data,
                Err(e) if e.is_not_resident() => {
                    warn!("skipping {}: {}", entry.name, e);
                    continue;
                }
                Err(e) => return Err(e).context(format!("reading {}", entry.name)),
            };

            let p = output_path(&self.directory, &entry.name)?;
            info!("writing {}", p.display());

            create_output(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }

        Ok(())
    }
}
