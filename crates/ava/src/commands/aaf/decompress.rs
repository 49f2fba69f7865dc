use std::{io::Write, path::PathBuf};

use ava_sarc::aaf;
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;

use crate::commands::{create_output, read_input};

#[derive(Args)]
pub struct DecompressArgs {
    /// An input AAF container
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// A target file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl DecompressArgs {
    pub fn handle(&self) -> Result<()> {
        let input = read_input(&self.input)?;
        if !aaf::is_aaf(&input) {
            return Err(miette!("{} is not an AAF container", self.input.display()));
        }

        let output = aaf::decompress(&input)
            .context(format!("decompressing {}", self.input.display()))?;
        info!("{} bytes decompressed to {}", input.len(), output.len());

        create_output(&self.output, self.overwrite)?
            .write_all(&output)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))?;

        Ok(())
    }
}
