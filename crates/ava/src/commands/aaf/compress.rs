use std::{io::Write, path::PathBuf};

use ava_sarc::aaf;
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;

use crate::commands::{create_output, read_input};

#[derive(Args)]
pub struct CompressArgs {
    /// An input file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// A target file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Largest uncompressed chunk
    #[arg(long, default_value_t = aaf::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CompressArgs {
    pub fn handle(&self) -> Result<()> {
        let input = read_input(&self.input)?;

        let container = aaf::compress(&input, self.chunk_size)
            .context(format!("compressing {}", self.input.display()))?;
        info!(
            "{} bytes in {} chunks, {} bytes written",
            input.len(),
            container.chunks.len(),
            container.len()
        );

        create_output(&self.output, self.overwrite)?
            .write_all(&container.to_bytes()?)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))?;

        Ok(())
    }
}
