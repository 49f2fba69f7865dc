use std::{io::Write, path::PathBuf};

use ava_loader::{FileResolutionService, Generation, ReadHandle, ReadOptions, ServiceOptions};
use clap::{Args, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{error, info, warn};

use crate::commands::{create_output, output_path};

/// Game generation of the install
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum GenerationArg {
    /// Just Cause 3
    Legacy,
    /// Just Cause 4
    #[default]
    Current,
}

impl From<GenerationArg> for Generation {
    fn from(value: GenerationArg) -> Self {
        match value {
            GenerationArg::Legacy => Generation::Legacy,
            GenerationArg::Current => Generation::Current,
        }
    }
}

#[derive(Args)]
pub struct ReadArgs {
    /// Logical paths to read
    #[arg(required = true)]
    paths: Vec<String>,

    /// The game install directory
    #[arg(short, long, value_name = "DIR")]
    game_dir: PathBuf,

    /// The content dictionary
    #[arg(long, value_name = "FILE")]
    dictionary: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    generation: GenerationArg,

    /// Resolve all paths in one batch
    #[arg(long, default_value_t = false)]
    batch: bool,

    /// Do not fall back to texture source files
    #[arg(long, default_value_t = false)]
    skip_texture_fallback: bool,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ReadArgs {
    pub fn handle(&self) -> Result<()> {
        let json = std::fs::read_to_string(&self.dictionary)
            .into_diagnostic()
            .context(format!("path: {}", self.dictionary.display()))?;

        let service = FileResolutionService::new(
            ServiceOptions::builder()
                .game_directory(&self.game_dir)
                .generation(self.generation.into())
                .dictionary_json(json)
                .build(),
        );
        if let Some(e) = service.dictionary_error() {
            warn!("continuing without a dictionary: {}", e);
        }

        let options = ReadOptions::builder()
            .skip_texture_fallback(self.skip_texture_fallback)
            .build();

        let handles: Vec<(&String, ReadHandle)> = if self.batch {
            let batch = service.batch();
            let handles: Vec<_> = self
                .paths
                .iter()
                .map(|path| (path, batch.read(path, options)))
                .collect();

            let report = batch.finish().wait()?;
            info!(
                "{} paths resolved, {} unknown, {} archive pairs opened",
                report.resolved, report.unresolved, report.pairs_opened
            );
            handles
        } else {
            self.paths
                .iter()
                .map(|path| (path, service.read(path, options)))
                .collect()
        };

        let mut failed = 0;
        for (path, handle) in handles {
            let data = match handle.wait() {
                Ok(data) => data,
                Err(e) => {
                    error!("failed to read {}: {}", path, e);
                    failed += 1;
                    continue;
                }
            };

            let p = output_path(&self.directory, path)?;
            info!("writing {} ({} bytes)", p.display(), data.len());
            create_output(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }

        if failed > 0 {
            return Err(miette!(
                help = "check that --game-dir points at the game install",
                "{failed} of {} paths could not be read",
                self.paths.len()
            ));
        }
        Ok(())
    }
}
