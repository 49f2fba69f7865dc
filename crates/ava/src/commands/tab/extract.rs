use std::{io::Write, path::PathBuf};

use ava_loader::ContentDictionary;
use ava_tab::{ArchivePair, Codec};
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use super::{parse_hash, split_pair_path, Format};
use crate::commands::{create_output, output_path};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input TAB or ARC file, the other half of the pair must sit next to it
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract this content hash
    #[arg(long, value_parser = parse_hash)]
    hash: Option<u32>,

    /// A content dictionary used to name the extracted files
    #[arg(long, value_name = "FILE")]
    dictionary: Option<PathBuf>,

    /// Layout of the index
    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let dictionary = match &self.dictionary {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .into_diagnostic()
                    .context(format!("path: {}", path.display()))?;
                ContentDictionary::from_json(&json)?
            }
            None => ContentDictionary::empty(),
        };

        let (directory, name) = split_pair_path(&self.file)?;
        let mut pair = ArchivePair::open(&directory, &name, self.format.into())
            .context(format!("opening {}", self.file.display()))?;

        let hashes = match self.hash {
            Some(hash) => vec![hash],
            None => pair.table().entries().map(|e| e.content_hash).collect(),
        };

        let codec = Codec::new();
        for hash in hashes {
            let data = match pair.read_entry(hash, &codec) {
                Ok(data) => data,
                Err(e) if self.hash.is_none() => {
                    warn!("skipping {:08x}: {}", hash, e);
                    continue;
                }
                Err(e) => return Err(e).context(format!("reading {hash:08x}")),
            };

            let file_name = dictionary
                .resolve_by_hash(hash)
                .map(|e| e.canonical_path.clone())
                .unwrap_or_else(|| format!("{hash:08x}.bin"));
            let p = output_path(&self.directory, &file_name)?;
            info!("writing {}", p.display());

            create_output(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }

        Ok(())
    }
}
