use std::path::PathBuf;

use ava_tab::{read::effective_compression, ArchiveTable};
use clap::Args;
use miette::{Context, Result};
use owo_colors::OwoColorize;

use super::Format;
use crate::commands::read_input;

#[derive(Args)]
pub struct ListArgs {
    /// An input TAB file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Layout of the index
    #[arg(long, value_enum, default_value_t)]
    format: Format,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let bytes = read_input(&self.file)?;
        let table = ArchiveTable::parse(&bytes, self.format.into())
            .context(format!("parsing {}", self.file.display()))?;

        for entry in table.entries() {
            let compression = effective_compression(entry);
            println!(
                "{} {:>#12x} {:>10} {:>10} {}{}",
                format!("{:08x}", entry.content_hash).bold(),
                entry.offset,
                entry.compressed_size,
                entry.uncompressed_size,
                format!("{compression:?}").dimmed(),
                match entry.compressed_block_index {
                    0 => String::new(),
                    index => format!(" (block {index})"),
                }
            );
        }

        println!(
            "{} entries, {} compressed blocks",
            table.len().green(),
            table.blocks().len().green()
        );
        Ok(())
    }
}
