use std::path::PathBuf;

use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;

use super::open_archive;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive, plain or AAF compressed
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Ignore the `.toc` next to the archive
    #[arg(long, default_value_t = false)]
    no_toc: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, !self.no_toc)?;

        for entry in archive.entries() {
            let location = if entry.is_resident() {
                format!("{:#010x}", entry.offset)
            } else {
                "patched".yellow().to_string()
            };
            println!("{} {:>10} {}", location, entry.size, entry.name.bold());
        }

        println!(
            "{} entries, version {}{}",
            archive.len().green(),
            archive.version(),
            if archive.is_using_toc() { ", using TOC" } else { "" }
        );
        Ok(())
    }
}
