pub mod compress;
pub mod decompress;

#[derive(clap::Subcommand)]
pub enum AafCommands {
    /// Wrap a file in an AAF container
    Compress(compress::CompressArgs),
    /// Unwrap an AAF container
    Decompress(decompress::DecompressArgs),
}

impl AafCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            AafCommands::Compress(compress) => compress.handle(),
            AafCommands::Decompress(decompress) => decompress.handle(),
        }
    }
}
