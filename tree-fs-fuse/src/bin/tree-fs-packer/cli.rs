use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Source directory packed into the image
    #[arg(long, short)]
    pub source: PathBuf,

    /// Output image path
    #[arg(long, short = 'O')]
    pub out: PathBuf,

    /// Image size in sectors
    #[arg(long, default_value_t = 2048)]
    pub sectors: u32,
}
