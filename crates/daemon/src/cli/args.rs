pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "custody")]
#[command(about = "Key-custody client and daemon")]
pub struct Args {
    /// Path to the custody config directory (defaults to ~/.custody)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
