pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vault")]
#[command(about = "Encrypted, content-addressed storage with proxy re-encryption sharing")]
pub struct Args {
    /// Path to the vault directory (defaults to ~/.vault)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Local identity to act as
    #[arg(long = "as", global = true, default_value = crate::state::DEFAULT_IDENTITY)]
    pub identity: String,

    #[command(subcommand)]
    pub command: crate::Command,
}
