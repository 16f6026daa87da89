use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fstore_types::Order;

#[derive(Parser)]
#[command(name = "store", about = "Content-addressed file store client", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store URL; overrides the saved configuration.
    #[arg(long, global = true, env = "STORE_URL")]
    pub url: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add files to the store
    Add(FilesArgs),
    /// Create or replace files in the store
    Update(FilesArgs),
    /// Download a file
    Get(GetArgs),
    /// Remove a file
    #[command(visible_alias = "rm")]
    Remove(NameArgs),
    /// List stored files
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Total word count across all files
    #[command(visible_alias = "wc")]
    Count,
    /// Most or least frequent words across all files
    #[command(visible_alias = "freq-words")]
    Frequency(FrequencyArgs),
    /// Set and verify the store URL (`--url`, or prompted for)
    Config,
    /// Print the client version
    Version,
}

impl Command {
    /// Whether the command talks to a store and so needs a configured URL.
    pub fn needs_store(&self) -> bool {
        !matches!(self, Self::Config | Self::Version)
    }
}

#[derive(Args)]
pub struct FilesArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
    /// Directory to write the file into
    #[arg(short = 'p', long = "path", default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Include size and word count
    #[arg(short, long)]
    pub details: bool,
}

#[derive(Args)]
pub struct FrequencyArgs {
    /// Sort order: asc or dsc
    #[arg(short, long, default_value = "asc")]
    pub order: Order,
    /// Number of words to show; 0 shows all
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}
