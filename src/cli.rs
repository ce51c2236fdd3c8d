use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "podfetch",
    version,
    about = "Download new podcast episodes, number and tag them, and archive the previous batch"
)]
pub struct Cli {
    /// Config file (defaults to podfetch/config.json in the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Album/artist written to episode tags (defaults to the feed title)
    #[arg(long, global = true)]
    pub show_name: Option<String>,

    /// Seconds to wait for a connection
    #[arg(long, global = true, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Seconds to wait on a stalled transfer
    #[arg(long, global = true, default_value_t = 60)]
    pub read_timeout: u64,

    /// Do not draw a progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download, number and tag new episodes (default)
    Fetch,
    /// List episodes the next fetch would download
    Pending,
    /// Show configuration and archive counts
    Status,
}
