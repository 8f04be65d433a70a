pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backuper")]
#[command(about = "Back up a site directory and its MySQL database to a remote host over SCP")]
pub struct Args {
    /// Path to the backuper config directory (defaults to ~/.backuper)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON log lines, and JSON output where a command supports it
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
