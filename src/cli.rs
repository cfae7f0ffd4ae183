use std::path::PathBuf;

use clap::Parser;

/// Watch directory trees and log every create, modify, delete and rename.
///
/// Folders are read from a TOML or JSON config file. The run continues until
/// the quit key is entered or Ctrl+C is pressed.
#[derive(Parser, Debug)]
#[command(name = "folder-watch", version, about, long_about = None)]
pub struct Cli {
    /// Config file listing the folders to watch (`.json` or TOML).
    #[arg(short, long, default_value = "folder-watch.toml")]
    pub config: PathBuf,

    /// Number of consumer workers. Overrides the config file.
    #[arg(long)]
    pub consumers: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}
