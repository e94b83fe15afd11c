//! Command-line argument definitions for the inspector binary.

use clap::Parser;

#[derive(Parser)]
#[command(name = "beebdfs")]
#[command(version = "0.1.0")]
#[command(about = "Read-only inspector for Acorn DFS disc images", long_about = None)]
pub struct Cli {
    /// Disc image file to open (may be given more than once)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<String>,

    /// The current directory, as for *DIR (default $)
    #[arg(long, default_value_t = '$')]
    pub dir: char,

    /// The current drive (and optional Opus volume letter), as for *DRIVE
    #[arg(long, default_value = "0")]
    pub drive: String,

    /// Show the storage configuration before performing the operation
    #[arg(long)]
    pub show_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to run, followed by its arguments (see the help command)
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}
