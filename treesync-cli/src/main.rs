//! treesync: keeps a local tree of platform configurations normalized.
//!
//! # Usage
//!
//! ```text
//! treesync [--dir <project>] status [--json]
//! treesync [--dir <project>] paths
//! treesync [--dir <project>] diff
//! treesync [--dir <project>] fix [--dry-run]
//! treesync [--dir <project>] rename [--dry-run]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    diff::DiffArgs, fix::FixArgs, paths::PathsArgs, rename::RenameArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "treesync",
    version,
    about = "Keep a local tree of platform configurations in sync",
    long_about = None,
)]
struct Cli {
    /// Project directory, the one holding `.treesync/manifest.json`.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Log pipeline steps; repeat for debug output.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the project and show every object with its state.
    Status(StatusArgs),

    /// List files and directories no object owns.
    Paths(PathsArgs),

    /// Show unified diff of what `fix` would write.
    Diff(DiffArgs),

    /// Rewrite every object's files in canonical form and save the manifest.
    Fix(FixArgs),

    /// Move objects whose names changed to their generated paths.
    Rename(RenameArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Status(args) => args.run(&cli.dir),
        Commands::Paths(args) => args.run(&cli.dir),
        Commands::Diff(args) => args.run(&cli.dir),
        Commands::Fix(args) => args.run(&cli.dir),
        Commands::Rename(args) => args.run(&cli.dir),
    }
}
